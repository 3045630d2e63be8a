//! System key suppression for CueBridge
//!
//! While a game is in the foreground, [`SystemKeySuppressor`] swallows the
//! Windows keys and switches off the accessibility shortcut hotkeys (sticky,
//! toggle and filter keys) so they cannot pull the player out of the game.
//! The accessibility settings found at install time are restored when the
//! game is deactivated and when the suppressor is dropped.

use crate::context::{AudioContext, ContextShared};
use crate::error::{CueBridgeError, Result};
use bitflags::bitflags;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

bitflags! {
    /// Flag word of one accessibility feature. The bit layout is shared by
    /// sticky keys, toggle keys and filter keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessibilityFlags: u32 {
        const ON = 0x0000_0001;
        const AVAILABLE = 0x0000_0002;
        const HOTKEY_ACTIVE = 0x0000_0004;
        const CONFIRM_HOTKEY = 0x0000_0008;
        const HOTKEY_SOUND = 0x0000_0010;
        const INDICATOR = 0x0000_0020;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessibilityFeature {
    StickyKeys,
    ToggleKeys,
    FilterKeys,
}

impl AccessibilityFeature {
    pub const ALL: [Self; 3] = [Self::StickyKeys, Self::ToggleKeys, Self::FilterKeys];
}

/// Operating system services the suppressor needs.
pub trait KeyboardHookFacility: Send + Sync {
    /// Installs the process-wide low-level keyboard hook.
    fn install_hook(&self) -> std::io::Result<()>;
    fn uninstall_hook(&self);
    fn accessibility_flags(&self, feature: AccessibilityFeature) -> AccessibilityFlags;
    fn set_accessibility_flags(&self, feature: AccessibilityFeature, flags: AccessibilityFlags);
}

/// The application whose focus decides whether keys are suppressed.
pub trait HostLifecycle: Send + Sync {
    fn is_active(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKey {
    LeftWindows,
    RightWindows,
    Other(u32),
}

impl VirtualKey {
    pub fn is_windows_key(self) -> bool {
        matches!(self, Self::LeftWindows | Self::RightWindows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Down,
    Up,
    SystemDown,
    SystemUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: VirtualKey,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn new(key: VirtualKey, action: KeyAction) -> Self {
        Self { key, action }
    }
}

/// What the hook should do with a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDisposition {
    /// Hand the event to the next hook.
    Pass,
    /// Drop the event.
    Swallow,
}

#[derive(Debug, Clone, Copy)]
struct StartupFlags([AccessibilityFlags; 3]);

impl StartupFlags {
    fn read(facility: &dyn KeyboardHookFacility) -> Self {
        Self(AccessibilityFeature::ALL.map(|feature| facility.accessibility_flags(feature)))
    }

    fn iter(&self) -> impl Iterator<Item = (AccessibilityFeature, AccessibilityFlags)> + '_ {
        AccessibilityFeature::ALL.into_iter().zip(self.0)
    }
}

#[derive(Debug)]
struct Settings {
    enabled: bool,
    disable_shortcut_keys: bool,
}

/// Suppresses the Windows keys and accessibility shortcuts while the host is
/// active. At most one suppressor can be installed per [`AudioContext`].
pub struct SystemKeySuppressor {
    context: Arc<ContextShared>,
    facility: Arc<dyn KeyboardHookFacility>,
    host: Arc<dyn HostLifecycle>,
    startup: StartupFlags,
    settings: Mutex<Settings>,
}

impl SystemKeySuppressor {
    /// Installs the keyboard hook and remembers the current accessibility
    /// settings.
    ///
    /// # Errors
    ///
    /// * [`CueBridgeError::InvalidState`] if the context already has a suppressor
    /// * [`CueBridgeError::Io`] if the hook cannot be installed
    pub fn install(
        context: &AudioContext,
        facility: Arc<dyn KeyboardHookFacility>,
        host: Arc<dyn HostLifecycle>,
    ) -> Result<Self> {
        let shared = context.shared().clone();
        if !shared.claim_keyboard_hook() {
            return Err(CueBridgeError::InvalidState(
                "a keyboard hook is already installed in this context".to_string(),
            ));
        }
        if let Err(error) = facility.install_hook() {
            shared.release_keyboard_hook();
            return Err(error.into());
        }

        let startup = StartupFlags::read(facility.as_ref());
        log::info!("Installed system key suppressor (startup flags {:?})", startup.0);
        Ok(Self {
            context: shared,
            facility,
            host,
            startup,
            settings: Mutex::new(Settings {
                enabled: true,
                disable_shortcut_keys: true,
            }),
        })
    }

    /// Decides the fate of a key event. Called from the hook.
    pub fn filter_key(&self, event: KeyEvent) -> KeyDisposition {
        let plain_key = matches!(event.action, KeyAction::Down | KeyAction::Up);
        if plain_key && event.key.is_windows_key() && self.settings().enabled && self.host.is_active() {
            return KeyDisposition::Swallow;
        }
        KeyDisposition::Pass
    }

    pub fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut settings = self.settings();
        if settings.enabled == enabled {
            return;
        }
        settings.enabled = enabled;
        self.apply(enabled && settings.disable_shortcut_keys);
    }

    pub fn disable_accessibility_shortcut_keys(&self) -> bool {
        self.settings().disable_shortcut_keys
    }

    pub fn set_disable_accessibility_shortcut_keys(&self, disable: bool) {
        let mut settings = self.settings();
        if settings.disable_shortcut_keys == disable {
            return;
        }
        settings.disable_shortcut_keys = disable;
        if !disable {
            self.apply(false);
        } else if settings.enabled && self.host.is_active() {
            self.apply(true);
        }
    }

    /// Call when the host gains focus.
    pub fn on_activated(&self) {
        let settings = self.settings();
        self.apply(settings.enabled && settings.disable_shortcut_keys);
    }

    /// Call when the host loses focus.
    pub fn on_deactivated(&self) {
        let _settings = self.settings();
        self.apply(false);
    }

    fn settings(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the shortcut policy. Features switched on at startup are left
    /// alone since someone relies on them.
    fn apply(&self, disable: bool) {
        for (feature, startup) in self.startup.iter() {
            if !disable {
                self.facility.set_accessibility_flags(feature, startup);
            } else if !startup.contains(AccessibilityFlags::ON) {
                let flags = startup - (AccessibilityFlags::HOTKEY_ACTIVE | AccessibilityFlags::CONFIRM_HOTKEY);
                self.facility.set_accessibility_flags(feature, flags);
            }
        }
        log::debug!(
            "Accessibility shortcut keys {}",
            if disable { "disabled" } else { "restored" }
        );
    }
}

impl Drop for SystemKeySuppressor {
    fn drop(&mut self) {
        self.facility.uninstall_hook();
        self.apply(false);
        self.context.release_keyboard_hook();
        log::info!("Removed system key suppressor");
    }
}
