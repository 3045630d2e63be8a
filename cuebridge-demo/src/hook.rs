use anyhow::Result;
use cuebridge::native::SimulatedBackend;
use cuebridge::{
    AccessibilityFeature, AccessibilityFlags, AudioContext, HostLifecycle, KeyAction, KeyEvent,
    KeyboardHookFacility, SystemKeySuppressor, VirtualKey,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Keeps accessibility flags in memory and logs what a real hook would do.
struct LoggingFacility {
    flags: Mutex<HashMap<AccessibilityFeature, AccessibilityFlags>>,
}

impl LoggingFacility {
    fn new() -> Self {
        let shortcuts = AccessibilityFlags::AVAILABLE
            | AccessibilityFlags::HOTKEY_ACTIVE
            | AccessibilityFlags::CONFIRM_HOTKEY;
        let flags = AccessibilityFeature::ALL
            .into_iter()
            .map(|feature| (feature, shortcuts))
            .collect();
        Self {
            flags: Mutex::new(flags),
        }
    }
}

impl KeyboardHookFacility for LoggingFacility {
    fn install_hook(&self) -> std::io::Result<()> {
        log::info!("Installing low-level keyboard hook");
        Ok(())
    }

    fn uninstall_hook(&self) {
        log::info!("Removing low-level keyboard hook");
    }

    fn accessibility_flags(&self, feature: AccessibilityFeature) -> AccessibilityFlags {
        let flags = self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        flags.get(&feature).copied().unwrap_or(AccessibilityFlags::empty())
    }

    fn set_accessibility_flags(&self, feature: AccessibilityFeature, flags: AccessibilityFlags) {
        log::info!("{:?} -> {:?}", feature, flags);
        self.flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(feature, flags);
    }
}

struct Window(AtomicBool);

impl HostLifecycle for Window {
    fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn run() -> Result<()> {
    let context = AudioContext::new(Arc::new(SimulatedBackend::new()));
    let window = Arc::new(Window(AtomicBool::new(true)));
    let suppressor = SystemKeySuppressor::install(&context, Arc::new(LoggingFacility::new()), window.clone())?;

    suppressor.on_activated();
    let events = [
        KeyEvent::new(VirtualKey::LeftWindows, KeyAction::Down),
        KeyEvent::new(VirtualKey::Other(0x57), KeyAction::Down),
        KeyEvent::new(VirtualKey::LeftWindows, KeyAction::Up),
    ];
    for event in events {
        log::info!("{:?} while active: {:?}", event, suppressor.filter_key(event));
    }

    window.0.store(false, Ordering::SeqCst);
    suppressor.on_deactivated();
    log::info!(
        "{:?} while inactive: {:?}",
        events[0],
        suppressor.filter_key(events[0])
    );

    drop(suppressor);
    Ok(())
}
