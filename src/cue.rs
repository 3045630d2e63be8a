//! Cues for CueBridge

use crate::error::{CueBridgeError, Result, require_non_empty};
use crate::events::DisposeCause;
use crate::lifecycle::ObjectCore;
use crate::native::{AudioStopOptions, NativeHandle, StateFlags};
use crate::spatial::{AudioEmitter, AudioListener};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Positioning {
    played: bool,
    applied_3d: bool,
}

struct CueInner {
    core: Arc<ObjectCore>,
    name: String,
    /// Held across the native call, so a first `apply_3d` and a first `play`
    /// racing on two threads are ordered.
    positioning: Mutex<Positioning>,
}

/// A playable instance of a sound authored in a soundbank.
///
/// The engine may destroy a cue on its own, for example when its soundbank is
/// disposed. The cue then reports [`is_disposed`](Self::is_disposed) and its
/// operations fail with [`CueBridgeError::InvalidState`].
#[derive(Clone)]
pub struct Cue {
    inner: Arc<CueInner>,
}

impl Cue {
    pub(crate) fn new(core: Arc<ObjectCore>, name: &str) -> Self {
        Self {
            inner: Arc::new(CueInner {
                core,
                name: name.to_string(),
                positioning: Mutex::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handle(&self) -> NativeHandle {
        self.inner.core.handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.core.is_disposed()
    }

    pub fn dispose(&self) {
        self.inner.core.dispose(DisposeCause::Explicit);
    }

    pub fn on_disposing(&self, observer: impl FnOnce() + Send + 'static) {
        self.inner.core.on_disposing(Box::new(observer));
    }

    /// The state word the engine reports for this cue.
    pub fn status(&self) -> Result<StateFlags> {
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().cue_state(handle)?)
    }

    pub fn is_created(&self) -> Result<bool> {
        self.has_state(StateFlags::CREATED)
    }

    pub fn is_preparing(&self) -> Result<bool> {
        self.has_state(StateFlags::PREPARING)
    }

    pub fn is_prepared(&self) -> Result<bool> {
        self.has_state(StateFlags::PREPARED)
    }

    pub fn is_playing(&self) -> Result<bool> {
        self.has_state(StateFlags::PLAYING)
    }

    pub fn is_stopping(&self) -> Result<bool> {
        self.has_state(StateFlags::STOPPING)
    }

    pub fn is_stopped(&self) -> Result<bool> {
        self.has_state(StateFlags::STOPPED)
    }

    pub fn is_paused(&self) -> Result<bool> {
        self.has_state(StateFlags::PAUSED)
    }

    fn has_state(&self, flag: StateFlags) -> Result<bool> {
        Ok(self.status()?.contains(flag))
    }

    fn positioning(&self) -> MutexGuard<'_, Positioning> {
        self.inner
            .positioning
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Positions the cue relative to a listener.
    ///
    /// A cue that should be positioned has to be positioned before its first
    /// [`play`](Self::play); once it plays, it can be moved again only if it was
    /// positioned before.
    ///
    /// # Errors
    ///
    /// [`CueBridgeError::InvalidState`] if the cue was played without being
    /// positioned first, or if the cue or its engine is disposed.
    pub fn apply_3d(&self, listener: &AudioListener, emitter: &AudioEmitter) -> Result<()> {
        let handle = self.inner.core.live_handle()?;
        let mut positioning = self.positioning();
        if !positioning.applied_3d && positioning.played {
            return Err(CueBridgeError::InvalidState(format!(
                "cue '{}' must be positioned before it is first played",
                self.inner.name
            )));
        }
        let engine = self.inner.core.live_owner()?;

        self.inner.core.backend().apply_3d(
            engine,
            handle,
            &listener.to_native(),
            &emitter.to_native(),
        )?;
        positioning.applied_3d = true;
        Ok(())
    }

    pub fn play(&self) -> Result<()> {
        let handle = self.inner.core.live_handle()?;
        let mut positioning = self.positioning();
        self.inner.core.backend().play_cue(handle)?;
        positioning.played = true;
        log::trace!("Playing cue '{}' ({})", self.inner.name, handle);
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().pause_cue(handle, true)?)
    }

    pub fn resume(&self) -> Result<()> {
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().pause_cue(handle, false)?)
    }

    pub fn stop(&self, options: AudioStopOptions) -> Result<()> {
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().stop_cue(handle, options)?)
    }

    /// Value of a cue variable. Unknown names give `None`.
    pub fn get_variable(&self, name: &str) -> Result<Option<f32>> {
        require_non_empty("name", name)?;
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().get_cue_variable(handle, name)?)
    }

    /// Sets a cue variable. Returns `false` if no variable has that name.
    pub fn set_variable(&self, name: &str, value: f32) -> Result<bool> {
        require_non_empty("name", name)?;
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().set_cue_variable(handle, name, value)?)
    }
}

impl PartialEq for Cue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Cue {}

impl fmt::Debug for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cue")
            .field("name", &self.inner.name)
            .field("handle", &self.handle())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
