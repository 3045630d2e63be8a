//! Sound categories for CueBridge

use crate::engine::EngineInner;
use crate::error::{CueBridgeError, Result};
use crate::native::{AudioStopOptions, CategoryIndex, NativeAudioBackend, NativeHandle, NativeResult};
use std::fmt;
use std::sync::Weak;

/// A named group of sounds sharing volume and pause state.
///
/// Categories do not keep their engine alive. Once the engine is disposed or
/// dropped every operation fails with [`CueBridgeError::InvalidState`].
#[derive(Clone)]
pub struct AudioCategory {
    engine: Weak<EngineInner>,
    name: String,
    index: CategoryIndex,
}

impl AudioCategory {
    pub(crate) fn new(engine: Weak<EngineInner>, name: &str, index: CategoryIndex) -> Self {
        Self {
            engine,
            name: name.to_string(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pause(&self) -> Result<()> {
        self.with_engine(|backend, engine| backend.pause_category(engine, self.index, true))
    }

    pub fn resume(&self) -> Result<()> {
        self.with_engine(|backend, engine| backend.pause_category(engine, self.index, false))
    }

    pub fn stop(&self, options: AudioStopOptions) -> Result<()> {
        self.with_engine(|backend, engine| backend.stop_category(engine, self.index, options))
    }

    /// Sets the category volume, `1.0` being the authored level.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if volume.is_nan() || volume < 0.0 {
            return Err(CueBridgeError::Argument(format!(
                "category volume must be non-negative, got {volume}"
            )));
        }
        self.with_engine(|backend, engine| backend.set_category_volume(engine, self.index, volume))
    }

    fn with_engine<T>(
        &self,
        call: impl FnOnce(&dyn NativeAudioBackend, NativeHandle) -> NativeResult<T>,
    ) -> Result<T> {
        let inner = self.engine.upgrade().ok_or_else(|| {
            CueBridgeError::InvalidState(format!("engine of category '{}' is gone", self.name))
        })?;
        let handle = inner.core.live_handle()?;
        Ok(call(inner.core.backend(), handle)?)
    }
}

impl PartialEq for AudioCategory {
    fn eq(&self, other: &Self) -> bool {
        self.engine.ptr_eq(&other.engine) && self.index == other.index
    }
}

impl Eq for AudioCategory {}

impl fmt::Debug for AudioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioCategory")
            .field("name", &self.name)
            .field("index", &self.index.0)
            .finish()
    }
}
