//! Wavebanks for CueBridge

use crate::config::StreamingWaveBankDesc;
use crate::engine::AudioEngine;
use crate::error::{CueBridgeError, Result, require_non_empty};
use crate::events::DisposeCause;
use crate::lifecycle::ObjectCore;
use crate::native::{HandleKind, NativeHandle, StateFlags, StreamingParams};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The wave data cues play from, either held in memory or streamed.
#[derive(Clone)]
pub struct WaveBank {
    core: Arc<ObjectCore>,
    streaming: bool,
}

impl WaveBank {
    /// Loads an in-memory wavebank.
    pub fn new(engine: &AudioEngine, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(CueBridgeError::empty_argument("data"));
        }
        let engine_core = engine.core();
        let engine_handle = engine_core.live_handle()?;
        let handle = engine_core
            .backend()
            .create_in_memory_wave_bank(engine_handle, data)?;
        let core = engine_core.bind_dependent(handle, HandleKind::WaveBank)?;

        log::debug!("Loaded wavebank {} ({} bytes)", handle, data.len());
        Ok(Self {
            core,
            streaming: false,
        })
    }

    pub fn from_file(engine: &AudioEngine, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        require_non_empty("path", &path.to_string_lossy())?;
        let data = std::fs::read(path)?;
        Self::new(engine, &data)
    }

    /// Opens a wavebank streamed from storage. It becomes prepared once the
    /// engine has done some work, see [`AudioEngine::update`].
    ///
    /// # Errors
    ///
    /// * [`CueBridgeError::Argument`] if the path is empty or the packet size is zero
    /// * [`CueBridgeError::NativeResource`] if the file cannot be read or parsed
    pub fn streaming(engine: &AudioEngine, desc: StreamingWaveBankDesc) -> Result<Self> {
        require_non_empty("path", &desc.path.to_string_lossy())?;
        if desc.packet_size == 0 {
            return Err(CueBridgeError::Argument(
                "`packet_size` must be at least one sector".to_string(),
            ));
        }
        let engine_core = engine.core();
        let engine_handle = engine_core.live_handle()?;
        let params = StreamingParams {
            path: &desc.path,
            offset: desc.offset,
            packet_size: desc.packet_size,
        };
        let handle = engine_core
            .backend()
            .create_streaming_wave_bank(engine_handle, &params)?;
        let core = engine_core.bind_dependent(handle, HandleKind::WaveBank)?;

        log::debug!("Streaming wavebank {} from {}", handle, desc.path.display());
        Ok(Self {
            core,
            streaming: true,
        })
    }

    pub fn handle(&self) -> NativeHandle {
        self.core.handle()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn dispose(&self) {
        self.core.dispose(DisposeCause::Explicit);
    }

    pub fn on_disposing(&self, observer: impl FnOnce() + Send + 'static) {
        self.core.on_disposing(Box::new(observer));
    }

    pub fn is_prepared(&self) -> Result<bool> {
        Ok(self.state()?.contains(StateFlags::PREPARED))
    }

    pub fn is_in_use(&self) -> Result<bool> {
        Ok(self.state()?.contains(StateFlags::IN_USE))
    }

    fn state(&self) -> Result<StateFlags> {
        let handle = self.core.live_handle()?;
        Ok(self.core.backend().wave_bank_state(handle)?)
    }
}

impl PartialEq for WaveBank {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for WaveBank {}

impl fmt::Debug for WaveBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveBank")
            .field("handle", &self.handle())
            .field("streaming", &self.streaming)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
