//! Configuration for CueBridge

use crate::error::{Result, require_non_empty};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Lookahead the native engine uses when none is configured.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(250);

/// Configuration descriptor for an audio engine.
#[derive(Debug, Clone)]
pub struct EngineDesc {
    /// Global settings blob authored for the engine.
    pub settings: Vec<u8>,
    /// How far ahead the engine schedules transitions.
    pub lookahead: Duration,
    /// Renderer to open; `None` selects the default device.
    pub renderer_id: Option<Uuid>,
}

impl Default for EngineDesc {
    fn default() -> Self {
        Self {
            settings: Vec::new(),
            lookahead: DEFAULT_LOOKAHEAD,
            renderer_id: None,
        }
    }
}

impl EngineDesc {
    pub fn new(settings: Vec<u8>) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Reads the global settings blob from a file.
    pub fn from_settings_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        require_non_empty("settings_file", &path.to_string_lossy())?;
        let settings = std::fs::read(path)?;
        log::debug!("Read {} bytes of engine settings from {}", settings.len(), path.display());
        Ok(Self::new(settings))
    }

    pub fn lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn renderer_id(mut self, renderer_id: Uuid) -> Self {
        self.renderer_id = Some(renderer_id);
        self
    }
}

/// Configuration descriptor for a wavebank streamed from storage.
#[derive(Debug, Clone)]
pub struct StreamingWaveBankDesc {
    pub path: PathBuf,
    /// Byte offset of the wavebank inside the file.
    pub offset: u32,
    /// Streaming packet size in sectors.
    pub packet_size: u16,
}

impl StreamingWaveBankDesc {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            packet_size: 64,
        }
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn packet_size(mut self, packet_size: u16) -> Self {
        self.packet_size = packet_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CueBridgeError;

    #[test]
    fn defaults_use_native_lookahead() {
        let desc = EngineDesc::default();
        assert_eq!(desc.lookahead, Duration::from_millis(250));
        assert!(desc.renderer_id.is_none());
    }

    #[test]
    fn empty_settings_path_is_an_argument_error() {
        assert!(matches!(
            EngineDesc::from_settings_file(""),
            Err(CueBridgeError::Argument(_))
        ));
    }

    #[test]
    fn missing_settings_file_is_an_io_error() {
        assert!(matches!(
            EngineDesc::from_settings_file("does/not/exist.xgs"),
            Err(CueBridgeError::Io(_))
        ));
    }
}
