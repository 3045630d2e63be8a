//! Error types for CueBridge

use crate::native::{NativeHandle, NativeStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CueBridgeError {
    #[error("Argument error: {0}")]
    Argument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Native resource error {status}: {}", status.description())]
    NativeResource { status: NativeStatus },

    #[error("No audio hardware available")]
    NoHardware,

    #[error("Duplicate handle: {0} is already bound to a live object")]
    DuplicateHandle(NativeHandle),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CueBridgeError {
    /// Translates a failing native status, keeping the code for diagnostics.
    pub fn from_status(status: NativeStatus) -> Self {
        match status {
            NativeStatus::NO_RENDERER => Self::NoHardware,
            status => Self::NativeResource { status },
        }
    }

    pub(crate) fn empty_argument(name: &str) -> Self {
        Self::Argument(format!("`{name}` must not be empty"))
    }

    pub(crate) fn disposed(what: impl std::fmt::Display) -> Self {
        Self::InvalidState(format!("cannot use a disposed {what}"))
    }

    /// The native status behind this error, if any.
    pub fn status(&self) -> Option<NativeStatus> {
        match self {
            Self::NativeResource { status } => Some(*status),
            Self::NoHardware => Some(NativeStatus::NO_RENDERER),
            _ => None,
        }
    }
}

impl From<NativeStatus> for CueBridgeError {
    fn from(status: NativeStatus) -> Self {
        Self::from_status(status)
    }
}

pub type Result<T> = std::result::Result<T, CueBridgeError>;

/// Fails with [`CueBridgeError::Argument`] when a required string is empty.
pub(crate) fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CueBridgeError::empty_argument(name));
    }
    Ok(())
}
