//! Event types for CueBridge

use crate::native::{HandleKind, NativeHandle, NativeStatus};

/// Why an object left the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeCause {
    /// `dispose()` was called.
    Explicit,
    /// The last clone of the wrapper was dropped.
    Dropped,
    /// The owning engine was disposed.
    EngineTeardown,
    /// The native engine destroyed the object on its own.
    NativeNotification,
}

impl DisposeCause {
    /// Whether this disposal has to release the native resource.
    pub fn releases_native(self) -> bool {
        !matches!(self, Self::NativeNotification)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CueBridgeEvent {
    ObjectDisposed {
        handle: NativeHandle,
        kind: HandleKind,
        cause: DisposeCause,
    },
    ReleaseFailed {
        handle: NativeHandle,
        kind: HandleKind,
        status: NativeStatus,
    },
}

impl CueBridgeEvent {
    pub fn handle(&self) -> NativeHandle {
        match self {
            Self::ObjectDisposed { handle, .. } | Self::ReleaseFailed { handle, .. } => *handle,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ReleaseFailed { .. })
    }
}
