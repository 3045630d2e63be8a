//! The seam to the native audio engine.
//!
//! Everything the binding layer needs from the engine goes through
//! [`NativeAudioBackend`]. Handles are opaque identities owned by the engine;
//! this layer never dereferences them.

#[cfg(any(test, feature = "simulated"))]
mod simulated;
mod status;

#[cfg(any(test, feature = "simulated"))]
pub use simulated::{BlobBuilder, SimOp, SimulatedBackend};
pub use status::NativeStatus;

use crate::math::Vec3;
use bitflags::bitflags;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub type NativeResult<T> = std::result::Result<T, NativeStatus>;

/// Opaque, pointer-sized identity of a native resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle(0x{:x})", self.0)
    }
}

/// The kind of native resource a handle names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Engine,
    SoundBank,
    WaveBank,
    Cue,
}

impl HandleKind {
    /// Order in which dependents are released during engine teardown.
    pub(crate) fn teardown_rank(self) -> u8 {
        match self {
            Self::Cue => 0,
            Self::SoundBank => 1,
            Self::WaveBank => 2,
            Self::Engine => 3,
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Engine => "engine",
            Self::SoundBank => "soundbank",
            Self::WaveBank => "wavebank",
            Self::Cue => "cue",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// State word reported by the engine for cues, soundbanks and wavebanks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateFlags: u32 {
        const CREATED = 0x0000_0001;
        const PREPARING = 0x0000_0002;
        const PREPARED = 0x0000_0004;
        const PLAYING = 0x0000_0008;
        const STOPPING = 0x0000_0010;
        const STOPPED = 0x0000_0020;
        const PAUSED = 0x0000_0040;
        const IN_USE = 0x0000_0080;
        const PREPARE_FAILED = 0x8000_0000;
    }
}

/// How a cue or category stops.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AudioStopOptions {
    /// Play release phases and transitions as authored.
    #[default]
    AsAuthored,
    /// Stop right away.
    Immediate,
}

/// Index of a cue inside a soundbank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CueIndex(pub u16);

/// Index of a category inside the engine's global settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CategoryIndex(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    CueDestroyed,
}

/// A notification delivered by the engine, possibly on one of its own threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeNotification {
    CueDestroyed { cue: NativeHandle },
}

/// Process-wide notification entry point handed to the engine at construction.
///
/// The engine may invoke it from any thread and while holding its own locks,
/// so implementations must not call back into the engine.
pub type NotificationCallback = Arc<dyn Fn(&NativeNotification) + Send + Sync>;

/// Parameters for constructing a native engine.
#[derive(Debug, Clone)]
pub struct EngineParams<'a> {
    pub settings: &'a [u8],
    pub lookahead: Duration,
    pub renderer_id: Option<Uuid>,
}

/// Parameters for a wavebank streamed from storage.
#[derive(Debug, Clone)]
pub struct StreamingParams<'a> {
    pub path: &'a Path,
    pub offset: u32,
    pub packet_size: u16,
}

/// Renderer details exactly as the engine reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRendererDetail {
    pub display_name: String,
    /// Renderer id in registry (braced) format.
    pub renderer_id: String,
}

/// Listener state in the engine's left-handed coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerState {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
}

/// Emitter state in the engine's left-handed coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterState {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
    pub doppler_scale: f32,
    pub channel_count: u32,
    pub channel_radius: f32,
    pub curve_distance_scale: f32,
}

/// Call interface of the native 3D audio engine.
///
/// Implementations do their own internal locking. The binding layer never
/// holds its registry lock while calling any of these methods.
pub trait NativeAudioBackend: Send + Sync {
    fn create_engine(
        &self,
        params: &EngineParams<'_>,
        callback: NotificationCallback,
    ) -> NativeResult<NativeHandle>;
    fn register_notification(&self, engine: NativeHandle, kind: NotificationKind) -> NativeResult<()>;
    fn shutdown_engine(&self, engine: NativeHandle) -> NativeResult<()>;
    fn do_work(&self, engine: NativeHandle) -> NativeResult<()>;

    fn renderer_count(&self, engine: NativeHandle) -> NativeResult<usize>;
    fn renderer_detail(&self, engine: NativeHandle, index: usize) -> NativeResult<NativeRendererDetail>;

    fn get_global_variable(&self, engine: NativeHandle, name: &str) -> NativeResult<Option<f32>>;
    fn set_global_variable(&self, engine: NativeHandle, name: &str, value: f32) -> NativeResult<bool>;

    fn category(&self, engine: NativeHandle, name: &str) -> Option<CategoryIndex>;
    fn pause_category(&self, engine: NativeHandle, category: CategoryIndex, pause: bool) -> NativeResult<()>;
    fn stop_category(
        &self,
        engine: NativeHandle,
        category: CategoryIndex,
        options: AudioStopOptions,
    ) -> NativeResult<()>;
    fn set_category_volume(&self, engine: NativeHandle, category: CategoryIndex, volume: f32) -> NativeResult<()>;

    fn apply_3d(
        &self,
        engine: NativeHandle,
        cue: NativeHandle,
        listener: &ListenerState,
        emitter: &EmitterState,
    ) -> NativeResult<()>;

    fn create_sound_bank(&self, engine: NativeHandle, data: &[u8]) -> NativeResult<NativeHandle>;
    fn sound_bank_state(&self, sound_bank: NativeHandle) -> NativeResult<StateFlags>;
    fn destroy_sound_bank(&self, sound_bank: NativeHandle) -> NativeResult<()>;
    fn cue_index(&self, sound_bank: NativeHandle, name: &str) -> Option<CueIndex>;
    fn prepare_cue(&self, sound_bank: NativeHandle, index: CueIndex) -> NativeResult<NativeHandle>;
    /// Plays a cue that the engine owns and destroys once it finishes.
    fn play_cue_index(&self, sound_bank: NativeHandle, index: CueIndex) -> NativeResult<()>;

    fn create_in_memory_wave_bank(&self, engine: NativeHandle, data: &[u8]) -> NativeResult<NativeHandle>;
    fn create_streaming_wave_bank(
        &self,
        engine: NativeHandle,
        params: &StreamingParams<'_>,
    ) -> NativeResult<NativeHandle>;
    fn wave_bank_state(&self, wave_bank: NativeHandle) -> NativeResult<StateFlags>;
    fn destroy_wave_bank(&self, wave_bank: NativeHandle) -> NativeResult<()>;

    fn cue_state(&self, cue: NativeHandle) -> NativeResult<StateFlags>;
    fn play_cue(&self, cue: NativeHandle) -> NativeResult<()>;
    fn pause_cue(&self, cue: NativeHandle, pause: bool) -> NativeResult<()>;
    fn stop_cue(&self, cue: NativeHandle, options: AudioStopOptions) -> NativeResult<()>;
    fn get_cue_variable(&self, cue: NativeHandle, name: &str) -> NativeResult<Option<f32>>;
    fn set_cue_variable(&self, cue: NativeHandle, name: &str, value: f32) -> NativeResult<bool>;
    fn destroy_cue(&self, cue: NativeHandle) -> NativeResult<()>;

    /// Releases a handle through the call matching its kind.
    fn release(&self, kind: HandleKind, handle: NativeHandle) -> NativeResult<()> {
        match kind {
            HandleKind::Engine => self.shutdown_engine(handle),
            HandleKind::SoundBank => self.destroy_sound_bank(handle),
            HandleKind::WaveBank => self.destroy_wave_bank(handle),
            HandleKind::Cue => self.destroy_cue(handle),
        }
    }
}
