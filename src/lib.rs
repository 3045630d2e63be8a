//! # CueBridge
//!
//! Safe, lifetime-managed bindings to a native 3D audio engine that plays
//! authored cues from soundbanks and wavebanks.
//!
//! Every native resource is owned by a wrapper. Wrappers release their
//! resource exactly once, whether they are disposed explicitly, dropped, torn
//! down with their engine, or destroyed by the engine itself and reported
//! through a notification from one of its threads.
//!
//! ## Quick Start
//!
//! ```
//! # #[cfg(feature = "simulated")] {
//! use cuebridge::native::{BlobBuilder, SimulatedBackend};
//! use cuebridge::*;
//! use std::sync::Arc;
//!
//! // A context ties a native backend to its handle registry and event queue
//! let context = AudioContext::new(Arc::new(SimulatedBackend::new()));
//!
//! let settings = BlobBuilder::settings().category("Music").build();
//! let engine = AudioEngine::new(&context, EngineDesc::new(settings))?;
//!
//! let bank = SoundBank::new(&engine, &BlobBuilder::sound_bank().cue("Explosion", 2).build())?;
//! if let Some(cue) = bank.get_cue("Explosion")? {
//!     let emitter = AudioEmitter::from_pose(&Pose::from_position(Vec3::new(2.0, 0.0, -1.0)));
//!     cue.apply_3d(&AudioListener::default(), &emitter)?;
//!     cue.play()?;
//! }
//!
//! // Drive the engine once per frame
//! engine.update()?;
//!
//! // Disposing the engine disposes everything created from it
//! engine.dispose();
//! for event in context.poll_events() {
//!     println!("{:?}", event);
//! }
//! # }
//! # Ok::<(), cuebridge::CueBridgeError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`AudioContext`]**: Backend, handle registry and event queue shared by a set of engines
//! - **[`AudioEngine`]**: A native engine instance; owns soundbanks, wavebanks and cues
//! - **[`SoundBank`]** / **[`WaveBank`]**: Authored cue definitions and wave data
//! - **[`Cue`]**: A playable, optionally positioned, sound instance
//! - **[`NativeAudioBackend`](native::NativeAudioBackend)**: The seam to the native engine
//! - **[`SystemKeySuppressor`]**: Keeps system shortcut keys from interrupting a game

pub mod category;
pub mod config;
pub mod context;
pub mod cue;
pub mod engine;
pub mod error;
pub mod events;
pub mod keyboard_hook;
mod lifecycle;
pub mod math;
pub mod native;
pub mod registry;
mod router;
pub mod sound_bank;
pub mod spatial;
mod teardown;
pub mod wave_bank;

pub use category::AudioCategory;
pub use config::{EngineDesc, StreamingWaveBankDesc};
pub use context::AudioContext;
pub use cue::Cue;
pub use engine::{AudioEngine, RendererDetail};
pub use error::{CueBridgeError, Result};
pub use events::{CueBridgeEvent, DisposeCause};
pub use keyboard_hook::{
    AccessibilityFeature, AccessibilityFlags, HostLifecycle, KeyAction, KeyDisposition, KeyEvent,
    KeyboardHookFacility, SystemKeySuppressor, VirtualKey,
};
pub use math::{Pose, Quat, Vec3};
pub use native::{AudioStopOptions, HandleKind, NativeHandle, NativeStatus, StateFlags};
pub use registry::InstanceRegistry;
pub use sound_bank::SoundBank;
pub use spatial::{AudioEmitter, AudioListener};
pub use wave_bank::WaveBank;
