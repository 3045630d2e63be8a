//! Soundbanks for CueBridge

use crate::cue::Cue;
use crate::engine::{AudioEngine, EngineInner};
use crate::error::{CueBridgeError, Result, require_non_empty};
use crate::events::DisposeCause;
use crate::lifecycle::ObjectCore;
use crate::native::{HandleKind, NativeHandle, StateFlags};
use crate::spatial::{AudioEmitter, AudioListener};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

/// A loaded soundbank: the cue definitions authored for an engine.
#[derive(Clone)]
pub struct SoundBank {
    core: Arc<ObjectCore>,
    engine: Weak<EngineInner>,
}

impl SoundBank {
    /// Loads a soundbank from memory.
    ///
    /// # Errors
    ///
    /// * [`CueBridgeError::Argument`] if `data` is empty
    /// * [`CueBridgeError::InvalidState`] if the engine is disposed
    /// * [`CueBridgeError::NativeResource`] if the engine rejects the data
    pub fn new(engine: &AudioEngine, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(CueBridgeError::empty_argument("data"));
        }
        let engine_core = engine.core();
        let engine_handle = engine_core.live_handle()?;
        let handle = engine_core.backend().create_sound_bank(engine_handle, data)?;
        let core = engine_core.bind_dependent(handle, HandleKind::SoundBank)?;

        log::debug!("Loaded soundbank {} ({} bytes)", handle, data.len());
        Ok(Self {
            core,
            engine: engine.downgrade(),
        })
    }

    pub fn from_file(engine: &AudioEngine, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        require_non_empty("path", &path.to_string_lossy())?;
        let data = std::fs::read(path)?;
        Self::new(engine, &data)
    }

    pub fn handle(&self) -> NativeHandle {
        self.core.handle()
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

    /// Whether cues created from this soundbank are still alive.
    pub fn is_in_use(&self) -> Result<bool> {
        let handle = self.core.live_handle()?;
        let state = self.core.backend().sound_bank_state(handle)?;
        Ok(state.contains(StateFlags::IN_USE))
    }

    /// Prepares a cue for playback. Unknown names give `None`.
    pub fn get_cue(&self, name: &str) -> Result<Option<Cue>> {
        require_non_empty("name", name)?;
        let handle = self.core.live_handle()?;
        let backend = self.core.backend();
        let Some(index) = backend.cue_index(handle, name) else {
            log::debug!("Soundbank {} has no cue named '{}'", handle, name);
            return Ok(None);
        };

        let cue_handle = backend.prepare_cue(handle, index)?;
        let core = self.core.bind_dependent(cue_handle, HandleKind::Cue)?;
        Ok(Some(Cue::new(core, name)))
    }

    /// Plays a cue once without handing it out. Returns `false` if the
    /// soundbank has no cue with that name.
    pub fn play_cue(&self, name: &str) -> Result<bool> {
        require_non_empty("name", name)?;
        let handle = self.core.live_handle()?;
        let backend = self.core.backend();
        let Some(index) = backend.cue_index(handle, name) else {
            return Ok(false);
        };
        backend.play_cue_index(handle, index)?;
        Ok(true)
    }

    /// Plays a positioned cue once without handing it out. The engine keeps
    /// the cue until it stops; see [`AudioEngine::update`].
    pub fn play_cue_3d(&self, name: &str, listener: &AudioListener, emitter: &AudioEmitter) -> Result<bool> {
        let Some(cue) = self.get_cue(name)? else {
            return Ok(false);
        };
        cue.apply_3d(listener, emitter)?;
        cue.play()?;

        let engine = self
            .engine
            .upgrade()
            .ok_or_else(|| CueBridgeError::disposed(HandleKind::Engine))?;
        AudioEngine::from_inner(engine).detach(cue);
        Ok(true)
    }
}

impl PartialEq for SoundBank {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for SoundBank {}

impl fmt::Debug for SoundBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundBank")
            .field("handle", &self.handle())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{BlobBuilder, NativeStatus, SimOp, SimulatedBackend};
    use crate::{AudioContext, EngineDesc};

    fn setup() -> (Arc<SimulatedBackend>, AudioContext, AudioEngine, SoundBank) {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = Arc::new(SimulatedBackend::new());
        let context = AudioContext::new(backend.clone());
        let engine = AudioEngine::new(
            &context,
            EngineDesc::new(BlobBuilder::settings().build()),
        )
        .expect("engine");
        let bank = SoundBank::new(
            &engine,
            &BlobBuilder::sound_bank().cue("Explosion", 2).build(),
        )
        .expect("sound bank");
        (backend, context, engine, bank)
    }

    #[test]
    fn corrupted_data_is_rejected_without_registration() {
        let (_backend, context, engine, _bank) = setup();
        let before = context.registry().len();

        let result = SoundBank::new(&engine, b"not a soundbank");
        assert!(matches!(
            result,
            Err(CueBridgeError::NativeResource { status }) if status == NativeStatus::INVALID_DATA
        ));
        assert_eq!(context.registry().len(), before);
        assert!(matches!(SoundBank::new(&engine, &[]), Err(CueBridgeError::Argument(_))));
    }

    #[test]
    fn unknown_cue_is_none() {
        let (backend, _context, _engine, bank) = setup();
        assert!(bank.get_cue("Unknown").expect("lookup").is_none());
        assert!(!bank.play_cue("Unknown").expect("play"));
        assert_eq!(backend.live_cue_count(), 0);
    }

    #[test]
    fn bank_is_in_use_while_cues_live() {
        let (_backend, _context, _engine, bank) = setup();
        assert!(!bank.is_in_use().expect("state"));

        let cue = bank.get_cue("Explosion").expect("lookup").expect("cue");
        assert_eq!(cue.name(), "Explosion");
        assert!(bank.is_in_use().expect("state"));

        cue.dispose();
        assert!(!bank.is_in_use().expect("state"));
    }

    #[test]
    fn fire_and_forget_cue_is_released_by_the_engine() {
        let (backend, context, engine, bank) = setup();
        assert!(bank.play_cue("Explosion").expect("play"));
        assert_eq!(backend.live_cue_count(), 1);

        engine.update().expect("tick");
        engine.update().expect("tick");

        assert_eq!(backend.live_cue_count(), 0);
        assert!(context.poll_events().iter().all(|event| !event.is_error()));
    }

    #[test]
    fn disposing_the_bank_disposes_its_cues_through_notifications() {
        let (backend, _context, _engine, bank) = setup();
        let cue = bank.get_cue("Explosion").expect("lookup").expect("cue");

        bank.dispose();

        assert!(bank.is_disposed());
        assert!(cue.is_disposed());
        assert_eq!(backend.release_count(bank.handle()), 1);
        assert_eq!(backend.release_count(cue.handle()), 0);
    }

    #[test]
    fn failed_prepare_leaves_nothing_behind() {
        let (backend, context, _engine, bank) = setup();
        let before = context.registry().len();
        backend.inject_failure(SimOp::PrepareCue, NativeStatus::OUT_OF_MEMORY);

        let result = bank.get_cue("Explosion");
        assert!(matches!(result, Err(CueBridgeError::NativeResource { .. })));
        assert_eq!(context.registry().len(), before);
        assert_eq!(backend.live_cue_count(), 0);
    }

    #[test]
    fn loads_from_file() {
        let (_backend, _context, engine, _bank) = setup();
        let path = std::env::temp_dir().join(format!("cuebridge-{}.xsb", uuid::Uuid::new_v4()));
        std::fs::write(&path, BlobBuilder::sound_bank().cue("Blip", 1).build()).expect("write");

        let bank = SoundBank::from_file(&engine, &path).expect("load");
        assert!(bank.get_cue("Blip").expect("lookup").is_some());
        std::fs::remove_file(&path).expect("cleanup");

        assert!(matches!(
            SoundBank::from_file(&engine, &path),
            Err(CueBridgeError::Io(_))
        ));
    }
}
