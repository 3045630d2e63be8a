//! Audio engine for CueBridge

use crate::category::AudioCategory;
use crate::config::EngineDesc;
use crate::context::AudioContext;
use crate::cue::Cue;
use crate::error::{CueBridgeError, Result, require_non_empty};
use crate::events::DisposeCause;
use crate::lifecycle::ObjectCore;
use crate::native::{EngineParams, NativeHandle, NativeRendererDetail, NativeResult, NotificationKind};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use uuid::Uuid;

pub(crate) struct EngineInner {
    pub(crate) core: Arc<ObjectCore>,
    /// Cues started through `play_cue_3d`, kept alive until they stop.
    detached: Mutex<Vec<Cue>>,
}

/// A native 3D audio engine instance.
///
/// Clones share the same engine. The engine is shut down when
/// [`dispose`](Self::dispose) is called or the last clone is dropped, after
/// every soundbank, wavebank and cue created from it has been released.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Creates an engine from a global settings blob.
    ///
    /// # Arguments
    ///
    /// * `context` - The context the engine and its objects live in
    /// * `desc` - Settings blob, lookahead and renderer selection
    ///
    /// # Errors
    ///
    /// * [`CueBridgeError::Argument`] if the settings blob is empty
    /// * [`CueBridgeError::NoHardware`] if there is no audio device
    /// * [`CueBridgeError::NativeResource`] if the engine rejects the settings
    pub fn new(context: &AudioContext, desc: EngineDesc) -> Result<Self> {
        if desc.settings.is_empty() {
            return Err(CueBridgeError::empty_argument("settings"));
        }

        let backend = context.backend();
        let params = EngineParams {
            settings: &desc.settings,
            lookahead: desc.lookahead,
            renderer_id: desc.renderer_id,
        };
        let handle = backend.create_engine(&params, context.notification_callback())?;

        if let Err(status) = backend.register_notification(handle, NotificationKind::CueDestroyed) {
            log::error!("Failed to register cue notifications for {}: {}", handle, status);
            if let Err(shutdown) = backend.shutdown_engine(handle) {
                log::warn!("Failed to shut down engine {}: {}", handle, shutdown);
            }
            return Err(status.into());
        }

        let core = ObjectCore::new_engine(context.shared().clone(), handle);
        // The engine is new and live, so only a stale duplicate can fail here.
        if let Err(error) = context.registry().register(&core) {
            core.discard(true);
            return Err(error);
        }

        log::info!(
            "Created engine {} (lookahead {:?}, renderer {})",
            handle,
            desc.lookahead,
            desc.renderer_id
                .map_or_else(|| "default".to_string(), |id| id.to_string())
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                core,
                detached: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Creates an engine from a global settings file.
    pub fn from_settings_file(context: &AudioContext, path: impl AsRef<Path>) -> Result<Self> {
        Self::new(context, EngineDesc::from_settings_file(path)?)
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn core(&self) -> &Arc<ObjectCore> {
        &self.inner.core
    }

    pub(crate) fn downgrade(&self) -> Weak<EngineInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn handle(&self) -> NativeHandle {
        self.inner.core.handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.core.is_disposed()
    }

    /// Disposes every object created from this engine, then shuts it down.
    pub fn dispose(&self) {
        self.inner.core.dispose(DisposeCause::Explicit);
    }

    /// Runs `observer` once when the engine is disposed.
    pub fn on_disposing(&self, observer: impl FnOnce() + Send + 'static) {
        self.inner.core.on_disposing(Box::new(observer));
    }

    /// Lists the audio renderers (output devices) the engine can use.
    pub fn renderer_details(&self) -> Result<Vec<RendererDetail>> {
        let handle = self.inner.core.live_handle()?;
        let backend = self.inner.core.backend();
        let count = backend.renderer_count(handle)?;
        let details = (0..count)
            .map(|index| backend.renderer_detail(handle, index).map(RendererDetail::from_native))
            .collect::<NativeResult<Vec<_>>>()?;
        Ok(details)
    }

    /// Looks up a category by its friendly name. Unknown names give `None`.
    pub fn get_category(&self, name: &str) -> Result<Option<AudioCategory>> {
        require_non_empty("name", name)?;
        let handle = self.inner.core.live_handle()?;
        Ok(self
            .inner
            .core
            .backend()
            .category(handle, name)
            .map(|index| AudioCategory::new(self.downgrade(), name, index)))
    }

    /// Value of a global variable. Unknown names give `None`.
    pub fn get_global_variable(&self, name: &str) -> Result<Option<f32>> {
        require_non_empty("name", name)?;
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().get_global_variable(handle, name)?)
    }

    /// Sets a global variable. Returns `false` if no variable has that name.
    pub fn set_global_variable(&self, name: &str, value: f32) -> Result<bool> {
        require_non_empty("name", name)?;
        let handle = self.inner.core.live_handle()?;
        Ok(self.inner.core.backend().set_global_variable(handle, name, value)?)
    }

    /// Performs periodic engine work. Call once per frame.
    pub fn update(&self) -> Result<()> {
        let handle = self.inner.core.live_handle()?;
        self.inner.core.backend().do_work(handle)?;
        self.reap_detached();
        Ok(())
    }

    pub(crate) fn detach(&self, cue: Cue) {
        self.detached().push(cue);
    }

    /// Number of fire-and-forget 3D cues still held by the engine.
    pub fn detached_cue_count(&self) -> usize {
        self.detached().len()
    }

    fn detached(&self) -> std::sync::MutexGuard<'_, Vec<Cue>> {
        self.inner
            .detached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reap_detached(&self) {
        let cues = std::mem::take(&mut *self.detached());
        let (running, finished): (Vec<Cue>, Vec<Cue>) = cues
            .into_iter()
            .partition(|cue| matches!(cue.is_stopped(), Ok(false)));
        self.detached().extend(running);

        if !finished.is_empty() {
            log::trace!("Releasing {} finished 3D cues", finished.len());
        }
        drop(finished);
    }
}

impl PartialEq for AudioEngine {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AudioEngine {}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("handle", &self.handle())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// An audio output device the engine can render to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RendererDetail {
    friendly_name: String,
    renderer_id: Uuid,
}

impl RendererDetail {
    pub(crate) fn from_native(detail: NativeRendererDetail) -> Self {
        let renderer_id = Uuid::parse_str(&detail.renderer_id).unwrap_or_else(|error| {
            log::warn!(
                "Renderer '{}' has an unreadable id {:?}: {}",
                detail.display_name,
                detail.renderer_id,
                error
            );
            Uuid::nil()
        });
        Self {
            friendly_name: detail.display_name,
            renderer_id,
        }
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn renderer_id(&self) -> Uuid {
        self.renderer_id
    }
}

impl std::fmt::Display for RendererDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.friendly_name, self.renderer_id.braced())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{BlobBuilder, NativeStatus, SimOp, SimulatedBackend};
    use crate::{AudioEmitter, AudioListener, SoundBank};

    fn settings() -> Vec<u8> {
        BlobBuilder::settings()
            .category("Music")
            .category("Default")
            .variable("SpeedOfSound", 343.5)
            .build()
    }

    fn setup() -> (Arc<SimulatedBackend>, AudioContext, AudioEngine) {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = Arc::new(SimulatedBackend::new());
        let context = AudioContext::new(backend.clone());
        let engine = AudioEngine::new(&context, EngineDesc::new(settings())).expect("engine");
        (backend, context, engine)
    }

    #[test]
    fn engine_with_valid_settings_is_live() {
        let (backend, context, engine) = setup();
        assert!(!engine.is_disposed());
        assert!(backend.contains(engine.handle()));
        assert!(context.registry().contains(engine.handle()));
    }

    #[test]
    fn renderer_details_match_native_count() {
        let (_backend, _context, engine) = setup();
        let details = engine.renderer_details().expect("details");
        assert_eq!(details.len(), 2);
        assert!(details[0].friendly_name().starts_with("Speakers"));
        assert_ne!(details[0].renderer_id(), Uuid::nil());
        assert_ne!(details[0], details[1]);
    }

    #[test]
    fn selected_renderer_must_exist() {
        let backend = Arc::new(SimulatedBackend::new());
        let context = AudioContext::new(backend);
        let first = AudioEngine::new(&context, EngineDesc::new(settings())).expect("engine");
        let renderer = first.renderer_details().expect("details")[1].renderer_id();

        let chosen = AudioEngine::new(&context, EngineDesc::new(settings()).renderer_id(renderer));
        assert!(chosen.is_ok());

        let unknown = AudioEngine::new(&context, EngineDesc::new(settings()).renderer_id(Uuid::new_v4()));
        assert!(matches!(unknown, Err(CueBridgeError::NativeResource { .. })));
    }

    #[test]
    fn unreadable_renderer_id_becomes_nil() {
        let detail = RendererDetail::from_native(NativeRendererDetail {
            display_name: "Broken".to_string(),
            renderer_id: "not-a-guid".to_string(),
        });
        assert_eq!(detail.renderer_id(), Uuid::nil());
        assert_eq!(detail.friendly_name(), "Broken");
    }

    #[test]
    fn construction_argument_errors() {
        let context = AudioContext::new(Arc::new(SimulatedBackend::new()));
        assert!(matches!(
            AudioEngine::new(&context, EngineDesc::default()),
            Err(CueBridgeError::Argument(_))
        ));
        assert!(matches!(
            AudioEngine::from_settings_file(&context, ""),
            Err(CueBridgeError::Argument(_))
        ));
    }

    #[test]
    fn no_renderer_is_no_hardware() {
        let context = AudioContext::new(Arc::new(SimulatedBackend::with_renderers(Vec::new())));
        let result = AudioEngine::new(&context, EngineDesc::new(settings()));
        assert!(matches!(result, Err(CueBridgeError::NoHardware)));
        assert!(context.registry().is_empty());
    }

    #[test]
    fn failed_notification_registration_shuts_the_engine_down() {
        let backend = Arc::new(SimulatedBackend::new());
        let context = AudioContext::new(backend.clone());
        backend.inject_failure(SimOp::RegisterNotification, NativeStatus::NOTIFICATION_REGISTERED);

        let result = AudioEngine::new(&context, EngineDesc::new(settings()));
        let error = result.expect_err("registration failure");
        assert_eq!(error.status(), Some(NativeStatus::NOTIFICATION_REGISTERED));
        assert!(context.registry().is_empty());
        assert!(context.poll_events().is_empty());
    }

    #[test]
    fn global_variables() {
        let (_backend, _context, engine) = setup();
        assert_eq!(engine.get_global_variable("SpeedOfSound").expect("get"), Some(343.5));
        assert_eq!(engine.get_global_variable("Missing").expect("get"), None);
        assert!(engine.set_global_variable("SpeedOfSound", 300.0).expect("set"));
        assert!(!engine.set_global_variable("Missing", 1.0).expect("set"));
        assert_eq!(engine.get_global_variable("SpeedOfSound").expect("get"), Some(300.0));
        assert!(matches!(
            engine.get_global_variable(""),
            Err(CueBridgeError::Argument(_))
        ));
    }

    #[test]
    fn categories_are_looked_up_by_name() {
        let (_backend, _context, engine) = setup();
        let music = engine.get_category("Music").expect("lookup").expect("category");
        assert_eq!(music.name(), "Music");
        assert_eq!(engine.get_category("Music").expect("lookup"), Some(music));
        assert!(engine.get_category("Unknown").expect("lookup").is_none());
    }

    #[test]
    fn operations_after_dispose_are_invalid() {
        let (_backend, _context, engine) = setup();
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = fired.clone();
        engine.on_disposing(move || flag.store(true, std::sync::atomic::Ordering::SeqCst));

        engine.dispose();

        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
        assert!(matches!(engine.update(), Err(CueBridgeError::InvalidState(_))));
        assert!(matches!(engine.renderer_details(), Err(CueBridgeError::InvalidState(_))));
        assert!(matches!(engine.get_category("Music"), Err(CueBridgeError::InvalidState(_))));
    }

    #[test]
    fn update_releases_finished_3d_cues() {
        let (backend, _context, engine) = setup();
        let bank = SoundBank::new(&engine, &BlobBuilder::sound_bank().cue("Whoosh", 2).build())
            .expect("bank");

        let played = bank
            .play_cue_3d("Whoosh", &AudioListener::default(), &AudioEmitter::default())
            .expect("play");
        assert!(played);
        assert_eq!(engine.detached_cue_count(), 1);
        assert_eq!(backend.live_cue_count(), 1);

        engine.update().expect("tick");
        assert_eq!(engine.detached_cue_count(), 1);
        engine.update().expect("tick");
        assert_eq!(engine.detached_cue_count(), 0);
        assert_eq!(backend.live_cue_count(), 0);
    }

    #[test]
    fn engines_compare_by_identity() {
        let (_backend, context, engine) = setup();
        let other = AudioEngine::new(&context, EngineDesc::new(settings())).expect("engine");
        assert_eq!(engine, engine.clone());
        assert_ne!(engine, other);
    }
}
