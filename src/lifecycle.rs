//! Disposal protocol shared by engines, soundbanks, wavebanks and cues.
//!
//! Every wrapper owns an [`ObjectCore`]. The core walks the states
//! `Live -> Disposing -> Disposed` exactly once. The `Live -> Disposing` step is
//! a compare-and-set made while holding the registry lock; whoever wins it
//! performs the native release, everyone else returns.

use crate::context::ContextShared;
use crate::error::{CueBridgeError, Result};
use crate::events::{CueBridgeEvent, DisposeCause};
use crate::native::{HandleKind, NativeAudioBackend, NativeHandle};
use crate::teardown;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifeState {
    Live,
    Disposing,
    Disposed,
}

impl LifeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Live,
            1 => Self::Disposing,
            _ => Self::Disposed,
        }
    }
}

/// Shared, monotonic life state.
///
/// The registry keeps a clone of each object's cell next to its weak
/// reference, so an entry can still be claimed while its wrapper is being
/// dropped.
#[derive(Debug)]
pub(crate) struct LifeCell(AtomicU8);

impl LifeCell {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(LifeState::Live as u8)))
    }

    pub(crate) fn state(&self) -> LifeState {
        LifeState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is_live(&self) -> bool {
        self.state() == LifeState::Live
    }

    /// Whether the native resource behind this cell has been released.
    pub(crate) fn is_released(&self) -> bool {
        self.state() == LifeState::Disposed
    }

    /// `Live -> Disposing`. Only called with the registry lock held.
    pub(crate) fn claim(&self) -> bool {
        self.0
            .compare_exchange(
                LifeState::Live as u8,
                LifeState::Disposing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Disposing -> Disposed`.
    pub(crate) fn settle(&self) {
        self.0.store(LifeState::Disposed as u8, Ordering::Release);
    }
}

/// Counts the dependent releases of one engine that are in flight, so the
/// engine is shut down only after they reach the native engine.
#[derive(Debug, Default)]
pub(crate) struct ReleaseGate {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl ReleaseGate {
    /// Only called with the registry lock held, together with the claim.
    fn enter(&self) -> InFlightRelease<'_> {
        *self.count() += 1;
        InFlightRelease(self)
    }

    /// Blocks until no release entered so far is still running.
    pub(crate) fn wait_idle(&self) {
        let in_flight = self.count();
        let _idle = self
            .idle
            .wait_while(in_flight, |in_flight| *in_flight > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn count(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct InFlightRelease<'a>(&'a ReleaseGate);

impl Drop for InFlightRelease<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.0.count();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.0.idle.notify_all();
        }
    }
}

type DisposingObserver = Box<dyn FnOnce() + Send>;

pub(crate) struct ObjectCore {
    context: Arc<ContextShared>,
    handle: NativeHandle,
    kind: HandleKind,
    owner: NativeHandle,
    owner_life: Arc<LifeCell>,
    owner_releases: Arc<ReleaseGate>,
    life: Arc<LifeCell>,
    observers: Mutex<Option<Vec<DisposingObserver>>>,
}

impl ObjectCore {
    /// Core of an engine. An engine owns itself.
    pub(crate) fn new_engine(context: Arc<ContextShared>, handle: NativeHandle) -> Arc<Self> {
        let life = LifeCell::new();
        Arc::new(Self {
            context,
            handle,
            kind: HandleKind::Engine,
            owner: handle,
            owner_life: life.clone(),
            owner_releases: Arc::default(),
            life,
            observers: Mutex::new(Some(Vec::new())),
        })
    }

    fn new_dependent(&self, handle: NativeHandle, kind: HandleKind) -> Self {
        Self {
            context: self.context.clone(),
            handle,
            kind,
            owner: self.owner,
            owner_life: self.owner_life.clone(),
            owner_releases: self.owner_releases.clone(),
            life: LifeCell::new(),
            observers: Mutex::new(Some(Vec::new())),
        }
    }

    /// Wraps a freshly created native resource owned by the same engine as
    /// `self` and registers it.
    ///
    /// On failure no wrapper escapes and the native resource is left alone:
    /// either the handle belongs to the live object already registered under
    /// it, or the owning engine is going down and its shutdown frees it.
    pub(crate) fn bind_dependent(&self, handle: NativeHandle, kind: HandleKind) -> Result<Arc<Self>> {
        let core = Arc::new(self.new_dependent(handle, kind));
        match self.context.registry.register(&core) {
            Ok(()) => Ok(core),
            Err(error) => {
                core.discard(false);
                Err(error)
            }
        }
    }

    pub(crate) fn context(&self) -> &Arc<ContextShared> {
        &self.context
    }

    pub(crate) fn backend(&self) -> &dyn NativeAudioBackend {
        self.context.backend.as_ref()
    }

    pub(crate) fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub(crate) fn kind(&self) -> HandleKind {
        self.kind
    }

    pub(crate) fn owner(&self) -> NativeHandle {
        self.owner
    }

    pub(crate) fn owner_life(&self) -> &Arc<LifeCell> {
        &self.owner_life
    }

    /// Releases in flight for the owning engine's dependents.
    pub(crate) fn owner_releases(&self) -> &ReleaseGate {
        &self.owner_releases
    }

    pub(crate) fn life(&self) -> &Arc<LifeCell> {
        &self.life
    }

    pub(crate) fn is_disposed(&self) -> bool {
        !self.life.is_live()
    }

    /// The native handle, as long as the object is live.
    pub(crate) fn live_handle(&self) -> Result<NativeHandle> {
        if self.is_disposed() {
            return Err(CueBridgeError::disposed(self.kind));
        }
        Ok(self.handle)
    }

    /// The owning engine's native handle, as long as that engine is live.
    pub(crate) fn live_owner(&self) -> Result<NativeHandle> {
        if !self.owner_life.is_live() {
            return Err(CueBridgeError::disposed(HandleKind::Engine));
        }
        Ok(self.owner)
    }

    /// Registers a callback that runs once when the object is disposed.
    /// Callbacks registered after disposal never run.
    ///
    /// A cue's callbacks may run on a notification thread while a soundbank of
    /// the same engine is being released, so they must not dispose that engine.
    pub(crate) fn on_disposing(&self, observer: DisposingObserver) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(observers) = observers.as_mut() {
            observers.push(observer);
        }
    }

    pub(crate) fn dispose(&self, cause: DisposeCause) {
        if self.is_disposed() {
            return;
        }
        if self.kind == HandleKind::Engine {
            teardown::teardown(self, cause);
            return;
        }

        let in_flight = {
            let mut table = self.context.registry.lock();
            if !self.life.claim() {
                return;
            }
            table.unregister(self.handle, self);
            self.owner_releases.enter()
        };
        self.release_native(cause);
        drop(in_flight);
        self.complete(cause);
    }

    /// Second half of a disposal whose claim has already been won. Runs
    /// without the registry lock.
    pub(crate) fn finish_dispose(&self, cause: DisposeCause) {
        self.release_native(cause);
        self.complete(cause);
    }

    fn release_native(&self, cause: DisposeCause) {
        if cause.releases_native() {
            if self.owner_life.is_released() {
                log::debug!(
                    "Skipping release of {} {}: engine {} is already shut down",
                    self.kind,
                    self.handle,
                    self.owner
                );
            } else if let Err(status) = self.backend().release(self.kind, self.handle) {
                log::warn!(
                    "Failed to release {} {}: {} ({})",
                    self.kind,
                    self.handle,
                    status,
                    status.description()
                );
                self.context.emit(CueBridgeEvent::ReleaseFailed {
                    handle: self.handle,
                    kind: self.kind,
                    status,
                });
            }
        }
    }

    fn complete(&self, cause: DisposeCause) {
        self.life.settle();
        log::debug!("Disposed {} {} ({:?})", self.kind, self.handle, cause);
        self.context.emit(CueBridgeEvent::ObjectDisposed {
            handle: self.handle,
            kind: self.kind,
            cause,
        });

        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        for observer in observers.into_iter().flatten() {
            observer();
        }
    }

    /// Retires an object that never became visible outside its constructor.
    /// Only an engine, which owns itself, asks for its native release here.
    pub(crate) fn discard(&self, release: bool) {
        if !self.life.claim() {
            return;
        }
        if release && !self.owner_life.is_released() {
            if let Err(status) = self.backend().release(self.kind, self.handle) {
                log::warn!("Failed to release unbound {} {}: {}", self.kind, self.handle, status);
            }
        }
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.life.settle();
    }
}

impl Drop for ObjectCore {
    fn drop(&mut self) {
        self.dispose(DisposeCause::Dropped);

        // Left over only when the engine destroyed the object during the drop.
        let observers = self
            .observers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        for observer in observers.into_iter().flatten() {
            observer();
        }
    }
}
