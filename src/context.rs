//! Explicit context for CueBridge
//!
//! An [`AudioContext`] bundles the native backend, the handle registry and the
//! event queue. Every engine and every object created from it share the
//! context, so independent contexts (one per test, for instance) never see
//! each other's objects.

use crate::events::CueBridgeEvent;
use crate::native::{NativeAudioBackend, NotificationCallback};
use crate::registry::InstanceRegistry;
use crate::router::NotificationRouter;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct ContextShared {
    pub(crate) backend: Arc<dyn NativeAudioBackend>,
    pub(crate) registry: InstanceRegistry,
    event_sender: Sender<CueBridgeEvent>,
    event_receiver: Receiver<CueBridgeEvent>,
    keyboard_hook_installed: AtomicBool,
}

impl ContextShared {
    pub(crate) fn emit(&self, event: CueBridgeEvent) {
        if let Err(error) = self.event_sender.send(event) {
            log::warn!("Dropped event: {}", error);
        }
    }

    /// Reserves the single keyboard hook slot of this context.
    pub(crate) fn claim_keyboard_hook(&self) -> bool {
        self.keyboard_hook_installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_keyboard_hook(&self) {
        self.keyboard_hook_installed.store(false, Ordering::Release);
    }
}

/// Shared state for a set of engines talking to one native backend.
#[derive(Clone)]
pub struct AudioContext {
    shared: Arc<ContextShared>,
}

impl AudioContext {
    pub fn new(backend: Arc<dyn NativeAudioBackend>) -> Self {
        let (event_sender, event_receiver) = unbounded();
        Self {
            shared: Arc::new(ContextShared {
                backend,
                registry: InstanceRegistry::new(),
                event_sender,
                event_receiver,
                keyboard_hook_installed: AtomicBool::new(false),
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn NativeAudioBackend> {
        &self.shared.backend
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.shared.registry
    }

    /// Drains the events queued since the last call.
    ///
    /// Events are queued by whichever thread disposed an object, including
    /// the engine's notification threads.
    pub fn poll_events(&self) -> Vec<CueBridgeEvent> {
        self.shared.event_receiver.try_iter().collect()
    }

    pub(crate) fn shared(&self) -> &Arc<ContextShared> {
        &self.shared
    }

    /// Entry point handed to the native engine for its notifications.
    pub(crate) fn notification_callback(&self) -> NotificationCallback {
        NotificationRouter::new(Arc::downgrade(&self.shared)).into_callback()
    }
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("registered", &self.shared.registry.len())
            .field("pending_events", &self.shared.event_receiver.len())
            .finish()
    }
}
