//! Routes engine notifications back to the wrappers they concern.

use crate::context::ContextShared;
use crate::events::{CueBridgeEvent, DisposeCause};
use crate::native::{HandleKind, NativeHandle, NativeNotification, NotificationCallback};
use std::sync::{Arc, Weak};

/// The notification entry point of one [`AudioContext`](crate::AudioContext).
///
/// It holds the context weakly: the backend keeps the callback alive, and the
/// context keeps the backend alive.
pub(crate) struct NotificationRouter {
    context: Weak<ContextShared>,
}

impl NotificationRouter {
    pub(crate) fn new(context: Weak<ContextShared>) -> Self {
        Self { context }
    }

    pub(crate) fn into_callback(self) -> NotificationCallback {
        Arc::new(move |notification: &NativeNotification| self.route(notification))
    }

    pub(crate) fn route(&self, notification: &NativeNotification) {
        let Some(context) = self.context.upgrade() else {
            log::trace!("Notification after context shutdown: {:?}", notification);
            return;
        };
        match notification {
            NativeNotification::CueDestroyed { cue } => Self::cue_destroyed(&context, *cue),
        }
    }

    fn cue_destroyed(context: &ContextShared, handle: NativeHandle) {
        let claimed = context.registry.lock().claim_cue(handle);
        let Some(claimed) = claimed else {
            log::trace!("No live cue for {handle}");
            return;
        };

        match claimed.object {
            Some(cue) => cue.finish_dispose(DisposeCause::NativeNotification),
            None => {
                // The wrapper is mid-drop; its dispose will find the claim taken.
                claimed.life.settle();
                log::debug!("Cue {handle} destroyed by the engine while being dropped");
                context.emit(CueBridgeEvent::ObjectDisposed {
                    handle,
                    kind: HandleKind::Cue,
                    cause: DisposeCause::NativeNotification,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AudioContext;
    use crate::native::{BlobBuilder, SimulatedBackend};
    use crate::{AudioEngine, Cue, EngineDesc, SoundBank};
    use std::sync::atomic::{AtomicUsize, Ordering};

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
            &BlobBuilder::sound_bank().cue("Explosion", 3).build(),
        )
        .expect("sound bank");
        (backend, context, engine, bank)
    }

    fn disposals_of(events: &[CueBridgeEvent], handle: NativeHandle) -> Vec<DisposeCause> {
        events
            .iter()
            .filter_map(|event| match event {
                CueBridgeEvent::ObjectDisposed { handle: h, cause, .. } if *h == handle => Some(*cause),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn engine_destroyed_cue_is_disposed_without_release() {
        let (backend, context, _engine, bank) = setup();
        let cue = bank.get_cue("Explosion").expect("lookup").expect("cue");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        cue.on_disposing(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        context.poll_events();

        assert!(backend.destroy_cue_externally(cue.handle()));

        assert!(cue.is_disposed());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(backend.release_count(cue.handle()), 0);
        assert!(!context.registry().contains(cue.handle()));
        assert_eq!(
            disposals_of(&context.poll_events(), cue.handle()),
            vec![DisposeCause::NativeNotification]
        );

        cue.dispose();
        drop(cue);
        assert!(context.poll_events().is_empty());
    }

    #[test]
    fn unknown_handles_are_ignored() {
        let (_backend, context, _engine, _bank) = setup();
        let router = NotificationRouter::new(Arc::downgrade(context.shared()));
        router.route(&NativeNotification::CueDestroyed {
            cue: NativeHandle::from_raw(0xbad0),
        });
        assert!(context.poll_events().is_empty());
    }

    #[test]
    fn notifications_for_other_kinds_are_ignored() {
        let (_backend, context, _engine, bank) = setup();
        let router = NotificationRouter::new(Arc::downgrade(context.shared()));
        router.route(&NativeNotification::CueDestroyed { cue: bank.handle() });

        assert!(!bank.is_disposed());
        assert!(context.registry().contains(bank.handle()));
        assert_eq!(context.registry().resolve(bank.handle()).map(|o| o.kind()), Some(HandleKind::SoundBank));
    }

    #[test]
    fn notification_after_explicit_dispose_is_a_no_op() {
        let (backend, context, _engine, bank) = setup();
        let cue = bank.get_cue("Explosion").expect("lookup").expect("cue");
        let handle = cue.handle();

        // The native destroy fires a notification for the handle it just released.
        cue.dispose();

        assert_eq!(backend.release_count(handle), 1);
        assert_eq!(
            disposals_of(&context.poll_events(), handle),
            vec![DisposeCause::Explicit]
        );
    }

    #[test]
    fn router_outliving_its_context_does_nothing() {
        let backend = Arc::new(SimulatedBackend::new());
        let context = AudioContext::new(backend);
        let router = NotificationRouter::new(Arc::downgrade(context.shared()));
        drop(context);
        router.route(&NativeNotification::CueDestroyed {
            cue: NativeHandle::from_raw(0x10),
        });
    }

    #[test]
    fn racing_drops_and_engine_destruction_dispose_each_cue_once() {
        let (backend, context, _engine, bank) = setup();
        let cues: Vec<Cue> = (0..64)
            .map(|_| bank.get_cue("Explosion").expect("lookup").expect("cue"))
            .collect();
        let handles: Vec<NativeHandle> = cues.iter().map(Cue::handle).collect();
        context.poll_events();

        let destroyer = {
            let backend = backend.clone();
            let handles = handles.clone();
            std::thread::spawn(move || {
                for handle in handles.iter().rev() {
                    backend.destroy_cue_externally(*handle);
                }
            })
        };
        let dropper = std::thread::spawn(move || drop(cues));
        destroyer.join().expect("destroyer");
        dropper.join().expect("dropper");

        let events = context.poll_events();
        for handle in &handles {
            assert_eq!(disposals_of(&events, *handle).len(), 1, "{handle}");
            assert!(backend.release_count(*handle) <= 1);
            assert!(!context.registry().contains(*handle));
        }
    }
}
