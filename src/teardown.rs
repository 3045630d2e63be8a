//! Engine teardown.
//!
//! Disposing an engine disposes every live object it owns first, cues before
//! soundbanks before wavebanks, and shuts the engine down last.

use crate::events::DisposeCause;
use crate::lifecycle::ObjectCore;

pub(crate) fn teardown(engine: &ObjectCore, cause: DisposeCause) {
    let registry = &engine.context().registry;
    {
        let mut table = registry.lock();
        if !engine.life().claim() {
            return;
        }
        table.unregister(engine.handle(), engine);
    }

    // Releases claimed by other threads before ours finish first.
    engine.owner_releases().wait_idle();

    // No dependent can register past this point: registration requires a live owner.
    let mut dependents = registry.snapshot_owned_by(engine.handle());
    dependents.sort_by_key(|object| object.kind().teardown_rank());
    log::info!(
        "Shutting down engine {} with {} live dependents",
        engine.handle(),
        dependents.len()
    );

    for dependent in &dependents {
        dependent.dispose(DisposeCause::EngineTeardown);
    }
    drop(dependents);

    // Dependents claimed elsewhere while we were disposing are not in the snapshot.
    engine.owner_releases().wait_idle();
    engine.finish_dispose(cause);
}

#[cfg(test)]
mod tests {
    use crate::context::AudioContext;
    use crate::events::{CueBridgeEvent, DisposeCause};
    use crate::native::{BlobBuilder, HandleKind, NativeStatus, SimOp, SimulatedBackend};
    use crate::{AudioEngine, CueBridgeError, EngineDesc, SoundBank, WaveBank};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Fixture {
        backend: Arc<SimulatedBackend>,
        context: AudioContext,
        engine: AudioEngine,
        sound_bank: SoundBank,
        wave_bank: WaveBank,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = Arc::new(SimulatedBackend::new());
        let context = AudioContext::new(backend.clone());
        let engine = AudioEngine::new(
            &context,
            EngineDesc::new(BlobBuilder::settings().category("Music").build()),
        )
        .expect("engine");
        let wave_bank = WaveBank::new(&engine, &BlobBuilder::wave_bank().build()).expect("wave bank");
        let sound_bank = SoundBank::new(
            &engine,
            &BlobBuilder::sound_bank().cue("Explosion", 3).cue("Laser", 1).build(),
        )
        .expect("sound bank");
        Fixture {
            backend,
            context,
            engine,
            sound_bank,
            wave_bank,
        }
    }

    fn disposed_kinds(events: &[CueBridgeEvent]) -> Vec<HandleKind> {
        events
            .iter()
            .filter_map(|event| match event {
                CueBridgeEvent::ObjectDisposed { kind, .. } => Some(*kind),
                CueBridgeEvent::ReleaseFailed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn dependents_are_released_in_order_before_the_engine() {
        let f = fixture();
        let first = f.sound_bank.get_cue("Explosion").expect("lookup").expect("cue");
        let second = f.sound_bank.get_cue("Laser").expect("lookup").expect("cue");
        f.context.poll_events();

        f.engine.dispose();

        let events = f.context.poll_events();
        assert_eq!(
            disposed_kinds(&events),
            vec![
                HandleKind::Cue,
                HandleKind::Cue,
                HandleKind::SoundBank,
                HandleKind::WaveBank,
                HandleKind::Engine,
            ]
        );
        for handle in [
            first.handle(),
            second.handle(),
            f.sound_bank.handle(),
            f.wave_bank.handle(),
            f.engine.handle(),
        ] {
            assert_eq!(f.backend.release_count(handle), 1, "{handle}");
        }
        assert!(first.is_disposed() && second.is_disposed());
        assert!(f.sound_bank.is_disposed() && f.wave_bank.is_disposed());
        assert!(f.context.registry().is_empty());
    }

    #[test]
    fn teardown_causes_are_reported() {
        let f = fixture();
        let cue = f.sound_bank.get_cue("Explosion").expect("lookup").expect("cue");
        f.context.poll_events();

        f.engine.dispose();

        for event in f.context.poll_events() {
            if let CueBridgeEvent::ObjectDisposed { handle, cause, .. } = event {
                let expected = if handle == f.engine.handle() {
                    DisposeCause::Explicit
                } else {
                    DisposeCause::EngineTeardown
                };
                assert_eq!(cause, expected, "{handle}");
            }
        }
        assert!(cue.is_disposed());
    }

    #[test]
    fn late_dispose_of_dependents_does_not_touch_native() {
        let f = fixture();
        let cue = f.sound_bank.get_cue("Explosion").expect("lookup").expect("cue");
        f.engine.dispose();

        cue.dispose();
        f.sound_bank.dispose();
        drop(cue);

        assert_eq!(f.backend.release_count(f.sound_bank.handle()), 1);
        assert_eq!(f.backend.release_count(f.engine.handle()), 1);
    }

    #[test]
    fn repeated_engine_dispose_shuts_down_once() {
        let f = fixture();
        f.engine.dispose();
        f.engine.dispose();
        let clone = f.engine.clone();
        drop(clone);

        assert_eq!(f.backend.release_count(f.engine.handle()), 1);
        assert!(!f.backend.contains(f.engine.handle()));
    }

    #[test]
    fn failing_dependent_release_does_not_stop_teardown() {
        let f = fixture();
        f.backend
            .inject_failure(SimOp::DestroySoundBank, NativeStatus::FAIL);
        f.context.poll_events();

        f.engine.dispose();

        let events = f.context.poll_events();
        assert!(events.iter().any(|event| matches!(
            event,
            CueBridgeEvent::ReleaseFailed { kind: HandleKind::SoundBank, .. }
        )));
        assert!(f.engine.is_disposed());
        assert_eq!(f.backend.release_count(f.engine.handle()), 1);
        assert!(!f.backend.contains(f.engine.handle()));
    }

    #[test]
    fn dropping_the_engine_tears_it_down() {
        let f = fixture();
        let handle = f.engine.handle();
        let Fixture {
            backend,
            context,
            engine,
            sound_bank,
            wave_bank,
        } = f;
        drop(engine);

        assert!(sound_bank.is_disposed());
        assert!(wave_bank.is_disposed());
        assert_eq!(backend.release_count(handle), 1);
        assert!(context.registry().is_empty());
    }

    #[test]
    fn engine_waits_for_a_release_running_on_another_thread() {
        let f = fixture();
        let cue = f.sound_bank.get_cue("Explosion").expect("lookup").expect("cue");
        let cue_handle = cue.handle();
        f.backend
            .inject_delay(SimOp::DestroyCue, Duration::from_millis(300));
        f.context.poll_events();

        let releaser = thread::spawn(move || cue.dispose());
        thread::sleep(Duration::from_millis(50));
        f.engine.dispose();
        releaser.join().expect("release thread");

        assert_eq!(
            f.backend.release_order(),
            vec![
                cue_handle,
                f.sound_bank.handle(),
                f.wave_bank.handle(),
                f.engine.handle(),
            ]
        );
        let events = f.context.poll_events();
        assert!(!events.iter().any(CueBridgeEvent::is_error), "{events:?}");
    }

    #[test]
    fn bank_created_during_teardown_is_left_to_the_engine_shutdown() {
        let f = fixture();
        f.backend
            .inject_delay(SimOp::CreateSoundBank, Duration::from_millis(300));
        f.context.poll_events();

        let loader = {
            let engine = f.engine.clone();
            thread::spawn(move || {
                SoundBank::new(&engine, &BlobBuilder::sound_bank().cue("Late", 1).build())
            })
        };
        thread::sleep(Duration::from_millis(50));
        f.engine.dispose();
        let result = loader.join().expect("loader thread");

        assert!(matches!(result, Err(CueBridgeError::InvalidState(_))));
        assert_eq!(
            f.backend.release_order(),
            vec![
                f.sound_bank.handle(),
                f.wave_bank.handle(),
                f.engine.handle(),
            ]
        );
        assert!(f.context.registry().is_empty());
        assert!(!f.context.poll_events().iter().any(CueBridgeEvent::is_error));
    }
}
