use anyhow::{Context, Result};
use cuebridge::native::{BlobBuilder, SimulatedBackend};
use cuebridge::{
    AudioContext, AudioEmitter, AudioEngine, AudioListener, AudioStopOptions, CueBridgeEvent,
    EngineDesc, Pose, Quat, SoundBank, Vec3, WaveBank,
};
use std::sync::Arc;

const FRAMES: usize = 8;

pub fn run() -> Result<()> {
    let backend = Arc::new(SimulatedBackend::new());
    let context = AudioContext::new(backend.clone());

    let settings = BlobBuilder::settings()
        .category("Music")
        .category("Effects")
        .variable("SpeedOfSound", 343.5)
        .build();
    let engine = AudioEngine::new(&context, EngineDesc::new(settings)).context("creating engine")?;

    for renderer in engine.renderer_details()? {
        log::info!("Renderer: {}", renderer);
    }

    let _waves = WaveBank::new(&engine, &BlobBuilder::wave_bank().build())?;
    let bank = SoundBank::new(
        &engine,
        &BlobBuilder::sound_bank()
            .variable("Distance", 0.0)
            .cue("Helicopter", 6)
            .cue("Explosion", 2)
            .cue("Footstep", 1)
            .build(),
    )?;

    let helicopter = bank
        .get_cue("Helicopter")?
        .context("soundbank has no Helicopter cue")?;
    let listener = AudioListener::from_pose(&Pose::from_position(Vec3::new(0.0, 1.8, 0.0)));
    let mut emitter = AudioEmitter::default();

    for frame in 0..FRAMES {
        // Orbit the helicopter around the listener
        let angle = frame as f32 / FRAMES as f32 * std::f32::consts::TAU;
        let rotation = Quat::from_rotation_y(angle);
        emitter.set_pose(&Pose::new(rotation * Vec3::new(0.0, 10.0, -20.0), rotation));
        emitter.velocity = rotation * Vec3::new(5.0, 0.0, 0.0);

        helicopter.apply_3d(&listener, &emitter)?;
        helicopter.set_variable("Distance", emitter.position.distance(listener.position))?;
        if frame == 0 {
            helicopter.play()?;
            bank.play_cue("Explosion")?;
        }
        if frame == 2 {
            bank.play_cue_3d("Footstep", &listener, &emitter)?;
        }
        if frame == 4 {
            if let Some(effects) = engine.get_category("Effects")? {
                effects.set_volume(0.5)?;
            }
        }

        engine.update()?;
        log::info!(
            "Frame {}: helicopter {:?}, {} detached cues",
            frame,
            helicopter.status()?,
            engine.detached_cue_count()
        );
        report_events(&context);
    }

    helicopter.stop(AudioStopOptions::AsAuthored)?;
    engine.update()?;

    // The engine destroys the helicopter cue on its own once its soundbank goes away
    bank.dispose();
    log::info!("Helicopter disposed with its soundbank: {}", helicopter.is_disposed());

    engine.dispose();
    report_events(&context);
    log::info!("Live native cues left: {}", backend.live_cue_count());
    Ok(())
}

fn report_events(context: &AudioContext) {
    for event in context.poll_events() {
        match event {
            CueBridgeEvent::ObjectDisposed { handle, kind, cause } => {
                log::info!("Disposed {} {} ({:?})", kind, handle, cause);
            }
            CueBridgeEvent::ReleaseFailed { handle, kind, status } => {
                log::warn!("Release of {} {} failed: {}", kind, handle, status);
            }
        }
    }
}
