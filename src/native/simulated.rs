//! Deterministic in-process stand-in for the native engine.
//!
//! The simulator tracks handles, states, variables and notifications the way
//! the native engine does, without producing any audio. Banks and settings use
//! a small line-based text format behind a four byte magic, see
//! [`BlobBuilder`].

use super::{
    AudioStopOptions, CategoryIndex, CueIndex, EmitterState, EngineParams, ListenerState,
    NativeAudioBackend, NativeHandle, NativeNotification, NativeRendererDetail, NativeResult,
    NativeStatus, NotificationCallback, NotificationKind, StateFlags, StreamingParams,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const SETTINGS_MAGIC: &[u8; 4] = b"XGSF";
const SOUND_BANK_MAGIC: &[u8; 4] = b"SDBK";
const WAVE_BANK_MAGIC: &[u8; 4] = b"WBND";

const SPEAKERS_ID: Uuid = Uuid::from_u128(0x3d1f_a6b2_52c4_4e0b_9a7e_0c51_d2f4_8a01);
const HEADPHONES_ID: Uuid = Uuid::from_u128(0x3d1f_a6b2_52c4_4e0b_9a7e_0c51_d2f4_8a02);

/// Operations that can be made to fail or stall once, see
/// [`SimulatedBackend::inject_failure`] and [`SimulatedBackend::inject_delay`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SimOp {
    CreateEngine,
    RegisterNotification,
    ShutdownEngine,
    DoWork,
    Apply3d,
    CreateSoundBank,
    DestroySoundBank,
    PrepareCue,
    PlayCueIndex,
    CreateWaveBank,
    DestroyWaveBank,
    PlayCue,
    DestroyCue,
}

/// Builds settings, soundbank and wavebank blobs understood by the simulator.
///
/// ```
/// use cuebridge::native::BlobBuilder;
///
/// let settings = BlobBuilder::settings()
///     .category("Music")
///     .variable("SpeedOfSound", 343.5)
///     .build();
/// let bank = BlobBuilder::sound_bank().cue("Explosion", 4).build();
/// assert!(settings.starts_with(b"XGSF"));
/// assert!(bank.starts_with(b"SDBK"));
/// ```
#[derive(Debug, Clone)]
pub struct BlobBuilder {
    magic: &'static [u8; 4],
    lines: Vec<String>,
}

impl BlobBuilder {
    pub fn settings() -> Self {
        Self {
            magic: SETTINGS_MAGIC,
            lines: Vec::new(),
        }
    }

    pub fn sound_bank() -> Self {
        Self {
            magic: SOUND_BANK_MAGIC,
            lines: Vec::new(),
        }
    }

    pub fn wave_bank() -> Self {
        Self {
            magic: WAVE_BANK_MAGIC,
            lines: Vec::new(),
        }
    }

    pub fn category(mut self, name: &str) -> Self {
        self.lines.push(format!("category {name}"));
        self
    }

    /// Adds a global variable (settings) or a per-cue instance variable (soundbank).
    pub fn variable(mut self, name: &str, default: f32) -> Self {
        self.lines.push(format!("variable {name} {default}"));
        self
    }

    /// Adds a cue that plays for `length_ticks` calls to `do_work`.
    pub fn cue(mut self, name: &str, length_ticks: u32) -> Self {
        self.lines.push(format!("cue {name} {length_ticks}"));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = self.magic.to_vec();
        data.push(b'\n');
        data.extend_from_slice(self.lines.join("\n").as_bytes());
        data
    }
}

#[derive(Debug, Clone)]
struct CueDef {
    name: String,
    length: u32,
}

#[derive(Debug, Default)]
struct ParsedBlob {
    categories: Vec<String>,
    variables: Vec<(String, f32)>,
    cues: Vec<CueDef>,
}

fn parse_blob(data: &[u8], magic: &[u8; 4]) -> NativeResult<ParsedBlob> {
    let body = data
        .strip_prefix(magic.as_slice())
        .ok_or(NativeStatus::INVALID_DATA)?;
    let text = std::str::from_utf8(body).map_err(|_| NativeStatus::INVALID_DATA)?;

    let mut parsed = ParsedBlob::default();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let name = parts.next().ok_or(NativeStatus::INVALID_DATA)?.to_string();
        match keyword {
            "category" => parsed.categories.push(name),
            "variable" => {
                let value = parts
                    .next()
                    .and_then(|value| value.parse::<f32>().ok())
                    .ok_or(NativeStatus::INVALID_DATA)?;
                parsed.variables.push((name, value));
            }
            "cue" => {
                let length = parts
                    .next()
                    .and_then(|length| length.parse::<u32>().ok())
                    .ok_or(NativeStatus::INVALID_DATA)?;
                parsed.cues.push(CueDef { name, length });
            }
            _ => return Err(NativeStatus::INVALID_DATA),
        }
    }
    Ok(parsed)
}

struct SimCategory {
    name: String,
    volume: f32,
    paused: bool,
}

struct SimEngine {
    callback: NotificationCallback,
    notify_cue_destroyed: bool,
    categories: Vec<SimCategory>,
    globals: Vec<(String, f32)>,
}

struct SimSoundBank {
    engine: NativeHandle,
    cues: Vec<CueDef>,
    variables: Vec<(String, f32)>,
}

struct SimWaveBank {
    engine: NativeHandle,
    prepared: bool,
}

struct SimCue {
    engine: NativeHandle,
    sound_bank: NativeHandle,
    state: StateFlags,
    remaining: u32,
    variables: Vec<(String, f32)>,
    owned_by_engine: bool,
    last_3d: Option<(ListenerState, EmitterState)>,
}

type Pending = Vec<(NotificationCallback, NativeNotification)>;

#[derive(Default)]
struct SimState {
    renderers: Vec<NativeRendererDetail>,
    engines: HashMap<NativeHandle, SimEngine>,
    sound_banks: HashMap<NativeHandle, SimSoundBank>,
    wave_banks: HashMap<NativeHandle, SimWaveBank>,
    cues: HashMap<NativeHandle, SimCue>,
    release_log: HashMap<NativeHandle, usize>,
    release_order: Vec<NativeHandle>,
    injected: HashMap<SimOp, NativeStatus>,
    delays: HashMap<SimOp, Duration>,
}

impl SimState {
    fn check(&mut self, op: SimOp) -> NativeResult<()> {
        match self.injected.remove(&op) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn engine(&self, engine: NativeHandle) -> NativeResult<&SimEngine> {
        self.engines.get(&engine).ok_or(NativeStatus::NOT_INITIALIZED)
    }

    fn engine_mut(&mut self, engine: NativeHandle) -> NativeResult<&mut SimEngine> {
        self.engines
            .get_mut(&engine)
            .ok_or(NativeStatus::NOT_INITIALIZED)
    }

    fn cue_mut(&mut self, cue: NativeHandle) -> NativeResult<&mut SimCue> {
        self.cues.get_mut(&cue).ok_or(NativeStatus::INVALID_USAGE)
    }

    fn category_mut(
        &mut self,
        engine: NativeHandle,
        category: CategoryIndex,
    ) -> NativeResult<&mut SimCategory> {
        self.engine_mut(engine)?
            .categories
            .get_mut(category.0 as usize)
            .ok_or(NativeStatus::INVALID_CATEGORY)
    }

    /// Removes a cue and queues its destroy notification.
    fn remove_cue(&mut self, cue: NativeHandle, pending: &mut Pending) -> bool {
        let Some(removed) = self.cues.remove(&cue) else {
            return false;
        };
        if let Some(engine) = self.engines.get(&removed.engine) {
            if engine.notify_cue_destroyed {
                pending.push((
                    engine.callback.clone(),
                    NativeNotification::CueDestroyed { cue },
                ));
            }
        }
        true
    }

    fn cues_where(&self, predicate: impl Fn(&SimCue) -> bool) -> Vec<NativeHandle> {
        self.cues
            .iter()
            .filter(|(_, cue)| predicate(cue))
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn prepare(&mut self, handle: NativeHandle, sound_bank: NativeHandle, index: CueIndex) -> NativeResult<()> {
        let bank = self
            .sound_banks
            .get(&sound_bank)
            .ok_or(NativeStatus::INVALID_USAGE)?;
        let definition = bank
            .cues
            .get(index.0 as usize)
            .ok_or(NativeStatus::INVALID_CUE_INDEX)?;
        let cue = SimCue {
            engine: bank.engine,
            sound_bank,
            state: StateFlags::PREPARED,
            remaining: definition.length,
            variables: bank.variables.clone(),
            owned_by_engine: false,
            last_3d: None,
        };
        self.cues.insert(handle, cue);
        Ok(())
    }
}

/// In-process engine used by tests and the demo.
pub struct SimulatedBackend {
    state: Mutex<SimState>,
    next_handle: AtomicU64,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// Creates a simulator with two renderers.
    pub fn new() -> Self {
        Self::with_renderers(vec![
            NativeRendererDetail {
                display_name: "Speakers (Simulated Audio Device)".to_string(),
                renderer_id: SPEAKERS_ID.braced().to_string(),
            },
            NativeRendererDetail {
                display_name: "Headphones (Simulated Audio Device)".to_string(),
                renderer_id: HEADPHONES_ID.braced().to_string(),
            },
        ])
    }

    /// Creates a simulator exposing the given renderers. With no renderers,
    /// engine construction fails with [`NativeStatus::NO_RENDERER`].
    pub fn with_renderers(renderers: Vec<NativeRendererDetail>) -> Self {
        Self {
            state: Mutex::new(SimState {
                renderers,
                ..Default::default()
            }),
            next_handle: AtomicU64::new(0x1000),
        }
    }

    /// Makes the next call of `op` fail with `status`.
    pub fn inject_failure(&self, op: SimOp, status: NativeStatus) {
        self.state().injected.insert(op, status);
    }

    /// Makes the next call of `op` stall for `delay`, outside the simulator
    /// lock. Creations stall after they take effect, everything else before.
    pub fn inject_delay(&self, op: SimOp, delay: Duration) {
        self.state().delays.insert(op, delay);
    }

    /// Handles in the order their release calls took effect.
    pub fn release_order(&self) -> Vec<NativeHandle> {
        self.state().release_order.clone()
    }

    /// Number of release calls (destroy or shutdown) made for `handle`,
    /// successful or not.
    pub fn release_count(&self, handle: NativeHandle) -> usize {
        self.state()
            .release_log
            .get(&handle)
            .copied()
            .unwrap_or_default()
    }

    /// Whether `handle` names a resource that is currently alive.
    pub fn contains(&self, handle: NativeHandle) -> bool {
        let state = self.state();
        state.engines.contains_key(&handle)
            || state.sound_banks.contains_key(&handle)
            || state.wave_banks.contains_key(&handle)
            || state.cues.contains_key(&handle)
    }

    pub fn live_cue_count(&self) -> usize {
        self.state().cues.len()
    }

    /// Listener and emitter state most recently applied to `cue`.
    pub fn last_apply_3d(&self, cue: NativeHandle) -> Option<(ListenerState, EmitterState)> {
        self.state().cues.get(&cue).and_then(|cue| cue.last_3d)
    }

    /// Volume and pause flag of a category.
    pub fn category_state(&self, engine: NativeHandle, name: &str) -> Option<(f32, bool)> {
        let state = self.state();
        let engine = state.engines.get(&engine)?;
        engine
            .categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| (category.volume, category.paused))
    }

    /// Destroys a cue the way the engine does on its own, for instance when a
    /// soundbank is unloaded underneath it. Fires the destroy notification.
    pub fn destroy_cue_externally(&self, cue: NativeHandle) -> bool {
        let mut pending = Pending::new();
        let removed = self.state().remove_cue(cue, &mut pending);
        Self::dispatch(pending);
        removed
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate(&self) -> NativeHandle {
        NativeHandle::from_raw(self.next_handle.fetch_add(0x10, Ordering::Relaxed))
    }

    fn log_release(state: &mut SimState, handle: NativeHandle) {
        *state.release_log.entry(handle).or_default() += 1;
        state.release_order.push(handle);
    }

    fn stall(&self, op: SimOp) {
        let delay = self.state().delays.remove(&op);
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
    }

    // Callbacks run after the simulator lock is released.
    fn dispatch(pending: Pending) {
        for (callback, notification) in pending {
            callback(&notification);
        }
    }
}

impl NativeAudioBackend for SimulatedBackend {
    fn create_engine(
        &self,
        params: &EngineParams<'_>,
        callback: NotificationCallback,
    ) -> NativeResult<NativeHandle> {
        let mut state = self.state();
        state.check(SimOp::CreateEngine)?;

        if state.renderers.is_empty() {
            return Err(NativeStatus::NO_RENDERER);
        }
        if let Some(renderer_id) = params.renderer_id {
            let braced = renderer_id.braced().to_string();
            if !state.renderers.iter().any(|r| r.renderer_id == braced) {
                return Err(NativeStatus::INVALID_ARG);
            }
        }

        let settings = if params.settings.is_empty() {
            ParsedBlob::default()
        } else {
            parse_blob(params.settings, SETTINGS_MAGIC)?
        };

        let handle = self.allocate();
        state.engines.insert(
            handle,
            SimEngine {
                callback,
                notify_cue_destroyed: false,
                categories: settings
                    .categories
                    .into_iter()
                    .map(|name| SimCategory {
                        name,
                        volume: 1.0,
                        paused: false,
                    })
                    .collect(),
                globals: settings.variables,
            },
        );
        Ok(handle)
    }

    fn register_notification(&self, engine: NativeHandle, kind: NotificationKind) -> NativeResult<()> {
        let mut state = self.state();
        state.check(SimOp::RegisterNotification)?;
        match kind {
            NotificationKind::CueDestroyed => state.engine_mut(engine)?.notify_cue_destroyed = true,
        }
        Ok(())
    }

    fn shutdown_engine(&self, engine: NativeHandle) -> NativeResult<()> {
        self.stall(SimOp::ShutdownEngine);
        let mut pending = Pending::new();
        {
            let mut state = self.state();
            Self::log_release(&mut state, engine);
            state.check(SimOp::ShutdownEngine)?;
            state.engine(engine)?;

            for cue in state.cues_where(|cue| cue.engine == engine) {
                state.remove_cue(cue, &mut pending);
            }
            state.sound_banks.retain(|_, bank| bank.engine != engine);
            state.wave_banks.retain(|_, bank| bank.engine != engine);
            state.engines.remove(&engine);
        }
        Self::dispatch(pending);
        Ok(())
    }

    fn do_work(&self, engine: NativeHandle) -> NativeResult<()> {
        let mut pending = Pending::new();
        {
            let mut state = self.state();
            state.check(SimOp::DoWork)?;
            state.engine(engine)?;

            for bank in state.wave_banks.values_mut() {
                if bank.engine == engine {
                    bank.prepared = true;
                }
            }

            for cue in state.cues.values_mut() {
                if cue.engine != engine || cue.state.contains(StateFlags::PAUSED) {
                    continue;
                }
                if cue.state.contains(StateFlags::STOPPING) {
                    cue.state = StateFlags::STOPPED;
                } else if cue.state.contains(StateFlags::PLAYING) {
                    cue.remaining = cue.remaining.saturating_sub(1);
                    if cue.remaining == 0 {
                        cue.state = StateFlags::STOPPED;
                    }
                }
            }

            let finished = state.cues_where(|cue| {
                cue.engine == engine && cue.owned_by_engine && cue.state.contains(StateFlags::STOPPED)
            });
            for cue in finished {
                state.remove_cue(cue, &mut pending);
            }
        }
        Self::dispatch(pending);
        Ok(())
    }

    fn renderer_count(&self, engine: NativeHandle) -> NativeResult<usize> {
        let state = self.state();
        state.engine(engine)?;
        Ok(state.renderers.len())
    }

    fn renderer_detail(&self, engine: NativeHandle, index: usize) -> NativeResult<NativeRendererDetail> {
        let state = self.state();
        state.engine(engine)?;
        state
            .renderers
            .get(index)
            .cloned()
            .ok_or(NativeStatus::INVALID_ARG)
    }

    fn get_global_variable(&self, engine: NativeHandle, name: &str) -> NativeResult<Option<f32>> {
        let state = self.state();
        let engine = state.engine(engine)?;
        Ok(engine
            .globals
            .iter()
            .find(|(variable, _)| variable == name)
            .map(|(_, value)| *value))
    }

    fn set_global_variable(&self, engine: NativeHandle, name: &str, value: f32) -> NativeResult<bool> {
        let mut state = self.state();
        let engine = state.engine_mut(engine)?;
        match engine.globals.iter_mut().find(|(variable, _)| variable == name) {
            Some((_, slot)) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn category(&self, engine: NativeHandle, name: &str) -> Option<CategoryIndex> {
        let state = self.state();
        let engine = state.engines.get(&engine)?;
        engine
            .categories
            .iter()
            .position(|category| category.name == name)
            .map(|index| CategoryIndex(index as u16))
    }

    fn pause_category(&self, engine: NativeHandle, category: CategoryIndex, pause: bool) -> NativeResult<()> {
        self.state().category_mut(engine, category)?.paused = pause;
        Ok(())
    }

    fn stop_category(
        &self,
        engine: NativeHandle,
        category: CategoryIndex,
        _options: AudioStopOptions,
    ) -> NativeResult<()> {
        self.state().category_mut(engine, category)?;
        Ok(())
    }

    fn set_category_volume(&self, engine: NativeHandle, category: CategoryIndex, volume: f32) -> NativeResult<()> {
        if volume < 0.0 {
            return Err(NativeStatus::INVALID_ARG);
        }
        self.state().category_mut(engine, category)?.volume = volume;
        Ok(())
    }

    fn apply_3d(
        &self,
        engine: NativeHandle,
        cue: NativeHandle,
        listener: &ListenerState,
        emitter: &EmitterState,
    ) -> NativeResult<()> {
        self.stall(SimOp::Apply3d);
        let mut state = self.state();
        state.check(SimOp::Apply3d)?;
        state.engine(engine)?;
        let cue = state.cue_mut(cue)?;
        if cue.engine != engine {
            return Err(NativeStatus::INVALID_USAGE);
        }
        cue.last_3d = Some((*listener, *emitter));
        Ok(())
    }

    fn create_sound_bank(&self, engine: NativeHandle, data: &[u8]) -> NativeResult<NativeHandle> {
        let handle = {
            let mut state = self.state();
            state.check(SimOp::CreateSoundBank)?;
            state.engine(engine)?;
            let parsed = parse_blob(data, SOUND_BANK_MAGIC)?;

            let handle = self.allocate();
            state.sound_banks.insert(
                handle,
                SimSoundBank {
                    engine,
                    cues: parsed.cues,
                    variables: parsed.variables,
                },
            );
            handle
        };
        self.stall(SimOp::CreateSoundBank);
        Ok(handle)
    }

    fn sound_bank_state(&self, sound_bank: NativeHandle) -> NativeResult<StateFlags> {
        let state = self.state();
        if !state.sound_banks.contains_key(&sound_bank) {
            return Err(NativeStatus::INVALID_USAGE);
        }
        let in_use = state.cues.values().any(|cue| cue.sound_bank == sound_bank);
        Ok(if in_use {
            StateFlags::IN_USE
        } else {
            StateFlags::empty()
        })
    }

    fn destroy_sound_bank(&self, sound_bank: NativeHandle) -> NativeResult<()> {
        self.stall(SimOp::DestroySoundBank);
        let mut pending = Pending::new();
        {
            let mut state = self.state();
            Self::log_release(&mut state, sound_bank);
            state.check(SimOp::DestroySoundBank)?;
            if state.sound_banks.remove(&sound_bank).is_none() {
                return Err(NativeStatus::INVALID_USAGE);
            }
            for cue in state.cues_where(|cue| cue.sound_bank == sound_bank) {
                state.remove_cue(cue, &mut pending);
            }
        }
        Self::dispatch(pending);
        Ok(())
    }

    fn cue_index(&self, sound_bank: NativeHandle, name: &str) -> Option<CueIndex> {
        let state = self.state();
        state
            .sound_banks
            .get(&sound_bank)?
            .cues
            .iter()
            .position(|cue| cue.name == name)
            .map(|index| CueIndex(index as u16))
    }

    fn prepare_cue(&self, sound_bank: NativeHandle, index: CueIndex) -> NativeResult<NativeHandle> {
        let handle = {
            let mut state = self.state();
            state.check(SimOp::PrepareCue)?;
            let handle = self.allocate();
            state.prepare(handle, sound_bank, index)?;
            handle
        };
        self.stall(SimOp::PrepareCue);
        Ok(handle)
    }

    fn play_cue_index(&self, sound_bank: NativeHandle, index: CueIndex) -> NativeResult<()> {
        let mut state = self.state();
        state.check(SimOp::PlayCueIndex)?;
        let handle = self.allocate();
        state.prepare(handle, sound_bank, index)?;
        let cue = state.cue_mut(handle)?;
        cue.state = StateFlags::PLAYING;
        cue.owned_by_engine = true;
        Ok(())
    }

    fn create_in_memory_wave_bank(&self, engine: NativeHandle, data: &[u8]) -> NativeResult<NativeHandle> {
        let handle = {
            let mut state = self.state();
            state.check(SimOp::CreateWaveBank)?;
            state.engine(engine)?;
            parse_blob(data, WAVE_BANK_MAGIC)?;

            let handle = self.allocate();
            state.wave_banks.insert(
                handle,
                SimWaveBank {
                    engine,
                    prepared: true,
                },
            );
            handle
        };
        self.stall(SimOp::CreateWaveBank);
        Ok(handle)
    }

    fn create_streaming_wave_bank(
        &self,
        engine: NativeHandle,
        params: &StreamingParams<'_>,
    ) -> NativeResult<NativeHandle> {
        let mut state = self.state();
        state.check(SimOp::CreateWaveBank)?;
        state.engine(engine)?;
        if params.packet_size == 0 {
            return Err(NativeStatus::INVALID_ARG);
        }

        let data = std::fs::read(params.path).map_err(|_| NativeStatus::READ_FILE)?;
        let body = data
            .get(params.offset as usize..)
            .ok_or(NativeStatus::INVALID_DATA)?;
        parse_blob(body, WAVE_BANK_MAGIC)?;

        let handle = self.allocate();
        state.wave_banks.insert(
            handle,
            SimWaveBank {
                engine,
                prepared: false,
            },
        );
        Ok(handle)
    }

    fn wave_bank_state(&self, wave_bank: NativeHandle) -> NativeResult<StateFlags> {
        let state = self.state();
        let bank = state
            .wave_banks
            .get(&wave_bank)
            .ok_or(NativeStatus::INVALID_USAGE)?;

        let mut flags = StateFlags::empty();
        if bank.prepared {
            flags |= StateFlags::PREPARED;
        }
        let playing = state
            .cues
            .values()
            .any(|cue| cue.engine == bank.engine && cue.state.contains(StateFlags::PLAYING));
        if bank.prepared && playing {
            flags |= StateFlags::IN_USE;
        }
        Ok(flags)
    }

    fn destroy_wave_bank(&self, wave_bank: NativeHandle) -> NativeResult<()> {
        self.stall(SimOp::DestroyWaveBank);
        let mut state = self.state();
        Self::log_release(&mut state, wave_bank);
        state.check(SimOp::DestroyWaveBank)?;
        state
            .wave_banks
            .remove(&wave_bank)
            .map(|_| ())
            .ok_or(NativeStatus::INVALID_USAGE)
    }

    fn cue_state(&self, cue: NativeHandle) -> NativeResult<StateFlags> {
        Ok(self.state().cue_mut(cue)?.state)
    }

    fn play_cue(&self, cue: NativeHandle) -> NativeResult<()> {
        let mut state = self.state();
        state.check(SimOp::PlayCue)?;
        let cue = state.cue_mut(cue)?;
        if !cue.state.contains(StateFlags::PREPARED) {
            return Err(NativeStatus::INVALID_USAGE);
        }
        cue.state = StateFlags::PLAYING;
        Ok(())
    }

    fn pause_cue(&self, cue: NativeHandle, pause: bool) -> NativeResult<()> {
        let mut state = self.state();
        let cue = state.cue_mut(cue)?;
        if !cue.state.contains(StateFlags::PLAYING) {
            return Ok(());
        }
        cue.state.set(StateFlags::PAUSED, pause);
        Ok(())
    }

    fn stop_cue(&self, cue: NativeHandle, options: AudioStopOptions) -> NativeResult<()> {
        let mut state = self.state();
        let cue = state.cue_mut(cue)?;
        let playing = cue.state.contains(StateFlags::PLAYING);
        cue.state = match options {
            AudioStopOptions::AsAuthored if playing => StateFlags::STOPPING,
            _ => StateFlags::STOPPED,
        };
        Ok(())
    }

    fn get_cue_variable(&self, cue: NativeHandle, name: &str) -> NativeResult<Option<f32>> {
        let mut state = self.state();
        let cue = state.cue_mut(cue)?;
        Ok(cue
            .variables
            .iter()
            .find(|(variable, _)| variable == name)
            .map(|(_, value)| *value))
    }

    fn set_cue_variable(&self, cue: NativeHandle, name: &str, value: f32) -> NativeResult<bool> {
        let mut state = self.state();
        let cue = state.cue_mut(cue)?;
        match cue.variables.iter_mut().find(|(variable, _)| variable == name) {
            Some((_, slot)) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn destroy_cue(&self, cue: NativeHandle) -> NativeResult<()> {
        self.stall(SimOp::DestroyCue);
        let mut pending = Pending::new();
        {
            let mut state = self.state();
            Self::log_release(&mut state, cue);
            state.check(SimOp::DestroyCue)?;
            if !state.remove_cue(cue, &mut pending) {
                return Err(NativeStatus::INVALID_USAGE);
            }
        }
        Self::dispatch(pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn engine_with_counter(backend: &SimulatedBackend) -> (NativeHandle, Arc<AtomicUsize>) {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let settings = BlobBuilder::settings().category("Music").build();
        let engine = backend
            .create_engine(
                &EngineParams {
                    settings: &settings,
                    lookahead: Duration::from_millis(250),
                    renderer_id: None,
                },
                Arc::new(move |_notification: &NativeNotification| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("engine");
        backend
            .register_notification(engine, NotificationKind::CueDestroyed)
            .expect("register");
        (engine, destroyed)
    }

    #[test]
    fn rejects_blobs_with_wrong_magic() {
        let backend = SimulatedBackend::new();
        let (engine, _) = engine_with_counter(&backend);
        let status = backend
            .create_sound_bank(engine, b"garbage")
            .expect_err("corrupted bank");
        assert_eq!(status, NativeStatus::INVALID_DATA);
    }

    #[test]
    fn fire_and_forget_cue_is_destroyed_after_it_finishes() {
        let backend = SimulatedBackend::new();
        let (engine, destroyed) = engine_with_counter(&backend);
        let bank = backend
            .create_sound_bank(engine, &BlobBuilder::sound_bank().cue("Blip", 2).build())
            .expect("bank");
        let index = backend.cue_index(bank, "Blip").expect("index");

        backend.play_cue_index(bank, index).expect("play");
        assert_eq!(backend.live_cue_count(), 1);

        backend.do_work(engine).expect("tick");
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        backend.do_work(engine).expect("tick");
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(backend.live_cue_count(), 0);
    }

    #[test]
    fn injected_failure_fires_once() {
        let backend = SimulatedBackend::new();
        backend.inject_failure(SimOp::CreateEngine, NativeStatus::OUT_OF_MEMORY);
        let params = EngineParams {
            settings: &[],
            lookahead: Duration::ZERO,
            renderer_id: None,
        };
        let callback: NotificationCallback = Arc::new(|_: &NativeNotification| {});
        assert_eq!(
            backend.create_engine(&params, callback.clone()),
            Err(NativeStatus::OUT_OF_MEMORY)
        );
        assert!(backend.create_engine(&params, callback).is_ok());
    }

    #[test]
    fn delayed_release_takes_effect_after_the_stall() {
        let backend = Arc::new(SimulatedBackend::new());
        let (engine, _) = engine_with_counter(&backend);
        let bank = backend
            .create_sound_bank(engine, &BlobBuilder::sound_bank().build())
            .expect("bank");
        backend.inject_delay(SimOp::DestroySoundBank, Duration::from_millis(100));

        let releaser = {
            let backend = backend.clone();
            thread::spawn(move || backend.destroy_sound_bank(bank))
        };
        thread::sleep(Duration::from_millis(20));
        backend.shutdown_engine(engine).expect("shutdown");

        assert_eq!(
            releaser.join().expect("thread"),
            Err(NativeStatus::INVALID_USAGE)
        );
        assert_eq!(backend.release_order(), vec![engine, bank]);
    }

    #[test]
    fn no_renderers_means_no_hardware() {
        let backend = SimulatedBackend::with_renderers(Vec::new());
        let params = EngineParams {
            settings: &[],
            lookahead: Duration::ZERO,
            renderer_id: None,
        };
        let result = backend.create_engine(&params, Arc::new(|_: &NativeNotification| {}));
        assert_eq!(result, Err(NativeStatus::NO_RENDERER));
    }
}
