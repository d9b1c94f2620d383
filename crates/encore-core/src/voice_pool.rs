use encore_domain_timeline::GM_ACOUSTIC_GRAND_PIANO;
use encore_ports::instrument::{InstrumentPort, LoadError, SampleLoaderPort};
use encore_ports::types::{Pitch, Seconds, Velocity};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

type LoadResult = Result<Arc<dyn InstrumentPort>, LoadError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

enum LoadState {
    Unloaded,
    Loading { attempt: u64, load: SharedLoad },
    Loaded(Arc<dyn InstrumentPort>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoundingNote {
    pub pitch: Pitch,
    pub release_at: Seconds,
}

/// Owner of the sampled instrument and of every note it is currently sounding.
pub struct VoicePool {
    loader: Arc<dyn SampleLoaderPort>,
    state: Mutex<LoadState>,
    attempts: Mutex<u64>,
    program: AtomicU8,
    sounding: Mutex<Vec<SoundingNote>>,
}

impl VoicePool {
    pub fn new(loader: Arc<dyn SampleLoaderPort>) -> Self {
        Self {
            loader,
            state: Mutex::new(LoadState::Unloaded),
            attempts: Mutex::new(0),
            program: AtomicU8::new(GM_ACOUSTIC_GRAND_PIANO),
            sounding: Mutex::new(Vec::new()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.lock(), LoadState::Loaded(_))
    }

    /// Acquire the instrument's samples once. Callers arriving while a load is
    /// in flight await that same load. A failed load is forgotten, so the next
    /// call starts over.
    pub async fn ensure_loaded(&self) -> Result<(), LoadError> {
        let (attempt, load) = {
            let mut state = self.state.lock();
            match &*state {
                LoadState::Loaded(_) => return Ok(()),
                LoadState::Loading { attempt, load } => (*attempt, load.clone()),
                LoadState::Unloaded => {
                    let attempt = {
                        let mut attempts = self.attempts.lock();
                        *attempts += 1;
                        *attempts
                    };
                    let loader = self.loader.clone();
                    let load = async move { loader.load().await }.boxed().shared();
                    tracing::info!(attempt, "loading sampled instrument");
                    *state = LoadState::Loading {
                        attempt,
                        load: load.clone(),
                    };
                    (attempt, load)
                }
            }
        };

        let result = load.await;

        let mut state = self.state.lock();
        let still_ours =
            matches!(&*state, LoadState::Loading { attempt: current, .. } if *current == attempt);
        match result {
            Ok(instrument) => {
                if still_ours {
                    instrument.set_program(self.program.load(Ordering::Relaxed));
                    *state = LoadState::Loaded(instrument);
                    tracing::info!(attempt, "sampled instrument ready");
                }
                Ok(())
            }
            Err(error) => {
                if still_ours {
                    *state = LoadState::Unloaded;
                    tracing::error!(attempt, %error, "sampled instrument failed to load");
                }
                Err(error)
            }
        }
    }

    /// Remember the General MIDI program and apply it if the instrument is up.
    pub fn select_program(&self, gm_program: u8) {
        let previous = self.program.swap(gm_program, Ordering::Relaxed);
        if previous == gm_program {
            return;
        }
        if let Some(instrument) = self.instrument() {
            instrument.set_program(gm_program);
        }
        tracing::debug!(gm_program, "instrument program selected");
    }

    pub fn program(&self) -> u8 {
        self.program.load(Ordering::Relaxed)
    }

    /// Start every pitch together at transport time `time`; each is released
    /// once the transport passes `time + duration`.
    pub fn trigger_notes(&self, pitches: &[Pitch], duration: Seconds, time: Seconds, velocity: Velocity) {
        let Some(instrument) = self.instrument() else {
            tracing::warn!(notes = pitches.len(), "trigger before instrument loaded; dropped");
            return;
        };

        let mut sounding = self.sounding.lock();
        for &pitch in pitches {
            // A still-sounding key is released first so its pending release
            // cannot cut the new note short.
            if let Some(index) = sounding.iter().position(|note| note.pitch == pitch) {
                instrument.note_off(pitch);
                sounding.remove(index);
            }
            instrument.note_on(pitch, velocity);
            sounding.push(SoundingNote {
                pitch,
                release_at: time + duration,
            });
        }
    }

    /// Release every note whose time is up at transport time `now`.
    pub fn advance(&self, now: Seconds) {
        let mut sounding = self.sounding.lock();
        if sounding.is_empty() {
            return;
        }
        let instrument = self.instrument();
        sounding.retain(|note| {
            if note.release_at > now {
                return true;
            }
            if let Some(instrument) = instrument.as_ref() {
                instrument.note_off(note.pitch);
            }
            false
        });
    }

    /// Silence everything immediately.
    pub fn release_all(&self) {
        let mut sounding = self.sounding.lock();
        if let Some(instrument) = self.instrument() {
            instrument.all_notes_off();
        }
        if !sounding.is_empty() {
            tracing::debug!(released = sounding.len(), "released all sounding notes");
        }
        sounding.clear();
    }

    pub fn sounding(&self) -> Vec<SoundingNote> {
        self.sounding.lock().clone()
    }

    fn instrument(&self) -> Option<Arc<dyn InstrumentPort>> {
        match &*self.state.lock() {
            LoadState::Loaded(instrument) => Some(instrument.clone()),
            _ => None,
        }
    }
}
