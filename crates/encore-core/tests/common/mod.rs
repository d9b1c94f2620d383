#![allow(dead_code)]

use async_trait::async_trait;
use encore_core::{PlaybackController, SessionConfig};
use encore_ports::instrument::{InstrumentPort, LoadError, SampleLoaderPort};
use encore_ports::notes::{FetchError, NoteSourcePort};
use encore_ports::types::{PieceId, Pitch, Velocity};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Note source answering from a script. A gated piece does not answer until
/// its gate is released.
#[derive(Default)]
pub struct ScriptedNotes {
    responses: Mutex<HashMap<PieceId, Result<Value, FetchError>>>,
    gates: Mutex<HashMap<PieceId, oneshot::Receiver<()>>>,
    calls: AtomicUsize,
}

impl ScriptedNotes {
    pub fn respond(&self, piece: &str, response: Result<Value, FetchError>) {
        self.responses.lock().insert(PieceId::from(piece), response);
    }

    pub fn gate(&self, piece: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(PieceId::from(piece), rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteSourcePort for ScriptedNotes {
    async fn fetch_notes(&self, piece_id: &PieceId) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().remove(piece_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.responses
            .lock()
            .get(piece_id)
            .cloned()
            .unwrap_or_else(|| Ok(json!([])))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Program(u8),
    On(u8, f32),
    Off(u8),
    AllOff,
}

#[derive(Default)]
pub struct RecordingInstrument {
    calls: Mutex<Vec<Call>>,
}

impl RecordingInstrument {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn keys_on(&self) -> Vec<u8> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::On(key, _) => Some(*key),
                _ => None,
            })
            .collect()
    }
}

impl InstrumentPort for RecordingInstrument {
    fn set_program(&self, gm_program: u8) {
        self.calls.lock().push(Call::Program(gm_program));
    }

    fn note_on(&self, pitch: Pitch, velocity: Velocity) {
        self.calls.lock().push(Call::On(pitch.key(), velocity.get()));
    }

    fn note_off(&self, pitch: Pitch) {
        self.calls.lock().push(Call::Off(pitch.key()));
    }

    fn all_notes_off(&self) {
        self.calls.lock().push(Call::AllOff);
    }
}

/// Loader handing out one shared [`RecordingInstrument`], counting loads.
#[derive(Default)]
pub struct FakeLoader {
    pub instrument: Arc<RecordingInstrument>,
    loads: AtomicUsize,
    failures_left: AtomicUsize,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeLoader {
    pub fn failing(times: usize) -> Self {
        let loader = Self::default();
        loader.failures_left.store(times, Ordering::SeqCst);
        loader
    }

    pub fn gate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock() = Some(rx);
        tx
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SampleLoaderPort for FakeLoader {
    async fn load(&self) -> Result<Arc<dyn InstrumentPort>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        tokio::task::yield_now().await;

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LoadError::Unreachable("sample host offline".to_string()));
        }
        Ok(self.instrument.clone())
    }
}

pub struct Harness {
    pub notes: Arc<ScriptedNotes>,
    pub loader: Arc<FakeLoader>,
    pub controller: Arc<PlaybackController>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeLoader::default(), SessionConfig::default())
    }

    pub fn with(loader: FakeLoader, config: SessionConfig) -> Self {
        let notes = Arc::new(ScriptedNotes::default());
        let loader = Arc::new(loader);
        let controller = Arc::new(PlaybackController::new(
            notes.clone(),
            loader.clone(),
            config,
        ));
        Self {
            notes,
            loader,
            controller,
        }
    }

    pub fn instrument(&self) -> &RecordingInstrument {
        &self.loader.instrument
    }
}

pub fn reference_piece() -> Value {
    json!([
        {"time": 0, "notes": ["C4"], "duration": 1, "velocity": 0.8},
        {"time": 1, "notes": ["E4"], "duration": 1}
    ])
}

pub fn pitch(key: i32) -> Pitch {
    Pitch::new(key).expect("valid midi key")
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
