use crate::ipc::Event;
use encore_domain_timeline::DEFAULT_BPM;
use encore_ports::types::{PieceId, Seconds};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::watch;

/// Undrained events beyond this are discarded oldest first.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

pub const LOADING_MESSAGE: &str = "Please wait while the notes are detected... starting soon";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Loading,
    Playing,
}

/// What the presentation layer shows about playback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub phase: Phase,
    pub loading_piece_id: Option<PieceId>,
    pub playing_piece_id: Option<PieceId>,
    pub tempo: f64,
    pub status_message: Option<String>,
    pub instrument: Option<String>,
    pub position_seconds: Seconds,
    pub finished: bool,
}

impl PlaybackStatus {
    fn idle(tempo: f64) -> Self {
        Self {
            phase: Phase::Idle,
            loading_piece_id: None,
            playing_piece_id: None,
            tempo,
            status_message: None,
            instrument: None,
            position_seconds: 0.0,
            finished: false,
        }
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self::idle(DEFAULT_BPM)
    }
}

/// Publishes [`PlaybackStatus`] snapshots on a watch channel and queues the
/// matching protocol [`Event`]s until they are drained. The queue holds at
/// most [`EVENT_QUEUE_CAPACITY`] events, so a reporter nobody drains stays
/// bounded.
pub struct StatusReporter {
    tx: watch::Sender<PlaybackStatus>,
    events: Mutex<VecDeque<Event>>,
}

impl StatusReporter {
    pub fn new(tempo: f64) -> Self {
        let (tx, _rx) = watch::channel(PlaybackStatus::idle(tempo));
        Self {
            tx,
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackStatus {
        self.tx.borrow().clone()
    }

    pub fn drain_events(&self) -> Vec<Event> {
        self.events.lock().drain(..).collect()
    }

    pub fn loading(&self, piece_id: &PieceId) {
        self.update(|status| {
            let tempo = status.tempo;
            *status = PlaybackStatus {
                phase: Phase::Loading,
                loading_piece_id: Some(piece_id.clone()),
                status_message: Some(LOADING_MESSAGE.to_string()),
                ..PlaybackStatus::idle(tempo)
            };
        });
    }

    pub fn playing(&self, piece_id: &PieceId, instrument: &str, events: usize) {
        self.update(|status| {
            let tempo = status.tempo;
            *status = PlaybackStatus {
                phase: Phase::Playing,
                playing_piece_id: Some(piece_id.clone()),
                instrument: Some(instrument.to_string()),
                ..PlaybackStatus::idle(tempo)
            };
        });
        self.push(Event::PlaybackStarted {
            piece_id: piece_id.clone(),
            instrument: instrument.to_string(),
            events,
        });
    }

    /// Back to idle. `stopped` names the piece whose session was torn down, if any.
    pub fn idle(&self, stopped: Option<&PieceId>) {
        self.update(|status| *status = PlaybackStatus::idle(status.tempo));
        if let Some(piece_id) = stopped {
            self.push(Event::PlaybackStopped {
                piece_id: piece_id.clone(),
            });
        }
    }

    /// User-visible failure of a play attempt. Leaves the status idle.
    pub fn failed(&self, piece_id: &PieceId, message: String) {
        self.update(|status| *status = PlaybackStatus::idle(status.tempo));
        self.push(Event::PlaybackFailed {
            piece_id: piece_id.clone(),
            message,
        });
    }

    pub fn tempo(&self, bpm: f64) {
        self.update(|status| status.tempo = bpm);
    }

    /// Position updates arrive on every clock tick, so they only refresh the
    /// snapshot. Reaching the end of the piece is announced once.
    pub fn position(&self, position_seconds: Seconds, finished: bool) {
        let mut newly_finished = false;
        self.tx.send_if_modified(|status| {
            if status.phase != Phase::Playing {
                return false;
            }
            newly_finished = finished && !status.finished;
            status.position_seconds = position_seconds;
            status.finished = finished;
            true
        });
        if newly_finished {
            self.push_status();
        }
    }

    fn update(&self, apply: impl FnOnce(&mut PlaybackStatus)) {
        let changed = self.tx.send_if_modified(|status| {
            let before = status.clone();
            apply(status);
            *status != before
        });
        if changed {
            self.push_status();
        }
    }

    fn push_status(&self) {
        let status = self.snapshot();
        self.push(Event::StatusUpdated { status });
    }

    fn push(&self, event: Event) {
        let mut events = self.events.lock();
        if events.len() >= EVENT_QUEUE_CAPACITY {
            events.pop_front();
            tracing::debug!("event queue full; oldest event dropped");
        }
        events.push_back(event);
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}
