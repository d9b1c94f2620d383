use crate::config::SessionConfig;
use crate::ipc::{tempo_from_value, Command, Event};
use crate::status::{PlaybackStatus, StatusReporter};
use crate::transport::{Transport, TransportError};
use crate::voice_pool::{SoundingNote, VoicePool};
use encore_domain_timeline::{
    gm_program_for, instrument_hint, normalize, sanitize_bpm, NoteEvent, TimeContext, DEFAULT_BPM,
};
use encore_ports::instrument::{LoadError, SampleLoaderPort};
use encore_ports::notes::{FetchError, NoteSourcePort};
use encore_ports::types::{PieceId, Seconds};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("could not fetch notes: {0}")]
    Fetch(#[from] FetchError),
    #[error("could not load instrument: {0}")]
    Load(#[from] LoadError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading(PieceId),
    Playing(PieceId),
    /// Held only while a session is being torn down.
    Stopping,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayOutcome {
    Started { events: usize },
    /// The piece was already loading or playing, so the call stopped it.
    Toggled,
    EmptyTimeline,
    /// A newer request or a stop superseded this one while it was suspended.
    Stale,
    Failed(SessionError),
}

struct ActiveSession {
    piece_id: PieceId,
    acoustic_end: Seconds,
}

struct SessionInner {
    state: SessionState,
    generation: u64,
    tempo_bpm: f64,
    transport: Transport<NoteEvent>,
    session: Option<ActiveSession>,
}

/// Drives one piece at a time from note request to teardown.
///
/// Every transition takes the session lock once and the lock is never held
/// across an await, so transitions are atomic with respect to each other. Work
/// that suspends (fetching notes, loading samples) carries the generation it
/// started under and is dropped if the generation has moved on when it resumes.
pub struct PlaybackController {
    notes: Arc<dyn NoteSourcePort>,
    voice: VoicePool,
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    status: StatusReporter,
}

impl PlaybackController {
    pub fn new(
        notes: Arc<dyn NoteSourcePort>,
        loader: Arc<dyn SampleLoaderPort>,
        config: SessionConfig,
    ) -> Self {
        let transport = Transport::new(DEFAULT_BPM, config.tempo_ramp_seconds);
        Self {
            notes,
            voice: VoicePool::new(loader),
            config,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                generation: 0,
                tempo_bpm: DEFAULT_BPM,
                transport,
                session: None,
            }),
            status: StatusReporter::new(DEFAULT_BPM),
        }
    }

    pub async fn handle_command(&self, cmd: Command) -> Result<(), SessionError> {
        match cmd {
            Command::Play { piece_id } => {
                if let PlayOutcome::Failed(error) = self.play(piece_id).await {
                    return Err(error);
                }
            }
            Command::Stop => self.stop(),
            Command::SetTempo { bpm } => {
                self.set_tempo(tempo_from_value(&bpm));
            }
        }
        Ok(())
    }

    pub async fn play(&self, piece_id: PieceId) -> PlayOutcome {
        let generation = {
            let mut inner = self.inner.lock();
            let same_piece = match &inner.state {
                SessionState::Loading(current) | SessionState::Playing(current) => {
                    Some(*current == piece_id)
                }
                SessionState::Idle | SessionState::Stopping => None,
            };
            match same_piece {
                Some(true) => {
                    tracing::info!(piece_id = %piece_id, "play toggled to stop");
                    self.stop_locked(&mut inner);
                    return PlayOutcome::Toggled;
                }
                Some(false) => {
                    self.stop_locked(&mut inner);
                }
                None => {}
            }
            inner.generation += 1;
            inner.state = SessionState::Loading(piece_id.clone());
            self.status.loading(&piece_id);
            inner.generation
        };
        tracing::info!(piece_id = %piece_id, generation, "loading piece");

        let raw = match self.notes.fetch_notes(&piece_id).await {
            Ok(raw) => raw,
            Err(error) => return self.fail_if_current(&piece_id, generation, error.into()),
        };

        let resolved_bpm = {
            let inner = self.inner.lock();
            if inner.generation != generation {
                tracing::debug!(piece_id = %piece_id, generation, "stale note payload discarded");
                return PlayOutcome::Stale;
            }
            inner.tempo_bpm
        };

        let outcome = normalize(&raw, &TimeContext::new(resolved_bpm, self.config.beats_per_bar));
        let hint = instrument_hint(&raw);
        tracing::debug!(
            piece_id = %piece_id,
            kept = outcome.kept,
            dropped = outcome.dropped,
            instrument = %hint,
            "notes normalized"
        );

        if outcome.timeline.is_empty() {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return PlayOutcome::Stale;
            }
            tracing::warn!(piece_id = %piece_id, "piece has no playable notes");
            inner.state = SessionState::Idle;
            self.status.idle(None);
            return PlayOutcome::EmptyTimeline;
        }

        if let Err(error) = self.voice.ensure_loaded().await {
            return self.fail_if_current(&piece_id, generation, error.into());
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(piece_id = %piece_id, generation, "session superseded during sample load");
            return PlayOutcome::Stale;
        }

        self.voice.select_program(gm_program_for(&hint));

        // Symbolic times are laid out at the tempo in force when playback starts.
        let tempo = inner.tempo_bpm;
        let timeline = if tempo == resolved_bpm {
            outcome.timeline
        } else {
            tracing::debug!(
                piece_id = %piece_id,
                from = resolved_bpm,
                to = tempo,
                "tempo moved during load; notes re-resolved"
            );
            normalize(&raw, &TimeContext::new(tempo, self.config.beats_per_bar)).timeline
        };
        let events = timeline.len();
        let acoustic_end =
            timeline.acoustic_end(self.config.note_stretch, self.config.release_tail_seconds);

        inner.transport.reset();
        inner.transport.set_tempo(tempo);
        for event in timeline.into_events() {
            inner.transport.schedule(event.time, event);
        }
        if let Err(error) = inner.transport.start() {
            drop(inner);
            return self.fail_if_current(&piece_id, generation, error.into());
        }

        inner.state = SessionState::Playing(piece_id.clone());
        inner.session = Some(ActiveSession {
            piece_id: piece_id.clone(),
            acoustic_end,
        });
        self.status.playing(&piece_id, &hint, events);
        tracing::info!(piece_id = %piece_id, generation, events, acoustic_end, "playback started");
        PlayOutcome::Started { events }
    }

    /// Tear down whatever is loading or playing. Does nothing when idle.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        self.stop_locked(&mut inner);
    }

    /// Returns the tempo actually applied.
    pub fn set_tempo(&self, bpm: f64) -> f64 {
        let bpm = sanitize_bpm(bpm);
        let mut inner = self.inner.lock();
        inner.tempo_bpm = bpm;
        inner.transport.set_tempo(bpm);
        self.status.tempo(bpm);
        tracing::info!(bpm, "tempo set");
        bpm
    }

    /// Advance playback by `elapsed` seconds of wall time: start every note
    /// that came due and release every note whose stretched duration ran out.
    pub fn tick(&self, elapsed: Seconds) {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, SessionState::Playing(_)) {
            return;
        }

        for due in inner.transport.advance(elapsed) {
            let event = due.payload;
            self.voice.advance(due.time);
            self.voice.trigger_notes(
                &event.notes,
                event.duration * self.config.note_stretch,
                due.time,
                event.velocity,
            );
        }

        let now = inner.transport.position_seconds();
        self.voice.advance(now);

        let finished = inner
            .session
            .as_ref()
            .is_some_and(|session| now >= session.acoustic_end);
        self.status.position(now, finished);
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    pub fn tempo(&self) -> f64 {
        self.inner.lock().tempo_bpm
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn transport_position(&self) -> Seconds {
        self.inner.lock().transport.position_seconds()
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().transport.pending()
    }

    pub fn sounding(&self) -> Vec<SoundingNote> {
        self.voice.sounding()
    }

    pub fn instrument_loaded(&self) -> bool {
        self.voice.is_loaded()
    }

    pub fn program(&self) -> u8 {
        self.voice.program()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub fn drain_events(&self) -> Vec<Event> {
        self.status.drain_events()
    }

    fn stop_locked(&self, inner: &mut SessionInner) -> bool {
        let piece_id = match std::mem::replace(&mut inner.state, SessionState::Stopping) {
            SessionState::Loading(piece_id) | SessionState::Playing(piece_id) => piece_id,
            other => {
                inner.state = other;
                return false;
            }
        };

        inner.generation += 1;
        inner.transport.reset();
        self.voice.release_all();
        if let Some(session) = inner.session.take() {
            tracing::debug!(piece_id = %session.piece_id, "session discarded");
        }
        inner.state = SessionState::Idle;
        self.status.idle(Some(&piece_id));
        tracing::info!(piece_id = %piece_id, generation = inner.generation, "playback stopped");
        true
    }

    fn fail_if_current(&self, piece_id: &PieceId, generation: u64, error: SessionError) -> PlayOutcome {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(piece_id = %piece_id, generation, %error, "stale failure discarded");
            return PlayOutcome::Stale;
        }

        tracing::error!(piece_id = %piece_id, generation, %error, "playback failed");
        inner.transport.reset();
        inner.session = None;
        inner.state = SessionState::Idle;
        self.status.failed(piece_id, error.to_string());
        PlayOutcome::Failed(error)
    }
}
