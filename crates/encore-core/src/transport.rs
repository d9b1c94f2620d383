use encore_domain_timeline::{sanitize_bpm, DEFAULT_BPM};
use encore_ports::types::Seconds;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ticks per quarter note of the musical position.
pub const TRANSPORT_PPQ: f64 = 192.0;

pub const DEFAULT_RAMP_SECONDS: Seconds = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Idle,
    Running,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("transport is already running; reset it first")]
    AlreadyRunning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleId(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Due<E> {
    pub id: ScheduleId,
    /// Transport time the entry came due, interpolated inside the advanced span.
    pub time: Seconds,
    pub payload: E,
}

#[derive(Clone, Debug)]
struct Scheduled<E> {
    id: u64,
    tick: f64,
    payload: E,
}

#[derive(Clone, Copy, Debug)]
struct TempoRamp {
    from_bpm: f64,
    to_bpm: f64,
    elapsed: Seconds,
    length: Seconds,
}

impl TempoRamp {
    fn bpm_at(&self, t: Seconds) -> f64 {
        let progress = (t / self.length).clamp(0.0, 1.0);
        self.from_bpm + (self.to_bpm - self.from_bpm) * progress
    }
}

/// Playback clock.
///
/// Position is tracked both in transport seconds and in ticks. Entries are
/// scheduled in seconds but stored in ticks at the tempo in force when they are
/// scheduled, so a later tempo change moves everything still pending.
#[derive(Clone, Debug)]
pub struct Transport<E> {
    state: TransportState,
    bpm: f64,
    target_bpm: f64,
    ramp: Option<TempoRamp>,
    ramp_seconds: Seconds,
    position_ticks: f64,
    position_seconds: Seconds,
    pending: VecDeque<Scheduled<E>>,
    next_id: u64,
}

impl<E> Transport<E> {
    pub fn new(bpm: f64, ramp_seconds: Seconds) -> Self {
        let bpm = sanitize_bpm(bpm);
        Self {
            state: TransportState::Idle,
            bpm,
            target_bpm: bpm,
            ramp: None,
            ramp_seconds: ramp_seconds.max(0.0),
            position_ticks: 0.0,
            position_seconds: 0.0,
            pending: VecDeque::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    /// Tempo the transport is at or ramping towards.
    pub fn bpm(&self) -> f64 {
        self.target_bpm
    }

    /// Instantaneous tempo, which lags `bpm()` while a ramp is in progress.
    pub fn current_bpm(&self) -> f64 {
        self.bpm
    }

    pub fn position_seconds(&self) -> Seconds {
        self.position_seconds
    }

    pub fn position_ticks(&self) -> f64 {
        self.position_ticks
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Stop, drop every pending entry and rewind to zero. Safe to call at any time.
    pub fn reset(&mut self) {
        self.state = TransportState::Idle;
        self.pending.clear();
        self.position_ticks = 0.0;
        self.position_seconds = 0.0;
        if let Some(ramp) = self.ramp.take() {
            self.bpm = ramp.to_bpm;
        }
        self.target_bpm = self.bpm;
    }

    /// Returns the tempo actually applied (invalid input becomes 120).
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        let bpm = sanitize_bpm(bpm);
        self.target_bpm = bpm;

        if self.state == TransportState::Running && self.ramp_seconds > 0.0 {
            self.ramp = Some(TempoRamp {
                from_bpm: self.bpm,
                to_bpm: bpm,
                elapsed: 0.0,
                length: self.ramp_seconds,
            });
        } else {
            self.ramp = None;
            self.bpm = bpm;
        }
        bpm
    }

    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Running {
            return Err(TransportError::AlreadyRunning);
        }
        self.state = TransportState::Running;
        self.position_ticks = 0.0;
        self.position_seconds = 0.0;
        Ok(())
    }

    /// Schedule `payload` at `at` seconds from the transport origin.
    pub fn schedule(&mut self, at: Seconds, payload: E) -> ScheduleId {
        let tick = self.seconds_to_ticks(at.max(0.0));
        let id = self.next_id;
        self.next_id += 1;

        let index = self.pending.partition_point(|entry| entry.tick <= tick);
        self.pending.insert(index, Scheduled { id, tick, payload });
        ScheduleId(id)
    }

    pub fn cancel(&mut self, id: ScheduleId) -> Option<E> {
        let index = self.pending.iter().position(|entry| entry.id == id.0)?;
        self.pending.remove(index).map(|entry| entry.payload)
    }

    /// Move the clock forward by `elapsed` seconds and hand back every entry
    /// reached, in schedule order. An idle transport does not move.
    pub fn advance(&mut self, elapsed: Seconds) -> Vec<Due<E>> {
        if self.state != TransportState::Running {
            return Vec::new();
        }
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };

        let start_ticks = self.position_ticks;
        let start_seconds = self.position_seconds;
        let delta_ticks = self.integrate_ticks(elapsed);
        self.position_ticks += delta_ticks;
        self.position_seconds += elapsed;

        let mut due = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.tick > self.position_ticks {
                break;
            }
            let Some(entry) = self.pending.pop_front() else {
                break;
            };
            let time = if delta_ticks > 0.0 {
                let fraction = ((entry.tick - start_ticks) / delta_ticks).clamp(0.0, 1.0);
                start_seconds + fraction * elapsed
            } else {
                self.position_seconds
            };
            due.push(Due {
                id: ScheduleId(entry.id),
                time,
                payload: entry.payload,
            });
        }
        due
    }

    fn seconds_to_ticks(&self, seconds: Seconds) -> f64 {
        seconds * self.target_bpm / 60.0 * TRANSPORT_PPQ
    }

    fn integrate_ticks(&mut self, elapsed: Seconds) -> f64 {
        let mut remaining = elapsed;
        let mut beats = 0.0;

        if let Some(mut ramp) = self.ramp.take() {
            let span = (ramp.length - ramp.elapsed).min(remaining).max(0.0);
            let bpm_start = ramp.bpm_at(ramp.elapsed);
            let bpm_end = ramp.bpm_at(ramp.elapsed + span);
            // Linear ramp: the average tempo over the span is exact.
            beats += (bpm_start + bpm_end) / 2.0 * span / 60.0;
            ramp.elapsed += span;
            remaining -= span;
            self.bpm = bpm_end;

            if ramp.elapsed + f64::EPSILON < ramp.length {
                self.ramp = Some(ramp);
            } else {
                self.bpm = ramp.to_bpm;
            }
        }

        beats += self.bpm * remaining / 60.0;
        beats * TRANSPORT_PPQ
    }
}

impl<E> Default for Transport<E> {
    fn default() -> Self {
        Self::new(DEFAULT_BPM, DEFAULT_RAMP_SECONDS)
    }
}
