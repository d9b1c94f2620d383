use encore_ports::types::{Pitch, Seconds, Velocity};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION_SECONDS: Seconds = 1.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("payload is not a note sequence")]
    NotASequence,
    #[error("entry is not an object or [time, value] pair")]
    MalformedEntry,
    #[error("unrecognized time value: {0}")]
    Time(String),
    #[error("negative time: {0}")]
    NegativeTime(f64),
    #[error("non-positive duration: {0}")]
    Duration(f64),
    #[error("no playable pitch in entry")]
    NoPitch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub time: Seconds,
    pub notes: Vec<Pitch>,
    pub duration: Seconds,
    pub velocity: Velocity,
}

impl NoteEvent {
    pub fn new(
        time: Seconds,
        notes: Vec<Pitch>,
        duration: Seconds,
        velocity: Velocity,
    ) -> Result<Self, ValidationError> {
        if !time.is_finite() {
            return Err(ValidationError::Time(time.to_string()));
        }
        if time < 0.0 {
            return Err(ValidationError::NegativeTime(time));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ValidationError::Duration(duration));
        }

        let mut unique: Vec<Pitch> = Vec::with_capacity(notes.len());
        for pitch in notes {
            if !unique.contains(&pitch) {
                unique.push(pitch);
            }
        }
        if unique.is_empty() {
            return Err(ValidationError::NoPitch);
        }

        Ok(Self {
            time,
            notes: unique,
            duration,
            velocity,
        })
    }

    /// Release time once the duration is stretched by `stretch`.
    pub fn sounding_end(&self, stretch: f64) -> Seconds {
        self.time + self.duration * stretch
    }
}

/// Note events sorted by onset. Sorting is stable, so events sharing an onset
/// keep the order they were supplied in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    events: Vec<NoteEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(mut events: Vec<NoteEvent>) -> Self {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { events }
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<NoteEvent> {
        self.events
    }

    /// Transport time after which nothing is audible any more: the latest
    /// stretched release, with `tail` added after the final event.
    pub fn acoustic_end(&self, stretch: f64, tail: Seconds) -> Seconds {
        let Some(last) = self.events.last() else {
            return 0.0;
        };
        let latest_release = self
            .events
            .iter()
            .map(|event| event.sounding_end(stretch))
            .fold(0.0, f64::max);
        latest_release.max(last.sounding_end(stretch) + tail)
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a NoteEvent;
    type IntoIter = std::slice::Iter<'a, NoteEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
