use encore_ports::types::Seconds;
use serde::{Deserialize, Serialize};

fn default_note_stretch() -> f64 {
    2.0
}

fn default_release_tail_seconds() -> Seconds {
    5.0
}

fn default_tempo_ramp_seconds() -> Seconds {
    0.1
}

fn default_beats_per_bar() -> u32 {
    4
}

/// Numeric policy of a playback session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Every authored duration is multiplied by this before it is voiced.
    #[serde(default = "default_note_stretch")]
    pub note_stretch: f64,
    /// Extra time after the last note before the piece counts as finished.
    #[serde(default = "default_release_tail_seconds")]
    pub release_tail_seconds: Seconds,
    #[serde(default = "default_tempo_ramp_seconds")]
    pub tempo_ramp_seconds: Seconds,
    #[serde(default = "default_beats_per_bar")]
    pub beats_per_bar: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            note_stretch: default_note_stretch(),
            release_tail_seconds: default_release_tail_seconds(),
            tempo_ramp_seconds: default_tempo_ramp_seconds(),
            beats_per_bar: default_beats_per_bar(),
        }
    }
}
