use crate::status::PlaybackStatus;
use encore_domain_timeline::DEFAULT_BPM;
use encore_ports::types::PieceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    Play { piece_id: PieceId },
    Stop,
    /// `bpm` is taken as sent; anything that is not a positive number means 120.
    SetTempo { bpm: Value },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    StatusUpdated { status: PlaybackStatus },
    PlaybackStarted {
        piece_id: PieceId,
        instrument: String,
        events: usize,
    },
    PlaybackStopped { piece_id: PieceId },
    PlaybackFailed { piece_id: PieceId, message: String },
}

pub fn tempo_from_value(value: &Value) -> f64 {
    let bpm = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match bpm {
        Some(bpm) if bpm.is_finite() && bpm > 0.0 => bpm,
        _ => DEFAULT_BPM,
    }
}
