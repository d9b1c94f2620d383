use crate::model::{NoteEvent, Timeline, ValidationError, DEFAULT_DURATION_SECONDS};
use crate::notation::{resolve_time, TimeContext};
use crate::pitch::pitches_from_value;
use encore_ports::types::{Seconds, Velocity};
use serde_json::{Map, Value};
use std::borrow::Cow;

// Payloads nest at most as "string holding an object holding a string".
const MAX_UNWRAP_DEPTH: usize = 4;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizeOutcome {
    pub timeline: Timeline,
    pub kept: usize,
    pub dropped: usize,
}

/// Turn a raw note-extraction payload into a [`Timeline`].
///
/// Never fails: anything that is not a note sequence, and every entry that
/// cannot be turned into a valid [`NoteEvent`], is logged and skipped.
pub fn normalize(raw: &Value, ctx: &TimeContext) -> NormalizeOutcome {
    let Some(entries) = unwrap_notes(raw, 0) else {
        tracing::warn!(
            error = %ValidationError::NotASequence,
            kind = value_kind(raw),
            "note payload ignored"
        );
        return NormalizeOutcome::default();
    };

    let entries = match entries.as_ref() {
        Value::Array(items) => items.as_slice(),
        _ => &[],
    };

    let mut events = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;
    for (index, entry) in entries.iter().enumerate() {
        match normalize_entry(entry, ctx) {
            Ok(event) => events.push(event),
            Err(error) => {
                dropped += 1;
                tracing::debug!(index, %error, "note entry dropped");
            }
        }
    }

    if events.is_empty() && dropped > 0 {
        tracing::warn!(dropped, "no valid entries in note payload");
    }

    let kept = events.len();
    NormalizeOutcome {
        timeline: Timeline::from_events(events),
        kept,
        dropped,
    }
}

/// The `instruments` field of a wrapped payload, lowercased, or `"unknown"`.
pub fn instrument_hint(raw: &Value) -> String {
    let object = match raw {
        Value::Object(map) => Some(Cow::Borrowed(map)),
        Value::String(text) => match parse_embedded_json(text) {
            Some(Value::Object(map)) => Some(Cow::Owned(map)),
            _ => None,
        },
        _ => None,
    };

    object
        .as_deref()
        .and_then(|map| map.get("instruments"))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_lowercase())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn unwrap_notes(raw: &Value, depth: usize) -> Option<Cow<'_, Value>> {
    if depth > MAX_UNWRAP_DEPTH {
        return None;
    }
    match raw {
        Value::Array(_) => Some(Cow::Borrowed(raw)),
        Value::Object(map) => unwrap_notes(map.get("notes")?, depth + 1),
        Value::String(text) => {
            let parsed = parse_embedded_json(text)?;
            unwrap_notes(&parsed, depth + 1).map(|value| Cow::Owned(value.into_owned()))
        }
        _ => None,
    }
}

fn parse_embedded_json(text: &str) -> Option<Value> {
    serde_json::from_str(strip_markdown_fence(text)).ok()
}

/// Drop a surrounding ```` ```json ```` fence if one is present.
pub fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    let body = body.trim_start();
    body.strip_prefix("json").unwrap_or(body).trim()
}

fn normalize_entry(entry: &Value, ctx: &TimeContext) -> Result<NoteEvent, ValidationError> {
    match entry {
        Value::Object(fields) => event_from_fields(None, fields, ctx),
        // Part-style `[time, value]` pairs.
        Value::Array(pair) if pair.len() == 2 => match &pair[1] {
            Value::Object(fields) => event_from_fields(Some(&pair[0]), fields, ctx),
            pitch_value => {
                let mut fields = Map::new();
                fields.insert("note".to_string(), pitch_value.clone());
                event_from_fields(Some(&pair[0]), &fields, ctx)
            }
        },
        _ => Err(ValidationError::MalformedEntry),
    }
}

fn event_from_fields(
    time_override: Option<&Value>,
    fields: &Map<String, Value>,
    ctx: &TimeContext,
) -> Result<NoteEvent, ValidationError> {
    let time = match time_override.or_else(|| fields.get("time")) {
        None | Some(Value::Null) => 0.0,
        Some(value) => resolve_time(value, ctx)?,
    };

    let pitch_value = fields
        .get("notes")
        .filter(|value| !value.is_null())
        .or_else(|| fields.get("note"))
        .ok_or(ValidationError::NoPitch)?;
    let notes = pitches_from_value(pitch_value);

    let duration = resolve_duration(fields.get("duration"), ctx);
    let velocity = resolve_velocity(fields.get("velocity"));

    NoteEvent::new(time, notes, duration, velocity)
}

fn resolve_duration(value: Option<&Value>, ctx: &TimeContext) -> Seconds {
    value
        .and_then(|value| resolve_time(value, ctx).ok())
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .unwrap_or(DEFAULT_DURATION_SECONDS)
}

fn resolve_velocity(value: Option<&Value>) -> Velocity {
    let raw = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() && v > 1.0 && v <= 127.0 => Velocity::new((v / 127.0) as f32),
        Some(v) if v.is_finite() => Velocity::new(v as f32),
        _ => Velocity::DEFAULT,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
