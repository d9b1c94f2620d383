use crate::model::ValidationError;
use encore_ports::types::Seconds;
use serde_json::Value;

/// Ticks per quarter note for `"<n>i"` tick notation.
pub const PPQ: u32 = 192;

pub const DEFAULT_BPM: f64 = 120.0;

/// Tempo and meter used to turn musical notation into seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeContext {
    pub bpm: f64,
    pub beats_per_bar: u32,
}

impl TimeContext {
    pub fn new(bpm: f64, beats_per_bar: u32) -> Self {
        Self {
            bpm: sanitize_bpm(bpm),
            beats_per_bar: beats_per_bar.max(1),
        }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    fn beats_to_seconds(&self, beats: f64) -> Seconds {
        beats * self.seconds_per_beat()
    }
}

impl Default for TimeContext {
    fn default() -> Self {
        Self::new(DEFAULT_BPM, 4)
    }
}

/// Finite and strictly positive, otherwise 120.
pub fn sanitize_bpm(bpm: f64) -> f64 {
    if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        DEFAULT_BPM
    }
}

/// Resolve a JSON time value to seconds.
///
/// Numbers are seconds. Strings may be numeric seconds, transport time
/// (`"bars:beats:sixteenths"`), note values (`"4n"`, `"8n."`, `"8t"`),
/// measures (`"2m"`), ticks (`"96i"`), or a `+` separated sum of those.
pub fn resolve_time(value: &Value, ctx: &TimeContext) -> Result<Seconds, ValidationError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::Time(number.to_string())),
        Value::String(text) => parse_time_str(text, ctx),
        other => Err(ValidationError::Time(other.to_string())),
    }
}

pub fn parse_time_str(text: &str, ctx: &TimeContext) -> Result<Seconds, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Time(text.to_string()));
    }
    if !text.contains('+') {
        return parse_term(text, ctx)
            .filter(|seconds| seconds.is_finite())
            .ok_or_else(|| ValidationError::Time(text.to_string()));
    }

    let mut sum = 0.0;
    let mut any = false;
    for part in text.split('+') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        sum += parse_term(part, ctx).ok_or_else(|| ValidationError::Time(text.to_string()))?;
        any = true;
    }
    if any && sum.is_finite() {
        Ok(sum)
    } else {
        Err(ValidationError::Time(text.to_string()))
    }
}

fn parse_term(term: &str, ctx: &TimeContext) -> Option<Seconds> {
    if let Ok(seconds) = term.parse::<f64>() {
        return seconds.is_finite().then_some(seconds);
    }
    if term.contains(':') {
        return parse_transport_time(term, ctx);
    }

    let (body, dotted) = match term.strip_suffix('.') {
        Some(body) => (body, true),
        None => (term, false),
    };
    let unit = body.chars().last()?;
    let count = body[..body.len() - unit.len_utf8()].trim();

    let beats = match unit.to_ascii_lowercase() {
        'n' => 4.0 / parse_subdivision(count)?,
        't' => 4.0 / parse_subdivision(count)? * 2.0 / 3.0,
        'm' => count.parse::<f64>().ok()? * ctx.beats_per_bar as f64,
        'i' => count.parse::<f64>().ok()? / PPQ as f64,
        _ => return None,
    };
    let beats = if dotted { beats * 1.5 } else { beats };
    beats.is_finite().then(|| ctx.beats_to_seconds(beats))
}

fn parse_subdivision(count: &str) -> Option<f64> {
    let value = count.parse::<u32>().ok()?;
    (value > 0).then_some(value as f64)
}

fn parse_transport_time(term: &str, ctx: &TimeContext) -> Option<Seconds> {
    let parts: Vec<&str> = term.split(':').map(str::trim).collect();
    if parts.len() > 3 {
        return None;
    }

    let mut values = [0.0f64; 3];
    for (slot, part) in values.iter_mut().zip(parts.iter()) {
        if part.is_empty() {
            continue;
        }
        *slot = part.parse::<f64>().ok().filter(|v| v.is_finite())?;
    }

    let [bars, beats, sixteenths] = values;
    let total_beats = bars * ctx.beats_per_bar as f64 + beats + sixteenths / 4.0;
    Some(ctx.beats_to_seconds(total_beats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_bpm_falls_back_to_default() {
        assert_eq!(sanitize_bpm(90.0), 90.0);
        assert_eq!(sanitize_bpm(0.0), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(-10.0), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(f64::NAN), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(f64::INFINITY), DEFAULT_BPM);
    }

    #[test]
    fn subdivision_must_be_positive_integer() {
        assert_eq!(parse_subdivision("8"), Some(8.0));
        assert_eq!(parse_subdivision("0"), None);
        assert_eq!(parse_subdivision(""), None);
        assert_eq!(parse_subdivision("1.5"), None);
    }
}
