use encore_ports::types::Pitch;
use serde_json::Value;

/// Parse a scientific pitch name (`C4`, `F#3`, `Bb2`, `E♭5`, `Cx4`) or a bare
/// MIDI key number.
pub fn parse_pitch(text: &str) -> Option<Pitch> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(key) = text.parse::<i32>() {
        return Pitch::new(key);
    }

    let mut chars = text.chars().peekable();
    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut alter = 0i32;
    while let Some(&c) = chars.peek() {
        let step = match c {
            '#' | '♯' => 1,
            'b' | '♭' => -1,
            'x' | '𝄪' => 2,
            '𝄫' => -2,
            _ => break,
        };
        alter += step;
        chars.next();
    }

    let octave: String = chars.collect();
    let octave = octave.trim().parse::<i32>().ok()?;

    let key = octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(base + alter)?;
    Pitch::new(key)
}

/// Collect every pitch a raw `note`/`notes` value names.
///
/// Accepts a single name, a MIDI number, a comma/space separated list, or an
/// array mixing those. Unparseable members are skipped.
pub fn pitches_from_value(value: &Value) -> Vec<Pitch> {
    let mut out = Vec::new();
    collect_pitches(value, &mut out);
    out
}

fn collect_pitches(value: &Value, out: &mut Vec<Pitch>) {
    match value {
        Value::String(text) => {
            for part in text.split(|c: char| c == ',' || c.is_whitespace()) {
                if let Some(pitch) = parse_pitch(part) {
                    out.push(pitch);
                }
            }
        }
        Value::Number(number) => {
            if let Some(pitch) = number
                .as_i64()
                .and_then(|key| i32::try_from(key).ok())
                .and_then(Pitch::new)
            {
                out.push(pitch);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_pitches(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(text: &str) -> Option<u8> {
        parse_pitch(text).map(|p| p.key())
    }

    #[test]
    fn parses_naturals_and_accidentals() {
        assert_eq!(key("C4"), Some(60));
        assert_eq!(key("A4"), Some(69));
        assert_eq!(key("F#3"), Some(54));
        assert_eq!(key("Bb2"), Some(46));
        assert_eq!(key("bb2"), Some(46));
        assert_eq!(key("E♭5"), Some(75));
        assert_eq!(key("Cx4"), Some(62));
        assert_eq!(key("B#3"), Some(60));
        assert_eq!(key("Cb4"), Some(59));
        assert_eq!(key("C-1"), Some(0));
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert_eq!(key(""), None);
        assert_eq!(key("H4"), None);
        assert_eq!(key("C"), None);
        assert_eq!(key("G9#"), None);
        assert_eq!(key("A9"), None);
        assert_eq!(key("128"), None);
    }

    #[test]
    fn bare_numbers_are_midi_keys() {
        assert_eq!(key("60"), Some(60));
        let pitches = pitches_from_value(&json!(72));
        assert_eq!(pitches.len(), 1);
        assert_eq!(pitches[0].key(), 72);
        assert!(pitches_from_value(&json!(60.5)).is_empty());
    }

    #[test]
    fn collects_lists_and_skips_invalid_members() {
        let pitches = pitches_from_value(&json!(["C4", "nope", ["E4", 67]]));
        let keys: Vec<u8> = pitches.iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec![60, 64, 67]);

        let pitches = pitches_from_value(&json!("C4, E4 G4"));
        let keys: Vec<u8> = pitches.iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec![60, 64, 67]);
    }
}
