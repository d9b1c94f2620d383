pub const GM_ACOUSTIC_GRAND_PIANO: u8 = 0;

// Checked in order; the first keyword found in the hint wins, so more specific
// names must come before the names they contain ("contrabass" before "bass").
const PROGRAM_KEYWORDS: &[(&str, u8)] = &[
    ("harpsichord", 6),
    ("organ", 19),
    ("guitar", 24),
    ("lute", 24),
    ("violin", 40),
    ("viola", 41),
    ("cello", 42),
    ("violoncello", 42),
    ("contrabass", 43),
    ("double bass", 43),
    ("harp", 46),
    ("trumpet", 56),
    ("trombone", 57),
    ("horn", 60),
    ("saxophone", 65),
    ("oboe", 68),
    ("bassoon", 70),
    ("clarinet", 71),
    ("flute", 73),
    ("recorder", 74),
    // Voice ranges also name wind instruments ("soprano saxophone").
    ("choir", 52),
    ("voice", 52),
    ("soprano", 52),
    ("piano", GM_ACOUSTIC_GRAND_PIANO),
];

/// General MIDI program for a piece's instrument hint (lowercase free text such
/// as `"piano"` or `"violin, piano"`). Unknown hints fall back to piano.
pub fn gm_program_for(hint: &str) -> u8 {
    let hint = hint.to_lowercase();
    let first = hint
        .split(|c: char| c == ',' || c == '/' || c == '&' || c == ';')
        .map(str::trim)
        .find(|part| !part.is_empty())
        .unwrap_or("");

    PROGRAM_KEYWORDS
        .iter()
        .find(|(keyword, _)| first.contains(keyword))
        .map(|(_, program)| *program)
        .unwrap_or(GM_ACOUSTIC_GRAND_PIANO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_instruments() {
        assert_eq!(gm_program_for("piano"), 0);
        assert_eq!(gm_program_for("Violin"), 40);
        assert_eq!(gm_program_for("harpsichord"), 6);
        assert_eq!(gm_program_for("contrabass"), 43);
        assert_eq!(gm_program_for("guitar / voice"), 24);
    }

    #[test]
    fn wind_instruments_win_over_voice_ranges() {
        assert_eq!(gm_program_for("soprano saxophone"), 65);
        assert_eq!(gm_program_for("soprano"), 52);
        assert_eq!(gm_program_for("voice, piano"), 52);
    }

    #[test]
    fn first_listed_instrument_wins() {
        assert_eq!(gm_program_for("flute, piano"), 73);
        assert_eq!(gm_program_for("piano, flute"), 0);
    }

    #[test]
    fn unknown_falls_back_to_piano() {
        assert_eq!(gm_program_for("unknown"), 0);
        assert_eq!(gm_program_for(""), 0);
        assert_eq!(gm_program_for("theremin"), 0);
    }
}
