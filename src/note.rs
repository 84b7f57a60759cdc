// Equal-temperament pitch table. A4 = 440 Hz is the anchor; every letter
// keeps a fixed semitone offset from A so nothing gets recomputed at runtime.

const SEMITONE_OFFSETS: [(&str, i32); 12] = [
    ("C", -9),
    ("C#", -8),
    ("D", -7),
    ("D#", -6),
    ("E", -5),
    ("F", -4),
    ("F#", -3),
    ("G", -2),
    ("G#", -1),
    ("A", 0),
    ("A#", 1),
    ("B", 2),
];

/// Frequency in Hz for a note letter ("C".."B", sharps allowed) at an octave.
/// Unknown letters return `None`; callers treat that as "don't play anything".
pub fn frequency_of(letter: &str, octave: i32) -> Option<f32> {
    let semitone = SEMITONE_OFFSETS.iter().find(|(l, _)| *l == letter)?.1;
    Some(440.0 * 2.0_f32.powf((octave - 4) as f32 + semitone as f32 / 12.0))
}

/// Split a note name like "C#4" into its letter and octave.
pub fn parse_note_name(name: &str) -> Option<(&str, i32)> {
    let digit_at = name.find(|c: char| c.is_ascii_digit() || c == '-')?;
    if digit_at == 0 {
        return None;
    }
    let (letter, octave) = name.split_at(digit_at);
    Some((letter, octave.parse().ok()?))
}

/// Frequency for a full note name like "A4" or "C#5".
pub fn frequency_of_name(name: &str) -> Option<f32> {
    let (letter, octave) = parse_note_name(name)?;
    frequency_of(letter, octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert_eq!(frequency_of("A", 4), Some(440.0));
    }

    #[test]
    fn octave_doubles_frequency() {
        for (letter, _) in SEMITONE_OFFSETS {
            let low = frequency_of(letter, 3).unwrap();
            let high = frequency_of(letter, 4).unwrap();
            assert!((high / low - 2.0).abs() < 1e-4, "{letter}: {low} -> {high}");
        }
    }

    #[test]
    fn monotonic_in_octave() {
        for (letter, _) in SEMITONE_OFFSETS {
            let mut prev = 0.0;
            for octave in 0..8 {
                let f = frequency_of(letter, octave).unwrap();
                assert!(f > prev);
                prev = f;
            }
        }
    }

    #[test]
    fn unknown_letter_is_none() {
        assert_eq!(frequency_of("H", 4), None);
        assert_eq!(frequency_of("", 4), None);
        assert_eq!(frequency_of("c", 4), None);
    }

    #[test]
    fn middle_c() {
        let c4 = frequency_of("C", 4).unwrap();
        assert!((c4 - 261.63).abs() < 0.01);
    }

    #[test]
    fn parses_note_names() {
        assert_eq!(parse_note_name("C#4"), Some(("C#", 4)));
        assert_eq!(parse_note_name("B4"), Some(("B", 4)));
        assert_eq!(parse_note_name("4"), None);
        assert_eq!(parse_note_name("C#"), None);
        assert_eq!(frequency_of_name("A4"), Some(440.0));
    }
}
