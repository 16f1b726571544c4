use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::GRID_ROWS;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Octave of the lowest grid row.
const BASE_OCTAVE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScaleType {
    #[default]
    Pentatonic,
    Major,
    Minor,
    Dorian,
    Blues,
    Chromatic,

    // Modes
    Phrygian,
    Lydian,
    Mixolydian,

    HarmonicMinor,
    MinorPentatonic,
}

impl ScaleType {
    pub fn get_intervals(&self) -> &'static [u8] {
        match self {
            ScaleType::Pentatonic => &[0, 2, 4, 7, 9],
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10],
            ScaleType::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],

            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],

            ScaleType::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleType::MinorPentatonic => &[0, 3, 5, 7, 10],
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            ScaleType::Pentatonic => "pentatonic",
            ScaleType::Major => "major",
            ScaleType::Minor => "minor",
            ScaleType::Dorian => "dorian",
            ScaleType::Blues => "blues",
            ScaleType::Chromatic => "chromatic",
            ScaleType::Phrygian => "phrygian",
            ScaleType::Lydian => "lydian",
            ScaleType::Mixolydian => "mixolydian",
            ScaleType::HarmonicMinor => "harmonic-minor",
            ScaleType::MinorPentatonic => "minor-pentatonic",
        }
    }

    pub fn iter() -> impl Iterator<Item = ScaleType> {
        [
            ScaleType::Pentatonic,
            ScaleType::Major,
            ScaleType::Minor,
            ScaleType::Dorian,
            ScaleType::Blues,
            ScaleType::Chromatic,
            ScaleType::Phrygian,
            ScaleType::Lydian,
            ScaleType::Mixolydian,
            ScaleType::HarmonicMinor,
            ScaleType::MinorPentatonic,
        ]
        .into_iter()
    }
}

impl FromStr for ScaleType {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScaleType::iter()
            .find(|scale| scale.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| SequencerError::UnknownScale(s.to_string()))
    }
}

/// Root pitch class of the selected key, C = 0 .. B = 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Key(u8);

impl Key {
    pub const C: Key = Key(0);

    pub fn new(pitch_class: u8) -> Result<Self, SequencerError> {
        if pitch_class < 12 {
            Ok(Self(pitch_class))
        } else {
            Err(SequencerError::UnknownKey(pitch_class.to_string()))
        }
    }

    pub fn pitch_class(&self) -> u8 {
        self.0
    }

}

impl FromStr for Key {
    type Err = SequencerError;

    /// Accepts note names (`"F#"`) and the short ids used by key pickers (`"fs"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('S', "#");
        NOTE_NAMES
            .iter()
            .position(|name| *name == normalized)
            .map(|pc| Key(pc as u8))
            .ok_or_else(|| SequencerError::UnknownKey(s.to_string()))
    }
}

/// A concrete pitch: pitch class plus octave, displayed as e.g. `C#4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteName {
    pub pitch_class: u8,
    pub octave: i32,
}

impl NoteName {
    pub fn midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class as i32
    }

    pub fn frequency(&self) -> f32 {
        440.0 * 2.0_f32.powf((self.midi() - 69) as f32 / 12.0)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_NAMES[self.pitch_class as usize % 12], self.octave)
    }
}

/// Maps a grid row to a pitch in the given scale and key.
///
/// Row 0 is the top of the grid and the highest note. Rows walk up the
/// scale degrees from the bottom row, wrapping into the next octave once
/// the scale is exhausted.
pub fn note_for_row(row: usize, scale: ScaleType, key: Key) -> NoteName {
    let intervals = scale.get_intervals();
    let degree = (GRID_ROWS - 1).saturating_sub(row);
    let repetition = degree / intervals.len();
    let interval = intervals[degree % intervals.len()] as usize;

    let semitones = repetition * 12 + interval + key.pitch_class() as usize;
    NoteName {
        pitch_class: (semitones % 12) as u8,
        octave: (semitones / 12) as i32 + BASE_OCTAVE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_row_is_root_in_base_octave() {
        let note = note_for_row(15, ScaleType::Pentatonic, Key::C);
        assert_eq!(note.to_string(), "C2");
    }

    #[test]
    fn top_row_wraps_through_octaves() {
        // 15 degrees up a 5-note scale is three full octaves
        let note = note_for_row(0, ScaleType::Pentatonic, Key::C);
        assert_eq!(note.to_string(), "C5");
        let note = note_for_row(0, ScaleType::Major, Key::C);
        // degree 15 = 2 octaves + degree 1 (D)
        assert_eq!(note.to_string(), "D4");
    }

    #[test]
    fn key_transposes_and_carries_octave() {
        let note = note_for_row(11, ScaleType::Pentatonic, "A".parse().unwrap());
        // degree 4 of pentatonic = 9 semitones, + A (9) = 18 -> F#3
        assert_eq!(note.to_string(), "F#3");
    }

    #[test]
    fn rows_ascend_from_bottom_to_top() {
        for scale in ScaleType::iter() {
            let midis: Vec<i32> = (0..GRID_ROWS)
                .rev()
                .map(|row| note_for_row(row, scale, Key::C).midi())
                .collect();
            assert!(midis.windows(2).all(|w| w[0] < w[1]), "{scale:?} not ascending");
        }
    }

    #[test]
    fn mapping_is_deterministic() {
        let key: Key = "ds".parse().unwrap();
        assert_eq!(key.pitch_class(), 3);
        assert_eq!(
            note_for_row(4, ScaleType::Blues, key),
            note_for_row(4, ScaleType::Blues, key)
        );
    }

    #[test]
    fn parses_scale_and_key_ids() {
        assert_eq!("minor".parse::<ScaleType>(), Ok(ScaleType::Minor));
        assert!("lydian-dominant".parse::<ScaleType>().is_err());
        assert_eq!("C#".parse::<Key>().map(|k| k.pitch_class()), Ok(1));
        assert!("H".parse::<Key>().is_err());
        assert!(Key::new(12).is_err());
    }

    #[test]
    fn a4_is_concert_pitch() {
        let a4 = NoteName { pitch_class: 9, octave: 4 };
        assert_eq!(a4.midi(), 69);
        assert!((a4.frequency() - 440.0).abs() < 1e-3);
    }
}
