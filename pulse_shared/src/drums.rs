use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::track::TrackId;

pub const NUM_DRUM_LANES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DrumLane {
    Kick,
    Snare,
    Hihat,
    Openhat,
}

impl DrumLane {
    pub const ALL: [DrumLane; NUM_DRUM_LANES] =
        [DrumLane::Kick, DrumLane::Snare, DrumLane::Hihat, DrumLane::Openhat];

    pub fn index(&self) -> usize {
        match self {
            DrumLane::Kick => 0,
            DrumLane::Snare => 1,
            DrumLane::Hihat => 2,
            DrumLane::Openhat => 3,
        }
    }

    pub fn track(&self) -> TrackId {
        match self {
            DrumLane::Kick => TrackId::Kick,
            DrumLane::Snare => TrackId::Snare,
            DrumLane::Hihat => TrackId::Hihat,
            DrumLane::Openhat => TrackId::Openhat,
        }
    }
}

/// Drum kit styles. Each kit voices all four lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrumKit {
    #[default]
    Tr808,
    Tr909,
    Acoustic,
    Electronic,
}

impl DrumKit {
    pub fn id(&self) -> &'static str {
        match self {
            DrumKit::Tr808 => "808",
            DrumKit::Tr909 => "909",
            DrumKit::Acoustic => "acoustic",
            DrumKit::Electronic => "electronic",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DrumKit::Tr808 => "TR-808",
            DrumKit::Tr909 => "TR-909",
            DrumKit::Acoustic => "Acoustic",
            DrumKit::Electronic => "Electronic",
        }
    }

    pub fn iter() -> impl Iterator<Item = DrumKit> {
        [DrumKit::Tr808, DrumKit::Tr909, DrumKit::Acoustic, DrumKit::Electronic].into_iter()
    }
}

impl FromStr for DrumKit {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DrumKit::iter()
            .find(|kit| kit.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| SequencerError::UnknownKit(s.to_string()))
    }
}

/// A looping hit matrix for the four drum lanes.
///
/// `length` may differ from the 16-step melody loop; lanes are read at
/// `step % length`. Deserialized patterns go through the same checks as
/// [`DrumPattern::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDrumPattern")]
pub struct DrumPattern {
    pub id: String,
    pub name: String,
    pub genre: String,
    pub kit: DrumKit,
    length: usize,
    lanes: [Vec<bool>; NUM_DRUM_LANES],
}

#[derive(Deserialize)]
struct RawDrumPattern {
    id: String,
    name: String,
    genre: String,
    kit: DrumKit,
    #[serde(default)]
    length: Option<usize>,
    lanes: [Vec<bool>; NUM_DRUM_LANES],
}

impl TryFrom<RawDrumPattern> for DrumPattern {
    type Error = SequencerError;

    fn try_from(raw: RawDrumPattern) -> Result<Self, Self::Error> {
        let pattern = DrumPattern::new(&raw.id, &raw.name, &raw.genre, raw.kit, raw.lanes)?;
        match raw.length {
            Some(length) if length != pattern.length => Err(SequencerError::InvalidPattern {
                id: raw.id,
                reason: format!("length {length} does not match {}-step lanes", pattern.length),
            }),
            _ => Ok(pattern),
        }
    }
}

impl DrumPattern {
    pub fn new(
        id: &str,
        name: &str,
        genre: &str,
        kit: DrumKit,
        lanes: [Vec<bool>; NUM_DRUM_LANES],
    ) -> Result<Self, SequencerError> {
        let length = lanes[0].len();
        let invalid = |reason: &str| SequencerError::InvalidPattern {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        if length == 0 {
            return Err(invalid("pattern has no steps"));
        }
        if lanes.iter().any(|lane| lane.len() != length) {
            return Err(invalid("lanes have different lengths"));
        }
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            genre: genre.to_string(),
            kit,
            length,
            lanes,
        })
    }

    /// Builds a pattern from `0`/`1` rows, the notation drum tables are written in.
    pub fn from_rows(
        id: &str,
        name: &str,
        genre: &str,
        kit: DrumKit,
        rows: [&[u8]; NUM_DRUM_LANES],
    ) -> Result<Self, SequencerError> {
        let lanes = rows.map(|row| row.iter().map(|&hit| hit != 0).collect());
        Self::new(id, name, genre, kit, lanes)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn hit(&self, lane: DrumLane, step: usize) -> bool {
        self.lanes[lane.index()][step % self.length]
    }

    /// Lanes that fire on `step`.
    pub fn hits(&self, step: usize) -> impl Iterator<Item = DrumLane> + '_ {
        DrumLane::ALL.into_iter().filter(move |lane| self.hit(*lane, step))
    }
}

/// Lookup table of drum patterns keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrumPatternTable {
    patterns: BTreeMap<String, DrumPattern>,
}

impl DrumPatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The patterns that ship with the sequencer.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        let builtins = [
            DrumPattern::from_rows(
                "boom-bap",
                "BOOM BAP",
                "Hip Hop",
                DrumKit::Tr808,
                [
                    &[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0],
                    &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0],
                    &[1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0],
                    &[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1],
                ],
            ),
            DrumPattern::from_rows(
                "trap",
                "TRAP",
                "Hip Hop",
                DrumKit::Electronic,
                [
                    &[1, 0, 0, 1, 0, 0, 1, 0, 1, 0, 0, 1, 0, 0, 0, 0],
                    &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0],
                    &[1, 1, 0, 1, 1, 0, 1, 1, 1, 1, 0, 1, 1, 0, 1, 1],
                    &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
                ],
            ),
            DrumPattern::from_rows(
                "four-bar-house",
                "HOUSE 2 BAR",
                "House",
                DrumKit::Tr909,
                [
                    &[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 1, 0],
                    &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 1],
                    &[0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0],
                    &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
                ],
            ),
        ];
        for pattern in builtins.into_iter().flatten() {
            table.insert(pattern);
        }
        table
    }

    pub fn insert(&mut self, pattern: DrumPattern) -> Option<DrumPattern> {
        self.patterns.insert(pattern.id.clone(), pattern)
    }

    pub fn get(&self, id: &str) -> Option<&DrumPattern> {
        self.patterns.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.patterns.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_boom_bap() {
        let table = DrumPatternTable::builtin();
        assert_eq!(table.len(), 3);
        let boom_bap = table.get("boom-bap").unwrap();
        assert_eq!(boom_bap.length(), 16);
        let on_zero: Vec<DrumLane> = boom_bap.hits(0).collect();
        assert_eq!(on_zero, vec![DrumLane::Kick, DrumLane::Hihat]);
        let on_four: Vec<DrumLane> = boom_bap.hits(4).collect();
        assert_eq!(on_four, vec![DrumLane::Kick, DrumLane::Snare, DrumLane::Hihat]);
    }

    #[test]
    fn long_pattern_is_indexed_modulo_its_length() {
        let table = DrumPatternTable::builtin();
        let long = table.get("four-bar-house").unwrap();
        assert_eq!(long.length(), 32);
        assert!(long.hit(DrumLane::Openhat, 31));
        assert!(!long.hit(DrumLane::Openhat, 15));
        assert_eq!(long.hit(DrumLane::Kick, 33), long.hit(DrumLane::Kick, 1));
    }

    #[test]
    fn short_pattern_wraps_within_the_loop() {
        let pattern = DrumPattern::from_rows(
            "triplet",
            "TRIPLET",
            "Test",
            DrumKit::Acoustic,
            [&[1, 0, 0], &[0, 1, 0], &[0, 0, 1], &[0, 0, 0]],
        )
        .unwrap();
        assert!(pattern.hit(DrumLane::Kick, 3));
        assert!(pattern.hit(DrumLane::Snare, 13));
        assert!(pattern.hit(DrumLane::Hihat, 14));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        let ragged = DrumPattern::from_rows("bad", "BAD", "", DrumKit::Tr808, [&[1, 0], &[1], &[0, 0], &[0, 0]]);
        assert!(matches!(ragged, Err(SequencerError::InvalidPattern { .. })));
        let empty = DrumPattern::from_rows("none", "NONE", "", DrumKit::Tr808, [&[], &[], &[], &[]]);
        assert!(empty.is_err());
    }

    #[test]
    fn deserializing_validates_lanes() {
        let empty = r#"{"id":"e","name":"E","genre":"","kit":"Tr808","length":0,"lanes":[[],[],[],[]]}"#;
        assert!(serde_json::from_str::<DrumPattern>(empty).is_err());

        let short = r#"{"id":"s","name":"S","genre":"","kit":"Tr808","length":16,
            "lanes":[[true],[false],[false],[false]]}"#;
        assert!(serde_json::from_str::<DrumPattern>(short).is_err());

        let ragged = r#"{"id":"r","name":"R","genre":"","kit":"Tr808",
            "lanes":[[true,false],[false],[false,false],[false,false]]}"#;
        assert!(serde_json::from_str::<DrumPattern>(ragged).is_err());
    }

    #[test]
    fn serialized_pattern_loads_back() {
        let table = DrumPatternTable::builtin();
        let trap = table.get("trap").unwrap();
        let json = serde_json::to_string(trap).unwrap();
        let loaded: DrumPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(&loaded, trap);
        assert_eq!(loaded.hit(DrumLane::Kick, 0), trap.hit(DrumLane::Kick, 0));
    }

    #[test]
    fn kit_ids_round_trip() {
        for kit in DrumKit::iter() {
            assert_eq!(kit.id().parse::<DrumKit>(), Ok(kit));
        }
        assert_eq!("tr-606".parse::<DrumKit>(), Err(SequencerError::UnknownKit("tr-606".into())));
    }
}
