use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

pub const NUM_TRACKS: usize = 5;

/// Mixer lanes: the melody voice plus one lane per drum sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrackId {
    Melody,
    Kick,
    Snare,
    Hihat,
    Openhat,
}

impl TrackId {
    pub const ALL: [TrackId; NUM_TRACKS] = [
        TrackId::Melody,
        TrackId::Kick,
        TrackId::Snare,
        TrackId::Hihat,
        TrackId::Openhat,
    ];

    pub fn index(&self) -> usize {
        match self {
            TrackId::Melody => 0,
            TrackId::Kick => 1,
            TrackId::Snare => 2,
            TrackId::Hihat => 3,
            TrackId::Openhat => 4,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            TrackId::Melody => "melody",
            TrackId::Kick => "kick",
            TrackId::Snare => "snare",
            TrackId::Hihat => "hihat",
            TrackId::Openhat => "openhat",
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TrackId {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackId::ALL
            .into_iter()
            .find(|track| track.id() == s)
            .ok_or_else(|| SequencerError::InvalidTrack(s.to_string()))
    }
}

/// User-facing mixer settings for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackControl {
    pub volume: f32,
    /// -1.0 (left) ..= 1.0 (right)
    pub pan: f32,
    pub muted: bool,
    pub solo: bool,
    pub reverb_send: f32,
    pub delay_send: f32,
}

impl Default for TrackControl {
    fn default() -> Self {
        Self {
            volume: 0.8,
            pan: 0.0,
            muted: false,
            solo: false,
            reverb_send: 0.0,
            delay_send: 0.0,
        }
    }
}

impl TrackControl {
    /// Factory settings for each lane.
    pub fn default_for(track: TrackId) -> Self {
        let base = Self::default();
        match track {
            TrackId::Melody => base,
            TrackId::Kick => Self { volume: 0.9, ..base },
            TrackId::Snare => base,
            TrackId::Hihat => Self { volume: 0.6, pan: 0.2, ..base },
            TrackId::Openhat => Self { volume: 0.7, pan: -0.2, ..base },
        }
    }

    /// Returns a copy with `param` applied. Levels are clamped to their
    /// range; a NaN level keeps the current one.
    pub fn with(self, param: TrackParam) -> Self {
        match param {
            TrackParam::Volume(v) => Self { volume: level(v, self.volume, 0.0, 1.0), ..self },
            TrackParam::Pan(p) => Self { pan: level(p, self.pan, -1.0, 1.0), ..self },
            TrackParam::Muted(m) => Self { muted: m, ..self },
            TrackParam::Solo(s) => Self { solo: s, ..self },
            TrackParam::ReverbSend(r) => Self { reverb_send: level(r, self.reverb_send, 0.0, 1.0), ..self },
            TrackParam::DelaySend(d) => Self { delay_send: level(d, self.delay_send, 0.0, 1.0), ..self },
        }
    }
}

fn level(value: f32, current: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        current
    } else {
        value.clamp(min, max)
    }
}

/// A single mixer parameter change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackParam {
    Volume(f32),
    Pan(f32),
    Muted(bool),
    Solo(bool),
    ReverbSend(f32),
    DelaySend(f32),
}
