use pulse_shared::TrackId;

use crate::kits::ToneShape;
use crate::mixer::{LaneParam, Ramp};

/// A note or hit queued for the audio thread, positioned in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTrigger {
    pub track: TrackId,
    pub shape: ToneShape,
    pub freq: f32,
    pub velocity: f32,
    pub start_sample: u64,
    pub length_samples: u64,
}

/// Messages from the control side to the audio callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    Trigger(PendingTrigger),
    /// Drop every trigger that has not started sounding yet.
    CancelPending,
    RampLane {
        track: TrackId,
        param: LaneParam,
        ramp: Ramp,
    },
}
