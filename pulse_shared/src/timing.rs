use serde::{Deserialize, Serialize};

use crate::STEPS_PER_BEAT;

/// Musical note durations, converted to seconds against a tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteLength {
    ThirtySecond,
    #[default]
    Sixteenth,
    Eighth,
    Quarter,
    Half,
    Whole,
}

impl NoteLength {
    /// Length in sixteenth-note steps.
    pub fn steps(&self) -> f64 {
        match self {
            NoteLength::ThirtySecond => 0.5,
            NoteLength::Sixteenth => 1.0,
            NoteLength::Eighth => 2.0,
            NoteLength::Quarter => 4.0,
            NoteLength::Half => 8.0,
            NoteLength::Whole => 16.0,
        }
    }

    pub fn seconds(&self, tempo: f32) -> f64 {
        self.steps() * 60.0 / (tempo as f64 * STEPS_PER_BEAT as f64)
    }
}

/// Rolling timing figures kept by the scheduler.
///
/// Latency is the lead between commit and fire time; jitter is the
/// standard deviation of that lead over the last pruned batch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub average_latency: f64,
    pub jitter: f64,
    pub missed_events: u64,
    pub total_events: u64,
}

/// Snapshot returned to callers, with the transport settings that shaped it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingStats {
    pub average_latency: f64,
    pub jitter: f64,
    pub missed_events: u64,
    pub total_events: u64,
    pub failed_triggers: u64,
    pub swing_amount: f32,
    pub micro_timing_enabled: bool,
}

impl TimingStats {
    pub fn new(
        analysis: TimingAnalysis,
        failed_triggers: u64,
        swing_amount: f32,
        micro_timing_enabled: bool,
    ) -> Self {
        Self {
            average_latency: analysis.average_latency,
            jitter: analysis.jitter,
            missed_events: analysis.missed_events,
            total_events: analysis.total_events,
            failed_triggers,
            swing_amount,
            micro_timing_enabled,
        }
    }
}
