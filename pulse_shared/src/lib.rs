//! Data model shared between the sequencer engine and its front ends:
//! grid cells, scales, drum patterns, track controls, configuration and errors.

pub mod config;
pub mod drums;
pub mod error;
pub mod grid;
pub mod scale;
pub mod timing;
pub mod track;

pub use config::SchedulerConfig;
pub use drums::{DrumKit, DrumLane, DrumPattern, DrumPatternTable};
pub use error::SequencerError;
pub use grid::{Cell, Grid, Velocity};
pub use scale::{note_for_row, Key, NoteName, ScaleType};
pub use timing::{NoteLength, TimingAnalysis, TimingStats};
pub use track::{TrackControl, TrackId, TrackParam};

/// Rows in the note grid (one pitch per row).
pub const GRID_ROWS: usize = 16;
/// Steps per loop; also the column count of the grid.
pub const STEPS_PER_LOOP: usize = 16;
/// Steps per beat (sixteenth notes).
pub const STEPS_PER_BEAT: u32 = 4;

pub const MIN_TEMPO: f32 = 40.0;
pub const MAX_TEMPO: f32 = 300.0;

/// Seconds between two sixteenth-note steps at `tempo` BPM.
pub fn seconds_per_step(tempo: f32) -> f64 {
    60.0 / (tempo as f64 * STEPS_PER_BEAT as f64)
}
