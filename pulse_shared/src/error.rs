/// Errors surfaced by the sequencer API.
///
/// None of these are fatal to playback: a failed call leaves the previous
/// state untouched and the scheduler keeps running.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SequencerError {
    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),
    #[error("unknown track id `{0}`")]
    InvalidTrack(String),
    #[error("drum pattern `{0}` not found")]
    PatternNotFound(String),
    #[error("invalid drum pattern `{id}`: {reason}")]
    InvalidPattern { id: String, reason: String },
    #[error("unknown scale `{0}`")]
    UnknownScale(String),
    #[error("unknown key `{0}`")]
    UnknownKey(String),
    #[error("unknown drum kit `{0}`")]
    UnknownKit(String),
    #[error("grid cell ({row}, {col}) is outside the 16x16 grid")]
    CellOutOfRange { row: usize, col: usize },
    #[error("config error: {0}")]
    Config(String),
}
