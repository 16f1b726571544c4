pub mod clock;
pub mod commands;
pub mod controller;
pub mod delay;
pub mod dispatcher;
pub mod engine; // cpal AudioEngine lives here
pub mod kits;
pub mod mixer;
pub mod scheduler;
pub mod step_clock;
pub mod store;
pub mod synth;
pub mod telemetry;
pub mod transport;
pub mod voice;

// Re-exports
pub use clock::{AudioClock, AudioOutput, LaneSink, ManualClock, ManualOutput};
pub use commands::EngineCommand;
pub use controller::{PlaybackController, PlaybackState, StepCallback};
pub use engine::{AudioEngine, EngineHandle};
pub use scheduler::{LookaheadScheduler, PollReport, ScheduledEvent};
pub use synth::EngineVoiceFactory;
pub use voice::{Trigger, Voice, VoiceError, VoiceFactory};

#[cfg(test)]
mod tests_playback;
