//! Audio time base and the output-side seams the controller drives.
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_shared::{SequencerError, TrackId};

use crate::mixer::{LaneParam, Ramp};

/// Monotonic audio-clock reading in seconds.
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Receives per-lane parameter ramps, timed on the audio clock.
pub trait LaneSink: Send + Sync {
    fn ramp(&self, track: TrackId, param: LaneParam, ramp: Ramp);
}

/// The audio device as seen by the playback controller.
pub trait AudioOutput {
    fn clock(&self) -> Arc<dyn AudioClock>;

    /// Unlocks/resumes the output. This is the only call in `start()` that
    /// may block on the host.
    fn resume(&mut self) -> Result<(), SequencerError>;

    /// Drops triggers that were committed but have not started sounding.
    fn cancel_pending(&self);

    fn lane_sink(&self) -> Arc<dyn LaneSink>;

    /// Triggers accepted by a voice but later refused by the output.
    fn dropped_triggers(&self) -> u64 {
        0
    }
}

/// Clock advanced by hand. Used by tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) -> f64 {
        let next = self.now() + seconds;
        self.set(next);
        next
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Lane sink that keeps every ramp it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    ramps: Mutex<Vec<(TrackId, LaneParam, Ramp)>>,
}

impl RecordingSink {
    pub fn ramps(&self) -> Vec<(TrackId, LaneParam, Ramp)> {
        self.ramps.lock().clone()
    }

    pub fn ramps_for(&self, track: TrackId, param: LaneParam) -> Vec<Ramp> {
        self.ramps
            .lock()
            .iter()
            .filter(|(t, p, _)| *t == track && *p == param)
            .map(|(_, _, r)| *r)
            .collect()
    }
}

impl LaneSink for RecordingSink {
    fn ramp(&self, track: TrackId, param: LaneParam, ramp: Ramp) {
        self.ramps.lock().push((track, param, ramp));
    }
}

/// Output driven by a [`ManualClock`].
///
/// Starts locked when asked to, mimicking hosts that refuse to resume audio
/// until a user gesture; `unlock()` lets the next `resume()` succeed.
#[derive(Clone)]
pub struct ManualOutput {
    clock: ManualClock,
    locked: Arc<AtomicBool>,
    resumes: Arc<AtomicUsize>,
    cancels: Arc<AtomicUsize>,
    sink: Arc<RecordingSink>,
}

impl ManualOutput {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            locked: Arc::new(AtomicBool::new(false)),
            resumes: Arc::new(AtomicUsize::new(0)),
            cancels: Arc::new(AtomicUsize::new(0)),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn locked(clock: ManualClock) -> Self {
        let output = Self::new(clock);
        output.locked.store(true, Ordering::Relaxed);
        output
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Relaxed);
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::Relaxed)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::Relaxed)
    }

    pub fn sink(&self) -> Arc<RecordingSink> {
        self.sink.clone()
    }
}

impl AudioOutput for ManualOutput {
    fn clock(&self) -> Arc<dyn AudioClock> {
        Arc::new(self.clock.clone())
    }

    fn resume(&mut self) -> Result<(), SequencerError> {
        if self.locked.load(Ordering::Relaxed) {
            return Err(SequencerError::AudioUnavailable("output is locked".into()));
        }
        self.resumes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn cancel_pending(&self) {
        self.cancels.fetch_add(1, Ordering::Relaxed);
    }

    fn lane_sink(&self) -> Arc<dyn LaneSink> {
        self.sink.clone()
    }
}
