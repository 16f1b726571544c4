//! Transport settings shared between the controller and the timer thread.
//!
//! Values are stored as `f32` bit patterns in atomics so the scheduler can
//! read them on every poll without taking a lock.
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use pulse_shared::{SchedulerConfig, MAX_TEMPO, MIN_TEMPO};

#[derive(Debug)]
pub struct TransportParams {
    tempo: AtomicU32,
    swing: AtomicU32,
    micro_timing: AtomicBool,
}

/// A consistent copy of the transport for one scheduling pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportState {
    pub tempo: f32,
    pub swing: f32,
    pub micro_timing: bool,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self::new(120.0, 0.0, true)
    }
}

impl TransportParams {
    pub fn new(tempo: f32, swing: f32, micro_timing: bool) -> Self {
        Self {
            tempo: AtomicU32::new(clamp_tempo(tempo).to_bits()),
            swing: AtomicU32::new(swing.clamp(0.0, 100.0).to_bits()),
            micro_timing: AtomicBool::new(micro_timing),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.tempo, config.swing, config.micro_timing)
    }

    pub fn tempo(&self) -> f32 {
        f32::from_bits(self.tempo.load(Ordering::Relaxed))
    }

    /// Stores the tempo clamped to the supported range and returns what was stored.
    pub fn set_tempo(&self, bpm: f32) -> f32 {
        let bpm = clamp_tempo(bpm);
        self.tempo.store(bpm.to_bits(), Ordering::Relaxed);
        bpm
    }

    pub fn swing(&self) -> f32 {
        f32::from_bits(self.swing.load(Ordering::Relaxed))
    }

    pub fn set_swing(&self, amount: f32) -> f32 {
        let amount = if amount.is_nan() { 0.0 } else { amount.clamp(0.0, 100.0) };
        self.swing.store(amount.to_bits(), Ordering::Relaxed);
        amount
    }

    pub fn micro_timing(&self) -> bool {
        self.micro_timing.load(Ordering::Relaxed)
    }

    pub fn set_micro_timing(&self, enabled: bool) {
        self.micro_timing.store(enabled, Ordering::Relaxed);
    }

    /// Flips micro-timing and returns the new value.
    pub fn toggle_micro_timing(&self) -> bool {
        !self.micro_timing.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TransportState {
        TransportState {
            tempo: self.tempo(),
            swing: self.swing(),
            micro_timing: self.micro_timing(),
        }
    }
}

fn clamp_tempo(bpm: f32) -> f32 {
    if bpm.is_nan() {
        return MIN_TEMPO;
    }
    bpm.clamp(MIN_TEMPO, MAX_TEMPO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_is_clamped() {
        let params = TransportParams::default();
        assert_eq!(params.set_tempo(500.0), 300.0);
        assert_eq!(params.tempo(), 300.0);
        assert_eq!(params.set_tempo(10.0), 40.0);
        assert_eq!(params.set_tempo(f32::NAN), 40.0);
    }

    #[test]
    fn toggle_returns_new_state() {
        let params = TransportParams::new(120.0, 0.0, false);
        assert!(params.toggle_micro_timing());
        assert!(params.micro_timing());
        assert!(!params.toggle_micro_timing());
    }

    #[test]
    fn swing_is_a_percentage() {
        let params = TransportParams::default();
        assert_eq!(params.set_swing(150.0), 100.0);
        assert_eq!(params.set_swing(-5.0), 0.0);
        assert_eq!(params.snapshot().swing, 0.0);
    }
}
