use pulse_shared::{seconds_per_step, STEPS_PER_LOOP};

/// Share of a step that a fully swung off-beat is pushed back by.
const SWING_RATIO: f64 = 0.33;
/// Maximum relative step-length variation with micro-timing on (+/-0.05%).
const MICRO_JITTER: f64 = 0.001;

/// Audio-time position of the loop.
///
/// `next_step_time` is the unswung audio time of `current_step`. Swing is
/// applied when a step's fire time is read and never accumulates into the
/// grid, so the loop keeps its length at any swing amount.
#[derive(Debug, Clone, PartialEq)]
pub struct StepClock {
    next_step_time: f64,
    current_step: usize,
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StepClock {
    pub fn new() -> Self {
        Self {
            next_step_time: 0.0,
            current_step: 0,
        }
    }

    /// Rewinds to step 0, due `start_delay` seconds after `now`.
    pub fn reset(&mut self, now: f64, start_delay: f64) {
        self.next_step_time = now + start_delay;
        self.current_step = 0;
    }

    pub fn next_step_time(&self) -> f64 {
        self.next_step_time
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Audio time the current step should sound at, with swing applied to odd steps.
    pub fn fire_time(&self, tempo: f32, swing: f32) -> f64 {
        if self.current_step % 2 == 1 && swing > 0.0 {
            self.next_step_time + seconds_per_step(tempo) * SWING_RATIO * (swing as f64 / 100.0)
        } else {
            self.next_step_time
        }
    }

    /// Moves to the next step and returns the step length that was used.
    ///
    /// With `jitter` the length is scaled by a random factor in
    /// `1 +/- 0.0005`; tempo changes only ever affect later steps.
    pub fn advance(&mut self, tempo: f32, jitter: Option<&mut fastrand::Rng>) -> f64 {
        let mut step = seconds_per_step(tempo);
        if let Some(rng) = jitter {
            step *= 1.0 + (rng.f64() - 0.5) * MICRO_JITTER;
        }
        self.next_step_time += step;
        self.current_step = (self.current_step + 1) % STEPS_PER_LOOP;
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_elapses_whole_steps() {
        for tempo in 60..=180 {
            let mut clock = StepClock::new();
            clock.reset(0.0, 0.0);
            for _ in 0..32 {
                clock.advance(tempo as f32, None);
            }
            let expected = 32.0 * 60.0 / (tempo as f64 * 4.0);
            assert!((clock.next_step_time() - expected).abs() < 1e-9, "tempo {tempo}");
            assert_eq!(clock.current_step(), 0);
        }
    }

    #[test]
    fn next_step_time_strictly_increases_with_jitter() {
        let mut rng = fastrand::Rng::with_seed(42);
        let mut clock = StepClock::new();
        clock.reset(1.0, 0.1);
        let mut last = clock.next_step_time();
        for _ in 0..1000 {
            let step = clock.advance(300.0, Some(&mut rng));
            assert!((step - 0.05).abs() <= 0.05 * 0.0005 + 1e-12);
            assert!(clock.next_step_time() > last);
            last = clock.next_step_time();
        }
    }

    #[test]
    fn swing_delays_odd_steps_only() {
        let mut clock = StepClock::new();
        clock.reset(0.0, 0.0);
        assert_eq!(clock.fire_time(120.0, 100.0), 0.0);
        clock.advance(120.0, None);
        let swung = clock.fire_time(120.0, 50.0);
        assert!((swung - (0.125 + 0.125 * 0.33 * 0.5)).abs() < 1e-12);
        assert_eq!(clock.fire_time(120.0, 0.0), 0.125);
    }

    #[test]
    fn reset_returns_to_step_zero() {
        let mut clock = StepClock::new();
        clock.reset(0.0, 0.0);
        clock.advance(120.0, None);
        clock.advance(120.0, None);
        clock.reset(5.0, 0.1);
        assert_eq!(clock.current_step(), 0);
        assert!((clock.next_step_time() - 5.1).abs() < 1e-12);
    }
}
