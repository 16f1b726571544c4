use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::{MAX_TEMPO, MIN_TEMPO};

/// Scheduler and transport tuning. All times are in seconds.
///
/// Every field has a default, so a config file only needs to list what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far ahead of the audio clock steps are committed.
    pub lookahead: f64,
    /// Headroom between `start()` and the first step.
    pub start_delay: f64,
    /// Timer period with micro-timing enabled.
    pub precise_interval: f64,
    pub standard_interval: f64,
    /// The UI callback fires this long before the step sounds.
    pub ui_lead: f64,
    pub event_retention: f64,
    pub ramp_time: f64,
    pub tempo: f32,
    pub swing: f32,
    pub micro_timing: bool,
    /// Fixed seed for micro-timing jitter; random when unset.
    pub jitter_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: 0.1,
            start_delay: 0.1,
            precise_interval: 0.010,
            standard_interval: 0.025,
            ui_lead: 0.016,
            event_retention: 1.0,
            ramp_time: 0.1,
            tempo: 120.0,
            swing: 0.0,
            micro_timing: true,
            jitter_seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SequencerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SequencerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SequencerError> {
        let config: SchedulerConfig =
            serde_json::from_str(text).map_err(|e| SequencerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SequencerError> {
        let positive = [
            ("lookahead", self.lookahead),
            ("precise_interval", self.precise_interval),
            ("standard_interval", self.standard_interval),
            ("event_retention", self.event_retention),
            ("ramp_time", self.ramp_time),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SequencerError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        for (name, value) in [("start_delay", self.start_delay), ("ui_lead", self.ui_lead)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SequencerError::Config(format!("{name} must not be negative, got {value}")));
            }
        }
        // A timer slower than the lookahead window would let steps fall behind the clock.
        if self.standard_interval >= self.lookahead || self.precise_interval >= self.lookahead {
            return Err(SequencerError::Config(
                "timer interval must be shorter than the lookahead window".into(),
            ));
        }
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&self.tempo) {
            return Err(SequencerError::Config(format!(
                "tempo {} outside {MIN_TEMPO}-{MAX_TEMPO} BPM",
                self.tempo
            )));
        }
        if !(0.0..=100.0).contains(&self.swing) {
            return Err(SequencerError::Config(format!("swing {} outside 0-100", self.swing)));
        }
        Ok(())
    }

    pub fn timer_interval(&self, micro_timing: bool) -> f64 {
        if micro_timing {
            self.precise_interval
        } else {
            self.standard_interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timer_interval(true), 0.010);
        assert_eq!(config.timer_interval(false), 0.025);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SchedulerConfig::from_json(r#"{ "tempo": 95.0, "jitter_seed": 7 }"#).unwrap();
        assert_eq!(config.tempo, 95.0);
        assert_eq!(config.jitter_seed, Some(7));
        assert_eq!(config.lookahead, 0.1);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            SchedulerConfig::from_json(r#"{ "tempo": 500.0 }"#),
            Err(SequencerError::Config(_))
        ));
        assert!(SchedulerConfig::from_json(r#"{ "lookahead": 0.02, "standard_interval": 0.025 }"#).is_err());
        assert!(SchedulerConfig::from_json("not json").is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = SchedulerConfig::load("/nonexistent/pulse.json").unwrap_err();
        assert!(matches!(err, SequencerError::Config(_)));
    }
}
