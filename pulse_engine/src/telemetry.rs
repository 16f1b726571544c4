use pulse_shared::TimingAnalysis;

use crate::scheduler::ScheduledEvent;

/// Running timing figures for the scheduler.
///
/// Latency is measured from the audio-clock reading at commit to the
/// event's fire time, averaged over each batch of expired events.
#[derive(Debug, Clone, Default)]
pub struct TimingTelemetry {
    analysis: TimingAnalysis,
}

impl TimingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analysis(&self) -> TimingAnalysis {
        self.analysis
    }

    pub fn record_commit(&mut self) {
        self.analysis.total_events += 1;
    }

    /// A step whose fire time had already passed when it came due.
    pub fn record_skipped(&mut self) {
        self.analysis.missed_events += 1;
    }

    /// Folds a batch of pruned events into the statistics.
    ///
    /// Events that were never confirmed and lie more than one step behind
    /// `now` count as missed.
    pub fn record_expired(&mut self, expired: &[ScheduledEvent], now: f64, step_duration: f64) {
        if expired.is_empty() {
            return;
        }
        let leads: Vec<f64> = expired.iter().map(|e| e.time - e.committed_at).collect();
        let mean = leads.iter().sum::<f64>() / leads.len() as f64;
        let variance = leads.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / leads.len() as f64;
        self.analysis.average_latency = mean;
        self.analysis.jitter = variance.sqrt();

        let missed = expired
            .iter()
            .filter(|e| !e.executed && now - e.time > step_duration)
            .count();
        self.analysis.missed_events += missed as u64;
    }
}
