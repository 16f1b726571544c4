use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, trace};
use pulse_shared::{seconds_per_step, SchedulerConfig, TimingAnalysis};

use crate::dispatcher::EventDispatcher;
use crate::step_clock::StepClock;
use crate::telemetry::TimingTelemetry;
use crate::transport::TransportParams;

/// A step committed to the voices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub step: u8,
    /// Set once a poll observed the audio clock inside this step.
    pub executed: bool,
    /// Audio-clock reading when the step was committed.
    pub committed_at: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub dispatched: usize,
    /// Steps that came due with a fire time already in the past.
    pub skipped: usize,
    /// Steps already committed at the same time, not dispatched again.
    pub duplicates: usize,
    pub pruned: usize,
    /// Steps whose UI update is due before the next timer tick, in order.
    pub ui_due: Vec<usize>,
}

/// Commits steps to the dispatcher ahead of the audio clock.
///
/// Each `poll` schedules every step whose time falls inside the lookahead
/// window, so a timer that fires late or irregularly still produces
/// sample-accurate triggers as long as it polls once per window.
pub struct LookaheadScheduler {
    config: SchedulerConfig,
    transport: Arc<TransportParams>,
    clock: StepClock,
    events: VecDeque<ScheduledEvent>,
    dispatcher: EventDispatcher,
    telemetry: TimingTelemetry,
    rng: fastrand::Rng,
}

impl LookaheadScheduler {
    pub fn new(config: SchedulerConfig, transport: Arc<TransportParams>, dispatcher: EventDispatcher) -> Self {
        let rng = match config.jitter_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            config,
            transport,
            clock: StepClock::new(),
            events: VecDeque::new(),
            dispatcher,
            telemetry: TimingTelemetry::new(),
            rng,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn step_clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn current_step(&self) -> usize {
        self.clock.current_step()
    }

    pub fn events(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    pub fn analysis(&self) -> TimingAnalysis {
        self.telemetry.analysis()
    }

    /// Rewinds to step 0, `start_delay` after `now`, forgetting committed
    /// events and queued UI updates.
    pub fn reset(&mut self, now: f64, start_delay: f64) {
        self.clock.reset(now, start_delay);
        self.events.clear();
        self.dispatcher.clear_ui();
    }

    pub fn poll(&mut self, now: f64) -> PollReport {
        let mut report = PollReport::default();
        let transport = self.transport.snapshot();
        let step_duration = seconds_per_step(transport.tempo);

        for event in self.events.iter_mut() {
            if !event.executed && event.time <= now && now - event.time <= step_duration {
                event.executed = true;
            }
        }

        let horizon = now + self.config.lookahead;
        while self.clock.next_step_time() < horizon {
            let step = self.clock.current_step();
            let time = self.clock.fire_time(transport.tempo, transport.swing);

            if time <= now {
                report.skipped += 1;
                self.telemetry.record_skipped();
                debug!(target: "pulse::scheduler", "step {step} late by {:.1}ms, skipped", (now - time) * 1000.0);
            } else if self.is_pending(step, time) {
                report.duplicates += 1;
            } else {
                let dispatch = self.dispatcher.dispatch(step, time, transport.tempo);
                trace!(target: "pulse::scheduler", "step {step} at {time:.4}s: {dispatch:?}");
                self.events.push_back(ScheduledEvent {
                    time,
                    step: step as u8,
                    executed: false,
                    committed_at: now,
                });
                self.telemetry.record_commit();
                report.dispatched += 1;
            }

            let jitter = if transport.micro_timing { Some(&mut self.rng) } else { None };
            self.clock.advance(transport.tempo, jitter);
        }

        // Hand out UI updates due before the next tick, so none lands after
        // its note.
        let next_tick = now + self.config.timer_interval(transport.micro_timing);
        report.ui_due = self.dispatcher.flush_ui(next_tick);

        let cutoff = now - self.config.event_retention;
        let mut expired = Vec::new();
        while let Some(event) = self.events.front() {
            if event.time > cutoff {
                break;
            }
            expired.extend(self.events.pop_front());
        }
        report.pruned = expired.len();
        self.telemetry.record_expired(&expired, now, step_duration);

        report
    }

    fn is_pending(&self, step: usize, time: f64) -> bool {
        self.events
            .iter()
            .any(|e| !e.executed && e.step as usize == step && e.time == time)
    }
}
