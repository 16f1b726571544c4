use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use pulse_shared::{
    Cell, DrumKit, Key, ScaleType, SchedulerConfig, SequencerError, TimingStats, TrackId, TrackParam,
};

use crate::clock::{AudioClock, AudioOutput};
use crate::dispatcher::EventDispatcher;
use crate::mixer::TrackMixer;
use crate::scheduler::{LookaheadScheduler, PollReport};
use crate::store::PatternStore;
use crate::transport::TransportParams;
use crate::voice::VoiceFactory;

/// UI position callback, called with the step index that is about to sound.
pub type StepCallback = Box<dyn FnMut(usize) + Send>;

type SharedCallback = Arc<Mutex<Option<StepCallback>>>;

/// One scheduling pass. The UI callback runs after the scheduler lock is
/// released, so it may read the controller; it must not poll it.
///
/// The callback lock is held across the pass so steps reach the callback in
/// order when the timer thread and a caller poll at once.
fn poll_once(scheduler: &Mutex<LookaheadScheduler>, on_step: &SharedCallback, now: f64) -> PollReport {
    let mut on_step = on_step.lock();
    let report = scheduler.lock().poll(now);
    if let Some(callback) = on_step.as_mut() {
        for step in &report.ui_due {
            callback(*step);
        }
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Running,
}

struct TimerThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl TimerThread {
    /// Polls the scheduler on a wall-clock tick until told to stop.
    ///
    /// The tick period follows the micro-timing flag and is re-armed when
    /// the flag changes.
    fn spawn(
        scheduler: Arc<Mutex<LookaheadScheduler>>,
        on_step: SharedCallback,
        clock: Arc<dyn AudioClock>,
        transport: Arc<TransportParams>,
        config: SchedulerConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            let mut interval = config.timer_interval(transport.micro_timing());
            let mut ticker = tick(Duration::from_secs_f64(interval));
            loop {
                let rearm = select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let report = poll_once(&scheduler, &on_step, clock.now());
                        if report.skipped > 0 {
                            warn!(target: "pulse::timer", "timer starved, skipped {} steps", report.skipped);
                        }
                        let wanted = config.timer_interval(transport.micro_timing());
                        (wanted != interval).then_some(wanted)
                    }
                };
                if let Some(wanted) = rearm {
                    debug!(target: "pulse::timer", "timer interval {:.0}ms -> {:.0}ms", interval * 1e3, wanted * 1e3);
                    interval = wanted;
                    ticker = tick(Duration::from_secs_f64(interval));
                }
            }
        });
        Self { stop_tx, handle }
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            warn!(target: "pulse::timer", "scheduler thread panicked");
        }
    }
}

/// Public face of the sequencer: transport, pattern edits and mixer.
///
/// Owns the scheduler (shared with its timer thread), the pattern store,
/// the mixer and the audio output. Dropping the controller stops playback
/// and disposes every voice.
pub struct PlaybackController<O: AudioOutput> {
    output: O,
    config: SchedulerConfig,
    clock: Arc<dyn AudioClock>,
    transport: Arc<TransportParams>,
    store: Arc<PatternStore>,
    scheduler: Arc<Mutex<LookaheadScheduler>>,
    on_step: SharedCallback,
    mixer: TrackMixer,
    factory: Box<dyn VoiceFactory>,
    timer: Option<TimerThread>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O, factory: Box<dyn VoiceFactory>, config: SchedulerConfig) -> Result<Self, SequencerError> {
        config.validate()?;
        let clock = output.clock();
        let transport = Arc::new(TransportParams::from_config(&config));
        let store = Arc::new(PatternStore::default());
        let dispatcher = EventDispatcher::new(store.clone(), factory.as_ref(), config.ui_lead);
        let scheduler = LookaheadScheduler::new(config.clone(), transport.clone(), dispatcher);
        let mixer = TrackMixer::new(clock.clone(), output.lane_sink(), config.ramp_time);

        Ok(Self {
            output,
            config,
            clock,
            transport,
            store,
            scheduler: Arc::new(Mutex::new(scheduler)),
            on_step: Arc::new(Mutex::new(None)),
            mixer,
            factory,
            timer: None,
        })
    }

    pub fn state(&self) -> PlaybackState {
        if self.timer.is_some() {
            PlaybackState::Running
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PlaybackState::Running
    }

    /// Starts playback at `tempo`. A no-op while already running.
    ///
    /// Resuming the output is the only step that can fail; on failure the
    /// controller stays stopped and a later call tries again.
    pub fn start(&mut self, tempo: f32, on_step: Option<StepCallback>) -> Result<(), SequencerError> {
        if self.is_running() {
            return Ok(());
        }
        if let Err(e) = self.output.resume() {
            warn!(target: "pulse::controller", "start failed: {e}");
            return Err(e);
        }

        let tempo = self.transport.set_tempo(tempo);
        self.scheduler.lock().reset(self.clock.now(), self.config.start_delay);
        *self.on_step.lock() = on_step;
        self.timer = Some(TimerThread::spawn(
            self.scheduler.clone(),
            self.on_step.clone(),
            self.clock.clone(),
            self.transport.clone(),
            self.config.clone(),
        ));
        info!(target: "pulse::controller", "playback started at {tempo} BPM");
        Ok(())
    }

    /// Stops playback. A no-op while stopped.
    ///
    /// Triggers already committed to the engine but not yet sounding are
    /// cancelled; audio already rendered is not recalled.
    pub fn stop(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        timer.stop();
        self.output.cancel_pending();
        self.scheduler.lock().reset(self.clock.now(), 0.0);
        info!(target: "pulse::controller", "playback stopped");
    }

    /// Runs one scheduling pass at the current audio time.
    ///
    /// The timer thread does this on every tick; calling it directly is
    /// harmless since steps already committed are not committed again.
    /// Does nothing while stopped.
    pub fn poll(&self) -> PollReport {
        if !self.is_running() {
            return PollReport::default();
        }
        poll_once(&self.scheduler, &self.on_step, self.clock.now())
    }

    /// Sets the tempo, clamped to 40-300 BPM. Steps already committed keep
    /// their times.
    pub fn set_tempo(&self, bpm: f32) -> f32 {
        let tempo = self.transport.set_tempo(bpm);
        debug!(target: "pulse::controller", "tempo {tempo}");
        tempo
    }

    pub fn tempo(&self) -> f32 {
        self.transport.tempo()
    }

    pub fn set_swing(&self, amount: f32) -> f32 {
        self.transport.set_swing(amount)
    }

    pub fn set_micro_timing(&self, enabled: bool) {
        self.transport.set_micro_timing(enabled);
    }

    pub fn toggle_micro_timing(&self) -> bool {
        self.transport.toggle_micro_timing()
    }

    pub fn current_step(&self) -> usize {
        self.scheduler.lock().current_step()
    }

    pub fn timing_stats(&self) -> TimingStats {
        let scheduler = self.scheduler.lock();
        TimingStats::new(
            scheduler.analysis(),
            scheduler.dispatcher().failed_triggers() + self.output.dropped_triggers(),
            self.transport.swing(),
            self.transport.micro_timing(),
        )
    }

    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    pub fn toggle_cell(&self, row: usize, col: usize, accent: bool) -> Result<Cell, SequencerError> {
        self.store.toggle_cell(row, col, accent)
    }

    pub fn clear_grid(&self) {
        self.store.clear_grid();
    }

    pub fn set_scale(&self, id: &str) -> Result<ScaleType, SequencerError> {
        let scale = id.parse::<ScaleType>()?;
        self.store.set_scale(scale);
        Ok(scale)
    }

    pub fn set_key(&self, id: &str) -> Result<Key, SequencerError> {
        let key = id.parse::<Key>()?;
        self.store.set_key(key);
        Ok(key)
    }

    pub fn select_drum_pattern(&self, id: &str) -> Result<(), SequencerError> {
        self.store.select_drum_pattern(id)
    }

    pub fn set_drums_enabled(&self, enabled: bool) {
        self.store.set_drums_enabled(enabled);
    }

    pub fn toggle_drums(&self) -> bool {
        self.store.toggle_drums()
    }

    /// Switches the drum kit, replacing the drum voices.
    pub fn select_drum_kit(&self, kit: DrumKit) {
        if self.store.selection().kit == kit {
            return;
        }
        self.store.set_kit(kit);
        self.scheduler.lock().dispatcher_mut().swap_kit(self.factory.as_ref());
    }

    pub fn mixer(&self) -> &TrackMixer {
        &self.mixer
    }

    pub fn update_track_control(&mut self, track_id: &str, param: TrackParam) -> Result<(), SequencerError> {
        self.mixer.update_track_control(track_id, param)
    }

    pub fn toggle_solo(&mut self, track: TrackId) -> bool {
        self.mixer.toggle_solo(track)
    }

    pub fn toggle_mute(&mut self, track: TrackId) -> bool {
        self.mixer.toggle_mute(track)
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: AudioOutput> Drop for PlaybackController<O> {
    fn drop(&mut self) {
        self.stop();
        self.scheduler.lock().dispatcher_mut().voices_mut().dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, ManualOutput};
    use crate::voice::RecordingVoiceFactory;
    use crossbeam_channel::unbounded;

    #[test]
    fn step_callback_may_read_the_scheduler() {
        let clock = ManualClock::new(0.0);
        let (factory, _voices) = RecordingVoiceFactory::new();
        let config = SchedulerConfig { micro_timing: false, ..SchedulerConfig::default() };
        let mut controller =
            PlaybackController::new(ManualOutput::new(clock.clone()), Box::new(factory), config).unwrap();

        let scheduler = controller.scheduler.clone();
        let (tx, rx) = unbounded();
        controller
            .start(
                120.0,
                Some(Box::new(move |step| {
                    let _ = tx.send((step, scheduler.lock().current_step()));
                })),
            )
            .unwrap();

        clock.set(0.08);
        controller.poll();
        let (step, next) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(step, 0);
        assert_eq!(next, 1);
    }
}
