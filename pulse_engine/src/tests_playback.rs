//! End-to-end playback scenarios against a manual clock and recording voices.
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use pulse_shared::{DrumKit, DrumPattern, SchedulerConfig, SequencerError, TrackId, TrackParam, Velocity};

use crate::clock::{ManualClock, ManualOutput};
use crate::controller::PlaybackController;
use crate::mixer::LaneParam;
use crate::voice::{RecordingVoiceFactory, Trigger, VoiceEvent};

struct Rig {
    controller: PlaybackController<ManualOutput>,
    clock: ManualClock,
    output: ManualOutput,
    voices: Receiver<VoiceEvent>,
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        micro_timing: false,
        jitter_seed: Some(7),
        ..SchedulerConfig::default()
    }
}

fn rig_with(factory: RecordingVoiceFactory, voices: Receiver<VoiceEvent>, output: ManualOutput, clock: ManualClock) -> Rig {
    let controller = PlaybackController::new(output.clone(), Box::new(factory), config()).unwrap();
    Rig { controller, clock, output, voices }
}

fn rig() -> Rig {
    let clock = ManualClock::new(0.0);
    let (factory, voices) = RecordingVoiceFactory::new();
    rig_with(factory, voices, ManualOutput::new(clock.clone()), clock)
}

impl Rig {
    /// Steps the clock in 10ms ticks up to and including `until`, polling each tick.
    fn run(&self, from_tick: u32, to_tick: u32) {
        for i in from_tick..=to_tick {
            self.clock.set(i as f64 * 0.01);
            self.controller.poll();
        }
    }

    fn triggers(&self, track: TrackId) -> Vec<Trigger> {
        self.voices
            .try_iter()
            .filter_map(|e| match e {
                VoiceEvent::Triggered(t, trigger) if t == track => Some(trigger),
                _ => None,
            })
            .collect()
    }

    fn drain(&self) -> Vec<VoiceEvent> {
        self.voices.try_iter().collect()
    }
}

fn every_step_kick() -> DrumPattern {
    DrumPattern::new(
        "every-step",
        "EVERY STEP",
        "Test",
        DrumKit::Tr808,
        [vec![true; 16], vec![false; 16], vec![false; 16], vec![false; 16]],
    )
    .unwrap()
}

#[test]
fn two_seconds_at_120_plays_one_loop() {
    let mut rig = rig();
    let (ui_tx, ui_rx) = unbounded();
    rig.controller
        .start(
            120.0,
            Some(Box::new(move |step| {
                let _ = ui_tx.send(step);
            })),
        )
        .unwrap();

    // Polling twice per tick must not double-commit anything.
    rig.run(0, 199);
    rig.run(199, 199);

    let stats = rig.controller.timing_stats();
    assert_eq!(stats.total_events, 16);
    assert_eq!(stats.missed_events, 0);
    assert_eq!(rig.controller.current_step() % 16, 0);

    let shown: Vec<usize> = ui_rx.try_iter().collect();
    assert_eq!(shown, (0..16).collect::<Vec<_>>());
}

#[test]
fn melody_and_kick_fire_together_on_step_zero() {
    let mut rig = rig();
    rig.controller.toggle_cell(0, 0, false).unwrap();
    rig.controller.select_drum_pattern("boom-bap").unwrap();
    rig.controller.set_drums_enabled(true);
    rig.controller.start(120.0, None).unwrap();

    rig.run(0, 1);

    let events = rig.drain();
    let step_zero: Vec<(TrackId, Trigger)> = events
        .into_iter()
        .filter_map(|e| match e {
            VoiceEvent::Triggered(track, trigger) => Some((track, trigger)),
            VoiceEvent::Disposed(_) => None,
        })
        .collect();

    let melody = step_zero.iter().find(|(t, _)| *t == TrackId::Melody).map(|(_, tr)| *tr).unwrap();
    let kick = step_zero.iter().find(|(t, _)| *t == TrackId::Kick).map(|(_, tr)| *tr).unwrap();
    assert_eq!(melody.note.map(|n| n.to_string()), Some("C5".to_string()));
    assert_eq!(melody.velocity, Velocity::Normal);
    assert_eq!(melody.time, kick.time);
    // Started at 0.0 with 100ms headroom.
    assert_eq!(melody.time, 0.1);
    assert!((melody.duration - 0.125).abs() < 1e-12);
}

#[test]
fn soloing_kick_fades_other_lanes() {
    let mut rig = rig();
    rig.clock.set(3.0);
    rig.controller
        .update_track_control("kick", TrackParam::Solo(true))
        .unwrap();

    let mixer = rig.controller.mixer();
    assert_eq!(mixer.gain_at(TrackId::Kick, 3.0), 0.9);
    assert_eq!(mixer.gain_at(TrackId::Kick, 3.2), 0.9);
    assert!(mixer.gain_at(TrackId::Snare, 3.05) > 0.0);
    assert_eq!(mixer.gain_at(TrackId::Snare, 3.11), 0.0);
    assert_eq!(mixer.gain_at(TrackId::Melody, 3.11), 0.0);

    let snare = rig.output.sink().ramps_for(TrackId::Snare, LaneParam::Gain);
    let fade = snare.last().copied().unwrap();
    assert_eq!((fade.from, fade.to, fade.start), (0.8, 0.0, 3.0));
    assert!((fade.duration - 0.1).abs() < 1e-12);
    assert!(rig.output.sink().ramps_for(TrackId::Kick, LaneParam::Gain).len() == 1);
}

#[test]
fn tempo_change_only_affects_later_steps() {
    let mut rig = rig();
    rig.controller.store().add_pattern(every_step_kick());
    rig.controller.select_drum_pattern("every-step").unwrap();
    rig.controller.set_drums_enabled(true);
    rig.controller.start(120.0, None).unwrap();

    rig.run(0, 45);
    let before: Vec<f64> = rig.triggers(TrackId::Kick).iter().map(|t| t.time).collect();
    assert_eq!(before.len(), 4);

    assert_eq!(rig.controller.set_tempo(180.0), 180.0);
    rig.run(46, 150);
    let after: Vec<f64> = rig.triggers(TrackId::Kick).iter().map(|t| t.time).collect();

    for pair in before.windows(2) {
        assert!((pair[1] - pair[0] - 0.125).abs() < 1e-9);
    }
    // Step 4 was already placed by the last 120 BPM advance.
    assert!((after[0] - 0.6).abs() < 1e-9);
    for pair in after.windows(2) {
        assert!((pair[1] - pair[0] - 60.0 / (180.0 * 4.0)).abs() < 1e-9);
    }
}

#[test]
fn start_and_stop_are_idempotent() {
    let mut rig = rig();
    rig.controller.stop();
    assert_eq!(rig.output.cancel_count(), 0);

    rig.controller.start(120.0, None).unwrap();
    rig.controller.start(90.0, None).unwrap();
    assert_eq!(rig.output.resume_count(), 1);
    assert_eq!(rig.controller.tempo(), 120.0);

    rig.run(0, 30);
    rig.controller.stop();
    rig.controller.stop();
    assert_eq!(rig.output.cancel_count(), 1);
    assert!(!rig.controller.is_running());
    assert_eq!(rig.controller.current_step(), 0);

    // Nothing is committed while stopped.
    let committed = rig.controller.timing_stats().total_events;
    rig.run(31, 80);
    assert_eq!(rig.controller.timing_stats().total_events, committed);
}

#[test]
fn locked_output_keeps_controller_stopped_until_unlocked() {
    let clock = ManualClock::new(0.0);
    let (factory, voices) = RecordingVoiceFactory::new();
    let mut rig = rig_with(factory, voices, ManualOutput::locked(clock.clone()), clock);

    let err = rig.controller.start(120.0, None).unwrap_err();
    assert!(matches!(err, SequencerError::AudioUnavailable(_)));
    assert!(!rig.controller.is_running());

    rig.output.unlock();
    rig.controller.start(120.0, None).unwrap();
    assert!(rig.controller.is_running());
}

#[test]
fn failing_voice_is_isolated() {
    let clock = ManualClock::new(0.0);
    let (factory, voices) = RecordingVoiceFactory::new();
    let factory = factory.failing(TrackId::Kick);
    let mut rig = rig_with(factory, voices, ManualOutput::new(clock.clone()), clock);
    rig.controller.toggle_cell(3, 0, false).unwrap();
    rig.controller.set_drums_enabled(true);
    rig.controller.start(120.0, None).unwrap();

    rig.run(0, 60);

    let stats = rig.controller.timing_stats();
    // Kick hits on steps 0 and 4 of boom-bap; both were rejected.
    assert_eq!(stats.failed_triggers, 2);
    assert_eq!(stats.total_events, 5);
    let events = rig.drain();
    assert!(events.iter().any(|e| matches!(e, VoiceEvent::Triggered(TrackId::Melody, _))));
    assert!(events.iter().any(|e| matches!(e, VoiceEvent::Triggered(TrackId::Hihat, _))));
    assert!(!events.iter().any(|e| matches!(e, VoiceEvent::Triggered(TrackId::Kick, _))));
}

#[test]
fn starved_timer_skips_late_steps_and_recovers() {
    let mut rig = rig();
    rig.controller.start(120.0, None).unwrap();

    // The first tick arrives almost a second late.
    rig.run(98, 98);
    let stats = rig.controller.timing_stats();
    assert_eq!(stats.missed_events, 8);
    assert_eq!(stats.total_events, 0);

    rig.run(99, 140);
    assert!(rig.controller.timing_stats().total_events > 0);
}

#[test]
fn switching_kits_replaces_drum_voices() {
    let mut rig = rig();
    rig.controller.select_drum_kit(DrumKit::Tr808);
    assert!(rig.drain().is_empty());

    rig.controller.select_drum_kit(DrumKit::Electronic);
    let disposed = rig
        .drain()
        .into_iter()
        .filter(|e| matches!(e, VoiceEvent::Disposed(_)))
        .count();
    assert_eq!(disposed, 4);

    rig.controller.set_drums_enabled(true);
    rig.controller.start(120.0, None).unwrap();
    rig.run(0, 2);
    assert_eq!(rig.triggers(TrackId::Kick).len(), 1);
}

#[test]
fn dropping_the_controller_disposes_every_voice() {
    let rig = rig();
    let Rig { controller, voices, .. } = rig;
    drop(controller);
    let disposed: Vec<TrackId> = voices
        .try_iter()
        .filter_map(|e| match e {
            VoiceEvent::Disposed(track) => Some(track),
            _ => None,
        })
        .collect();
    assert_eq!(disposed.len(), 5);
    assert!(disposed.contains(&TrackId::Melody));
}

#[test]
fn timer_thread_drives_the_scheduler() {
    let mut rig = rig();
    rig.controller.toggle_cell(15, 0, false).unwrap();
    rig.controller.start(120.0, None).unwrap();
    rig.clock.set(0.05);

    let event = rig.voices.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(matches!(event, VoiceEvent::Triggered(TrackId::Melody, t) if t.time == 0.1));
    rig.controller.stop();
}

#[test]
fn bad_ids_leave_selection_alone() {
    let rig = rig();
    assert_eq!(
        rig.controller.select_drum_pattern("polka"),
        Err(SequencerError::PatternNotFound("polka".into()))
    );
    assert!(rig.controller.set_scale("bebop").is_err());
    assert!(rig.controller.set_key("H").is_err());
    let selection = rig.controller.store().selection();
    assert_eq!(selection.drum_pattern, "boom-bap");
    assert_eq!(rig.controller.set_scale("dorian").unwrap().id(), "dorian");
}
