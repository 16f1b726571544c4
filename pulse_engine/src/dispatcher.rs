use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, warn};
use pulse_shared::{note_for_row, NoteLength, TrackId, Velocity};

use crate::store::PatternStore;
use crate::voice::{Trigger, Voice, VoiceBank, VoiceFactory};

/// Step positions waiting to be shown, ordered by due time.
#[derive(Debug, Default)]
pub struct DrawQueue {
    pending: VecDeque<(f64, usize)>,
}

impl DrawQueue {
    pub fn push(&mut self, due: f64, step: usize) {
        self.pending.push_back((due, step));
    }

    /// Removes and returns every step due at or before `now`.
    pub fn drain_due(&mut self, now: f64) -> Vec<usize> {
        let mut due = Vec::new();
        while let Some(&(time, step)) = self.pending.front() {
            if time > now {
                break;
            }
            self.pending.pop_front();
            due.push(step);
        }
        due
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub melody_notes: usize,
    pub drum_hits: usize,
    pub failed: usize,
}

/// Fans one step out to the voices and queues the matching UI update.
pub struct EventDispatcher {
    store: Arc<PatternStore>,
    voices: VoiceBank,
    draw: DrawQueue,
    ui_lead: f64,
    failed_triggers: u64,
    /// Last drum pattern id reported missing, so the log line is written once.
    missing_pattern: Option<String>,
}

impl EventDispatcher {
    pub fn new(store: Arc<PatternStore>, factory: &dyn VoiceFactory, ui_lead: f64) -> Self {
        let kit = store.selection().kit;
        Self {
            store,
            voices: VoiceBank::new(factory, kit),
            draw: DrawQueue::default(),
            ui_lead,
            failed_triggers: 0,
            missing_pattern: None,
        }
    }

    pub fn voices_mut(&mut self) -> &mut VoiceBank {
        &mut self.voices
    }

    pub fn failed_triggers(&self) -> u64 {
        self.failed_triggers
    }

    pub fn draw_queue(&self) -> &DrawQueue {
        &self.draw
    }

    pub fn clear_ui(&mut self) {
        self.draw.clear();
    }

    /// Triggers everything that sounds on `step` at audio time `time`.
    pub fn dispatch(&mut self, step: usize, time: f64, tempo: f32) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.draw.push((time - self.ui_lead).max(0.0), step);

        let grid = self.store.grid();
        let selection = self.store.selection();
        let duration = NoteLength::Sixteenth.seconds(tempo);

        for (row, cell) in grid.column(step) {
            let trigger = Trigger {
                note: Some(note_for_row(row, selection.scale, selection.key)),
                duration,
                time,
                velocity: cell.velocity,
            };
            if fire(self.voices.melody.as_mut(), TrackId::Melody, &trigger) {
                report.melody_notes += 1;
            } else {
                report.failed += 1;
            }
        }

        if selection.drums_enabled {
            let patterns = self.store.patterns();
            match patterns.get(&selection.drum_pattern) {
                Some(pattern) => {
                    self.missing_pattern = None;
                    let trigger = Trigger {
                        note: None,
                        duration,
                        time,
                        velocity: Velocity::Normal,
                    };
                    for lane in pattern.hits(step) {
                        if fire(self.voices.drum(lane), lane.track(), &trigger) {
                            report.drum_hits += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                }
                None => {
                    if self.missing_pattern.as_deref() != Some(selection.drum_pattern.as_str()) {
                        debug!(
                            target: "pulse::dispatch",
                            "drum pattern `{}` not found, skipping drums",
                            selection.drum_pattern
                        );
                        self.missing_pattern = Some(selection.drum_pattern.clone());
                    }
                }
            }
        }

        self.failed_triggers += report.failed as u64;
        report
    }

    /// Takes every queued step whose UI time is at or before `until`.
    pub fn flush_ui(&mut self, until: f64) -> Vec<usize> {
        self.draw.drain_due(until)
    }

    pub fn swap_kit(&mut self, factory: &dyn VoiceFactory) {
        let kit = self.store.selection().kit;
        self.voices.swap_kit(factory, kit);
    }
}

fn fire(voice: &mut dyn Voice, track: TrackId, trigger: &Trigger) -> bool {
    match voice.trigger_attack_release(trigger) {
        Ok(()) => true,
        Err(e) => {
            warn!(target: "pulse::dispatch", "{track} voice failed at {:.3}s: {e}", trigger.time);
            false
        }
    }
}
