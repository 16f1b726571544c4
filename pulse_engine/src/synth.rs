//! Reference voices rendered inside the audio callback.
//!
//! Control-side [`EngineVoice`]s turn triggers into sample positions and
//! post them to the engine; the callback starts them on the exact frame.
use crossbeam_channel::TrySendError;
use pulse_shared::track::NUM_TRACKS;
use pulse_shared::TrackId;

use crate::commands::{EngineCommand, PendingTrigger};
use crate::engine::EngineHandle;
use crate::kits::{ToneShape, Waveform};
use crate::voice::{Trigger, Voice, VoiceError, VoiceFactory};

/// Fixed pool size; the callback never allocates voices.
pub const MAX_VOICES: usize = 32;
/// Upper bound on triggers waiting to start.
pub const MAX_PENDING: usize = 512;

/// Amplitude where a decaying voice is considered silent.
const SILENCE: f32 = 0.0005;
/// Release applied to gated notes, in seconds.
const RELEASE: f32 = 0.03;

/// Per-sample multiplier that decays by 60 dB over `seconds`.
fn decay_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    0.001_f32.powf(1.0 / (seconds.max(0.001) * sample_rate))
}

#[derive(Clone, Copy, Debug)]
struct SynthVoice {
    track: TrackId,
    waveform: Waveform,
    phase: f32,
    freq: f32,
    amp: f32,
    decay: f32,
    release: f32,
    noise: f32,
    pitch_env: f32,
    pitch_amount: f32,
    pitch_decay: f32,
    /// Samples left before a gated note starts releasing.
    gate: Option<u64>,
    alive: bool,
}

impl SynthVoice {
    const EMPTY: SynthVoice = SynthVoice {
        track: TrackId::Melody,
        waveform: Waveform::Sine,
        phase: 0.0,
        freq: 0.0,
        amp: 0.0,
        decay: 1.0,
        release: 1.0,
        noise: 0.0,
        pitch_env: 0.0,
        pitch_amount: 0.0,
        pitch_decay: 1.0,
        gate: None,
        alive: false,
    };

    fn start(trigger: &PendingTrigger, sample_rate: f32) -> Self {
        let shape: &ToneShape = &trigger.shape;
        Self {
            track: trigger.track,
            waveform: shape.waveform,
            phase: 0.0,
            freq: trigger.freq,
            amp: 0.3 * trigger.velocity,
            decay: decay_coefficient(shape.decay, sample_rate),
            release: decay_coefficient(RELEASE, sample_rate),
            noise: shape.noise,
            pitch_env: 1.0,
            pitch_amount: shape.pitch_amount,
            pitch_decay: decay_coefficient(shape.pitch_decay, sample_rate),
            gate: shape.gated.then_some(trigger.length_samples),
            alive: true,
        }
    }

    fn next_sample(&mut self, sample_rate: f32, rng: &mut fastrand::Rng) -> f32 {
        self.pitch_env *= self.pitch_decay;
        let freq = self.freq + self.pitch_amount * self.pitch_env;

        let osc = match self.waveform {
            Waveform::Sine => (self.phase * std::f32::consts::TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        self.phase += freq / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let noise = rng.f32() * 2.0 - 1.0;
        let sample = (osc * (1.0 - self.noise) + noise * self.noise) * self.amp;

        match self.gate {
            Some(0) => self.amp *= self.release,
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        self.amp *= self.decay;
        if self.amp < SILENCE {
            self.alive = false;
        }
        sample
    }
}

/// Voices owned by the audio callback plus the triggers waiting to start.
pub struct VoicePool {
    voices: [SynthVoice; MAX_VOICES],
    pending: Vec<PendingTrigger>,
    /// Scratch for the triggers starting in the current block.
    due: Vec<PendingTrigger>,
    dropped: u64,
    rng: fastrand::Rng,
    sample_rate: f32,
}

impl VoicePool {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: [SynthVoice::EMPTY; MAX_VOICES],
            pending: Vec::with_capacity(MAX_PENDING),
            due: Vec::with_capacity(MAX_PENDING),
            dropped: 0,
            rng: fastrand::Rng::new(),
            sample_rate: sample_rate as f32,
        }
    }

    /// Queues a trigger. Returns false, and counts the drop, when
    /// `MAX_PENDING` triggers are already waiting.
    pub fn schedule(&mut self, trigger: PendingTrigger) -> bool {
        if self.pending.len() >= MAX_PENDING {
            self.dropped += 1;
            return false;
        }
        self.pending.push(trigger);
        true
    }

    /// Triggers refused by [`VoicePool::schedule`] since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn cancel_pending(&mut self) {
        self.pending.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.alive).count()
    }

    fn start_voice(&mut self, trigger: &PendingTrigger) {
        // Free slot, else steal the quietest voice.
        let slot = self.voices.iter().position(|v| !v.alive).unwrap_or_else(|| {
            self.voices
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.amp.total_cmp(&b.1.amp))
                .map(|(i, _)| i)
                .unwrap_or(0)
        });
        self.voices[slot] = SynthVoice::start(trigger, self.sample_rate);
    }

    /// Renders `frames` frames starting at absolute sample `block_start`
    /// into one interleaved stereo buffer per lane.
    ///
    /// Triggers are started on their exact frame; a trigger whose start has
    /// already passed starts on the first frame of the block.
    pub fn render(&mut self, block_start: u64, frames: usize, lane_bufs: &mut [Vec<f32>; NUM_TRACKS]) {
        let block_end = block_start + frames as u64;
        self.due.clear();
        if self.pending.iter().any(|t| t.start_sample < block_end) {
            self.due.extend(self.pending.iter().filter(|t| t.start_sample < block_end));
            self.pending.retain(|t| t.start_sample >= block_end);
            self.due.sort_unstable_by_key(|t| t.start_sample);
        }

        let mut next_due = 0;
        for i in 0..frames {
            let position = block_start + i as u64;
            while next_due < self.due.len() && self.due[next_due].start_sample <= position {
                let trigger = self.due[next_due];
                self.start_voice(&trigger);
                next_due += 1;
            }

            for voice in self.voices.iter_mut().filter(|v| v.alive) {
                let sample = voice.next_sample(self.sample_rate, &mut self.rng);
                let buf = &mut lane_bufs[voice.track.index()];
                buf[i * 2] += sample;
                buf[i * 2 + 1] += sample;
            }
        }
    }
}

/// Control-side voice that posts its triggers to the audio engine.
pub struct EngineVoice {
    track: TrackId,
    shape: ToneShape,
    handle: EngineHandle,
    disposed: bool,
}

impl Voice for EngineVoice {
    fn trigger_attack_release(&mut self, trigger: &Trigger) -> Result<(), VoiceError> {
        if self.disposed {
            return Err(VoiceError::Disposed);
        }
        let sample_rate = self.handle.sample_rate() as f64;
        let pending = PendingTrigger {
            track: self.track,
            shape: self.shape,
            freq: trigger.note.map(|n| n.frequency()).unwrap_or(self.shape.freq),
            velocity: trigger.velocity.value(),
            start_sample: (trigger.time.max(0.0) * sample_rate).round() as u64,
            length_samples: (trigger.duration.max(0.0) * sample_rate).round() as u64,
        };
        self.handle
            .send(EngineCommand::Trigger(pending))
            .map_err(|e| match e {
                TrySendError::Full(_) => VoiceError::QueueFull,
                TrySendError::Disconnected(_) => VoiceError::Disposed,
            })
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

pub struct EngineVoiceFactory {
    handle: EngineHandle,
}

impl EngineVoiceFactory {
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle }
    }
}

impl VoiceFactory for EngineVoiceFactory {
    fn create(&self, track: TrackId, shape: ToneShape) -> Box<dyn Voice> {
        Box::new(EngineVoice {
            track,
            shape,
            handle: self.handle.clone(),
            disposed: false,
        })
    }
}
