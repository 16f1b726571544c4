//! Tone shapes for the melody voice and each drum kit.
use pulse_shared::{DrumKit, DrumLane};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

/// Parameters of one synthesized voice: an oscillator blended with noise,
/// with a falling pitch envelope and an exponential amplitude decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneShape {
    pub waveform: Waveform,
    /// Base frequency in Hz. Melodic voices replace it with the note's pitch.
    pub freq: f32,
    /// 0.0 = pure oscillator, 1.0 = pure noise.
    pub noise: f32,
    /// Seconds until the amplitude has fallen by 60 dB.
    pub decay: f32,
    /// Extra Hz at the attack, falling off over `pitch_decay` seconds.
    pub pitch_amount: f32,
    pub pitch_decay: f32,
    /// Melodic voices release at the end of the note instead of ringing out.
    pub gated: bool,
}

impl ToneShape {
    pub fn melody() -> Self {
        Self {
            waveform: Waveform::Triangle,
            freq: 440.0,
            noise: 0.0,
            decay: 1.2,
            pitch_amount: 0.0,
            pitch_decay: 0.01,
            gated: true,
        }
    }

    const fn drum(freq: f32, noise: f32, decay: f32, pitch_amount: f32, pitch_decay: f32) -> Self {
        Self {
            waveform: Waveform::Sine,
            freq,
            noise,
            decay,
            pitch_amount,
            pitch_decay,
            gated: false,
        }
    }

    const fn with_waveform(self, waveform: Waveform) -> Self {
        Self { waveform, ..self }
    }
}

/// The voice shape `kit` uses for `lane`.
pub fn drum_shape(kit: DrumKit, lane: DrumLane) -> ToneShape {
    match (kit, lane) {
        // Long sub boom, hissy snare.
        (DrumKit::Tr808, DrumLane::Kick) => ToneShape::drum(50.0, 0.02, 0.9, 160.0, 0.05),
        (DrumKit::Tr808, DrumLane::Snare) => ToneShape::drum(190.0, 0.65, 0.25, 60.0, 0.03),
        (DrumKit::Tr808, DrumLane::Hihat) => ToneShape::drum(6000.0, 0.95, 0.06, 0.0, 0.01),
        (DrumKit::Tr808, DrumLane::Openhat) => ToneShape::drum(6000.0, 0.95, 0.4, 0.0, 0.01),

        // Punchier and shorter.
        (DrumKit::Tr909, DrumLane::Kick) => ToneShape::drum(60.0, 0.05, 0.45, 220.0, 0.03),
        (DrumKit::Tr909, DrumLane::Snare) => ToneShape::drum(220.0, 0.75, 0.2, 90.0, 0.02),
        (DrumKit::Tr909, DrumLane::Hihat) => {
            ToneShape::drum(8000.0, 0.9, 0.05, 0.0, 0.01).with_waveform(Waveform::Square)
        }
        (DrumKit::Tr909, DrumLane::Openhat) => {
            ToneShape::drum(8000.0, 0.9, 0.3, 0.0, 0.01).with_waveform(Waveform::Square)
        }

        (DrumKit::Acoustic, DrumLane::Kick) => ToneShape::drum(70.0, 0.15, 0.35, 80.0, 0.02),
        (DrumKit::Acoustic, DrumLane::Snare) => ToneShape::drum(180.0, 0.6, 0.3, 30.0, 0.02),
        (DrumKit::Acoustic, DrumLane::Hihat) => ToneShape::drum(5000.0, 0.85, 0.08, 0.0, 0.01),
        (DrumKit::Acoustic, DrumLane::Openhat) => ToneShape::drum(5000.0, 0.85, 0.6, 0.0, 0.01),

        (DrumKit::Electronic, DrumLane::Kick) => {
            ToneShape::drum(45.0, 0.0, 0.7, 300.0, 0.04).with_waveform(Waveform::Triangle)
        }
        (DrumKit::Electronic, DrumLane::Snare) => {
            ToneShape::drum(240.0, 0.5, 0.18, 120.0, 0.02).with_waveform(Waveform::Square)
        }
        (DrumKit::Electronic, DrumLane::Hihat) => ToneShape::drum(9000.0, 1.0, 0.04, 0.0, 0.01),
        (DrumKit::Electronic, DrumLane::Openhat) => ToneShape::drum(9000.0, 1.0, 0.25, 0.0, 0.01),
    }
}
