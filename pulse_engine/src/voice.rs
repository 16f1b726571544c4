use std::collections::HashSet;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use pulse_shared::{DrumKit, DrumLane, NoteName, TrackId, Velocity};

use crate::kits::{self, ToneShape};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    #[error("voice trigger queue is full")]
    QueueFull,
    #[error("voice has been disposed")]
    Disposed,
}

/// One note or hit, timed on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    /// Pitch for melodic voices; drum voices ignore it.
    pub note: Option<NoteName>,
    pub duration: f64,
    pub time: f64,
    pub velocity: Velocity,
}

/// A sound generator that plays triggers at absolute audio times.
pub trait Voice: Send {
    fn trigger_attack_release(&mut self, trigger: &Trigger) -> Result<(), VoiceError>;

    /// Releases the voice. Later triggers fail with [`VoiceError::Disposed`].
    fn dispose(&mut self);
}

pub trait VoiceFactory: Send {
    fn create(&self, track: TrackId, shape: ToneShape) -> Box<dyn Voice>;
}

/// The melody voice and one voice per drum lane.
pub struct VoiceBank {
    pub melody: Box<dyn Voice>,
    drums: Vec<Box<dyn Voice>>,
    kit: DrumKit,
}

impl VoiceBank {
    pub fn new(factory: &dyn VoiceFactory, kit: DrumKit) -> Self {
        Self {
            melody: factory.create(TrackId::Melody, ToneShape::melody()),
            drums: build_drums(factory, kit),
            kit,
        }
    }

    pub fn kit(&self) -> DrumKit {
        self.kit
    }

    pub fn drum(&mut self, lane: DrumLane) -> &mut dyn Voice {
        self.drums[lane.index()].as_mut()
    }

    /// Disposes the current drum voices and builds a set for `kit`.
    pub fn swap_kit(&mut self, factory: &dyn VoiceFactory, kit: DrumKit) {
        for voice in &mut self.drums {
            voice.dispose();
        }
        self.drums = build_drums(factory, kit);
        self.kit = kit;
        debug!(target: "pulse::voice", "drum kit switched to {}", kit.name());
    }

    pub fn dispose_all(&mut self) {
        self.melody.dispose();
        for voice in &mut self.drums {
            voice.dispose();
        }
    }
}

fn build_drums(factory: &dyn VoiceFactory, kit: DrumKit) -> Vec<Box<dyn Voice>> {
    DrumLane::ALL
        .iter()
        .map(|lane| factory.create(lane.track(), kits::drum_shape(kit, *lane)))
        .collect()
}

/// What a [`RecordingVoice`] observed.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Triggered(TrackId, Trigger),
    Disposed(TrackId),
}

/// Voice that reports every call over a channel instead of making sound.
pub struct RecordingVoice {
    track: TrackId,
    tx: Sender<VoiceEvent>,
    failing: bool,
    disposed: bool,
}

impl Voice for RecordingVoice {
    fn trigger_attack_release(&mut self, trigger: &Trigger) -> Result<(), VoiceError> {
        if self.disposed {
            return Err(VoiceError::Disposed);
        }
        if self.failing {
            return Err(VoiceError::QueueFull);
        }
        let _ = self.tx.send(VoiceEvent::Triggered(self.track, *trigger));
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            let _ = self.tx.send(VoiceEvent::Disposed(self.track));
        }
    }
}

/// Builds [`RecordingVoice`]s. Tracks listed in `failing` get voices that
/// reject every trigger.
pub struct RecordingVoiceFactory {
    tx: Sender<VoiceEvent>,
    failing: HashSet<TrackId>,
}

impl RecordingVoiceFactory {
    pub fn new() -> (Self, Receiver<VoiceEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                tx,
                failing: HashSet::new(),
            },
            rx,
        )
    }

    pub fn failing(mut self, track: TrackId) -> Self {
        self.failing.insert(track);
        self
    }
}

impl VoiceFactory for RecordingVoiceFactory {
    fn create(&self, track: TrackId, _shape: ToneShape) -> Box<dyn Voice> {
        Box::new(RecordingVoice {
            track,
            tx: self.tx.clone(),
            failing: self.failing.contains(&track),
            disposed: false,
        })
    }
}
