use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{error, info, warn};
use pulse_shared::track::NUM_TRACKS;
use pulse_shared::{SequencerError, TrackControl, TrackId};

use crate::clock::{AudioClock, AudioOutput, LaneSink};
use crate::commands::EngineCommand;
use crate::delay::{CombReverb, DelayLine};
use crate::mixer::{LaneParam, LaneRamps, MixBuses, Ramp};
use crate::synth::VoicePool;

/// Capacity of the control -> audio command queue.
pub const COMMAND_QUEUE: usize = 1024;

const ECHO_SECONDS: f32 = 0.375;
const ECHO_FEEDBACK: f32 = 0.35;
const REVERB_DECAY: f32 = 0.6;

/// Cloneable, thread-safe view of a running [`AudioEngine`].
///
/// The audio clock is the number of frames the callback has rendered,
/// divided by the sample rate.
#[derive(Clone)]
pub struct EngineHandle {
    sample_position: Arc<AtomicU64>,
    dropped_triggers: Arc<AtomicU64>,
    sample_rate: u32,
    command_tx: Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_position(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    /// Triggers the callback refused because its pending queue was full.
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers.load(Ordering::Relaxed)
    }

    pub fn send(&self, command: EngineCommand) -> Result<(), TrySendError<EngineCommand>> {
        self.command_tx.try_send(command)
    }
}

impl AudioClock for EngineHandle {
    fn now(&self) -> f64 {
        self.sample_position() as f64 / self.sample_rate as f64
    }
}

impl LaneSink for EngineHandle {
    fn ramp(&self, track: TrackId, param: LaneParam, ramp: Ramp) {
        if let Err(e) = self.send(EngineCommand::RampLane { track, param, ramp }) {
            warn!(target: "pulse::engine", "dropping {param:?} ramp for {track}: {e}");
        }
    }
}

/// State owned by the audio callback.
struct Renderer {
    command_rx: Receiver<EngineCommand>,
    pos_counter: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    sample_rate: u32,
    channels: usize,
    pool: VoicePool,
    lanes: [LaneRamps; NUM_TRACKS],
    lane_bufs: [Vec<f32>; NUM_TRACKS],
    master_mix: Vec<f32>,
    reverb_bus: Vec<f32>,
    delay_bus: Vec<f32>,
    reverb: CombReverb,
    echo: DelayLine,
}

impl Renderer {
    fn new(
        command_rx: Receiver<EngineCommand>,
        pos_counter: Arc<AtomicU64>,
        dropped: Arc<AtomicU64>,
        sample_rate: u32,
        channels: usize,
    ) -> Self {
        let echo_samples = (ECHO_SECONDS * sample_rate as f32) as usize;
        Self {
            command_rx,
            pos_counter,
            dropped,
            sample_rate,
            channels,
            pool: VoicePool::new(sample_rate),
            lanes: TrackId::ALL.map(|track| LaneRamps::new(&TrackControl::default_for(track))),
            lane_bufs: std::array::from_fn(|_| Vec::new()),
            master_mix: Vec::new(),
            reverb_bus: Vec::new(),
            delay_bus: Vec::new(),
            reverb: CombReverb::new(sample_rate, REVERB_DECAY),
            echo: DelayLine::new(echo_samples + 1),
        }
    }

    fn handle_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            match cmd {
                EngineCommand::Trigger(trigger) => {
                    if !self.pool.schedule(trigger) {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                EngineCommand::CancelPending => self.pool.cancel_pending(),
                EngineCommand::RampLane { track, param, ramp } => {
                    self.lanes[track.index()].set(param, ramp);
                }
            }
        }
    }

    /// Buffers keep their capacity between callbacks; only a larger block
    /// than any seen before grows them.
    fn prepare(&mut self, frames: usize) {
        for buf in self.lane_bufs.iter_mut().chain(std::iter::once(&mut self.master_mix)) {
            buf.resize(frames * 2, 0.0);
            buf.fill(0.0);
        }
        for bus in [&mut self.reverb_bus, &mut self.delay_bus] {
            bus.resize(frames, 0.0);
            bus.fill(0.0);
        }
    }

    fn process(&mut self, data: &mut [f32]) {
        self.handle_commands();

        let frames = data.len() / self.channels;
        self.prepare(frames);

        let block_start = self.pos_counter.load(Ordering::Acquire);
        self.pool.render(block_start, frames, &mut self.lane_bufs);

        let start_time = block_start as f64 / self.sample_rate as f64;
        let frame_duration = 1.0 / self.sample_rate as f64;
        {
            let mut buses = MixBuses {
                master: &mut self.master_mix,
                reverb: &mut self.reverb_bus,
                delay: &mut self.delay_bus,
            };
            for (lane, buf) in self.lanes.iter().zip(self.lane_bufs.iter()) {
                lane.mix_into(buf, &mut buses, start_time, frame_duration, frames);
            }
        }

        self.reverb.process(&mut self.reverb_bus);
        let echo_samples = (ECHO_SECONDS * self.sample_rate as f32) as u32;
        self.echo.process_echo(&mut self.delay_bus, echo_samples, ECHO_FEEDBACK);

        for i in 0..frames {
            let wet = self.reverb_bus[i] + self.delay_bus[i];
            let left = self.master_mix[i * 2] + wet;
            let right = self.master_mix[i * 2 + 1] + wet;

            let frame = &mut data[i * self.channels..(i + 1) * self.channels];
            match frame {
                [mono] => *mono = (left + right) * 0.5,
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }

        self.pos_counter.fetch_add(frames as u64, Ordering::Release);
    }
}

/// cpal output stream rendering the sequencer's voices.
///
/// The stream is built paused; [`AudioOutput::resume`] starts it.
pub struct AudioEngine {
    stream: cpal::Stream,
    handle: EngineHandle,
}

impl AudioEngine {
    pub fn new() -> Result<Self, anyhow::Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(anyhow::anyhow!("No output device available"))?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();
        info!(target: "pulse::engine", "output config: {stream_config:?}");

        let (command_tx, command_rx) = bounded(COMMAND_QUEUE);
        let pos_counter = Arc::new(AtomicU64::new(0));
        let dropped_triggers = Arc::new(AtomicU64::new(0));
        let mut renderer = Renderer::new(
            command_rx,
            pos_counter.clone(),
            dropped_triggers.clone(),
            sample_rate,
            channels,
        );

        let err_fn = |err: cpal::StreamError| {
            let s = err.to_string();
            // Under/overruns are routine on busy hosts.
            if !s.contains("underrun") && !s.contains("overrun") {
                error!(target: "pulse::engine", "stream error: {s}");
            }
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| renderer.process(data),
                err_fn,
                None,
            )?,
            other => return Err(anyhow::anyhow!("Unsupported sample format {other:?}")),
        };
        // Some hosts start streams on creation; hold it until resume().
        if let Err(e) = stream.pause() {
            warn!(target: "pulse::engine", "could not pause new stream: {e}");
        }

        Ok(Self {
            stream,
            handle: EngineHandle {
                sample_position: pos_counter,
                dropped_triggers,
                sample_rate,
                command_tx,
            },
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.handle.sample_rate
    }
}

impl AudioOutput for AudioEngine {
    fn clock(&self) -> Arc<dyn AudioClock> {
        Arc::new(self.handle.clone())
    }

    fn resume(&mut self) -> Result<(), SequencerError> {
        self.stream
            .play()
            .map_err(|e| SequencerError::AudioUnavailable(e.to_string()))
    }

    fn cancel_pending(&self) {
        if let Err(e) = self.handle.send(EngineCommand::CancelPending) {
            warn!(target: "pulse::engine", "cancel not delivered: {e}");
        }
    }

    fn lane_sink(&self) -> Arc<dyn LaneSink> {
        Arc::new(self.handle.clone())
    }

    fn dropped_triggers(&self) -> u64 {
        self.handle.dropped_triggers()
    }
}
