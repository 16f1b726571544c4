use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};
use pulse_shared::track::NUM_TRACKS;
use pulse_shared::{SequencerError, TrackControl, TrackId, TrackParam};

use crate::clock::{AudioClock, LaneSink};

/// Live parameters of a mixer lane that the audio engine ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneParam {
    Gain,
    Pan,
    ReverbSend,
    DelaySend,
}

impl LaneParam {
    pub const ALL: [LaneParam; 4] = [
        LaneParam::Gain,
        LaneParam::Pan,
        LaneParam::ReverbSend,
        LaneParam::DelaySend,
    ];

    pub fn index(&self) -> usize {
        match self {
            LaneParam::Gain => 0,
            LaneParam::Pan => 1,
            LaneParam::ReverbSend => 2,
            LaneParam::DelaySend => 3,
        }
    }
}

/// Linear move from `from` to `to` over `duration` seconds of audio time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    pub from: f32,
    pub to: f32,
    pub start: f64,
    pub duration: f64,
}

impl Ramp {
    pub fn hold(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start: 0.0,
            duration: 0.0,
        }
    }

    pub fn value_at(&self, time: f64) -> f32 {
        if self.duration <= 0.0 || time >= self.start + self.duration {
            return self.to;
        }
        if time <= self.start {
            return self.from;
        }
        let t = ((time - self.start) / self.duration) as f32;
        self.from + (self.to - self.from) * t
    }
}

/// Per-lane ramps as evaluated on the audio thread.
#[derive(Debug, Clone, Copy)]
pub struct LaneRamps {
    params: [Ramp; 4],
}

impl LaneRamps {
    pub fn new(control: &TrackControl) -> Self {
        let mut params = [Ramp::hold(0.0); 4];
        for param in LaneParam::ALL {
            params[param.index()] = Ramp::hold(target(control, param, false));
        }
        Self { params }
    }

    pub fn set(&mut self, param: LaneParam, ramp: Ramp) {
        self.params[param.index()] = ramp;
    }

    pub fn value_at(&self, param: LaneParam, time: f64) -> f32 {
        self.params[param.index()].value_at(time)
    }

    /// Mixes an interleaved stereo lane buffer into the master and send buses.
    ///
    /// Gain and pan are evaluated per frame so a ramp never steps. Sends
    /// are post-fader: a muted lane feeds nothing to the effect buses.
    pub fn mix_into(
        &self,
        lane_buf: &[f32],
        buses: &mut MixBuses<'_>,
        start_time: f64,
        frame_duration: f64,
        frames: usize,
    ) {
        for i in 0..frames {
            let time = start_time + i as f64 * frame_duration;
            let vol = self.value_at(LaneParam::Gain, time);
            let pan = self.value_at(LaneParam::Pan, time);

            let left = lane_buf[i * 2] * vol;
            let right = lane_buf[i * 2 + 1] * vol;

            let mut l_gain = 1.0;
            let mut r_gain = 1.0;
            if pan > 0.0 {
                l_gain -= pan;
            } else if pan < 0.0 {
                r_gain += pan;
            }

            buses.master[i * 2] += left * l_gain;
            buses.master[i * 2 + 1] += right * r_gain;

            let mono = (left + right) * 0.5;
            buses.reverb[i] += mono * self.value_at(LaneParam::ReverbSend, time);
            buses.delay[i] += mono * self.value_at(LaneParam::DelaySend, time);
        }
    }
}

/// Destination buffers for one audio block.
pub struct MixBuses<'a> {
    /// Interleaved stereo.
    pub master: &'a mut [f32],
    pub reverb: &'a mut [f32],
    pub delay: &'a mut [f32],
}

fn target(control: &TrackControl, param: LaneParam, silenced: bool) -> f32 {
    match param {
        LaneParam::Gain if silenced => 0.0,
        LaneParam::Gain => control.volume,
        LaneParam::Pan => control.pan,
        LaneParam::ReverbSend => control.reverb_send,
        LaneParam::DelaySend => control.delay_send,
    }
}

struct Lane {
    control: TrackControl,
    live: [Ramp; 4],
}

/// Owns the mixer settings of every lane and turns each change into
/// ramps for the audio engine.
///
/// Effective gain: a muted lane is silent; otherwise, while any lane is
/// soloed, every lane that is not soloed is silent; otherwise the lane
/// plays at its volume.
pub struct TrackMixer {
    lanes: [Lane; NUM_TRACKS],
    ramp_time: f64,
    clock: Arc<dyn AudioClock>,
    sink: Arc<dyn LaneSink>,
}

impl TrackMixer {
    pub fn new(clock: Arc<dyn AudioClock>, sink: Arc<dyn LaneSink>, ramp_time: f64) -> Self {
        let lanes = TrackId::ALL.map(|track| {
            let control = TrackControl::default_for(track);
            let mut live = [Ramp::hold(0.0); 4];
            for param in LaneParam::ALL {
                live[param.index()] = Ramp::hold(target(&control, param, false));
            }
            Lane { control, live }
        });
        let mixer = Self {
            lanes,
            ramp_time,
            clock,
            sink,
        };
        mixer.publish_all();
        mixer
    }

    /// Sends the current state of every lane to the sink as held values.
    pub fn publish_all(&self) {
        for track in TrackId::ALL {
            let lane = &self.lanes[track.index()];
            for param in LaneParam::ALL {
                self.sink.ramp(track, param, lane.live[param.index()]);
            }
        }
    }

    pub fn control(&self, track: TrackId) -> TrackControl {
        self.lanes[track.index()].control
    }

    pub fn any_solo(&self) -> bool {
        self.lanes.iter().any(|lane| lane.control.solo)
    }

    pub fn effective_gain(&self, track: TrackId) -> f32 {
        let control = &self.lanes[track.index()].control;
        target(control, LaneParam::Gain, self.is_silenced(control))
    }

    fn is_silenced(&self, control: &TrackControl) -> bool {
        control.muted || (self.any_solo() && !control.solo)
    }

    /// Applies `param` to the lane named `track_id`.
    pub fn update_track_control(&mut self, track_id: &str, param: TrackParam) -> Result<(), SequencerError> {
        let track = TrackId::from_str(track_id).map_err(|e| {
            warn!(target: "pulse::mixer", "ignoring {param:?} for unknown track `{track_id}`");
            e
        })?;
        self.update(track, param);
        Ok(())
    }

    pub fn update(&mut self, track: TrackId, param: TrackParam) {
        let lane = &mut self.lanes[track.index()];
        lane.control = lane.control.with(param);
        debug!(target: "pulse::mixer", "{track}: {param:?}");
        self.retarget();
    }

    /// Flips solo on `track` and returns the new state.
    pub fn toggle_solo(&mut self, track: TrackId) -> bool {
        let solo = !self.control(track).solo;
        self.update(track, TrackParam::Solo(solo));
        solo
    }

    pub fn toggle_mute(&mut self, track: TrackId) -> bool {
        let muted = !self.control(track).muted;
        self.update(track, TrackParam::Muted(muted));
        muted
    }

    /// Recomputes every lane's targets and ramps the ones that moved.
    fn retarget(&mut self) {
        let now = self.clock.now();
        let any_solo = self.any_solo();
        for track in TrackId::ALL {
            let lane = &mut self.lanes[track.index()];
            let silenced = lane.control.muted || (any_solo && !lane.control.solo);
            for param in LaneParam::ALL {
                let to = target(&lane.control, param, silenced);
                let live = &mut lane.live[param.index()];
                if live.to == to {
                    continue;
                }
                let ramp = Ramp {
                    from: live.value_at(now),
                    to,
                    start: now,
                    duration: self.ramp_time,
                };
                *live = ramp;
                self.sink.ramp(track, param, ramp);
            }
        }
    }

    pub fn value_at(&self, track: TrackId, param: LaneParam, time: f64) -> f32 {
        self.lanes[track.index()].live[param.index()].value_at(time)
    }

    pub fn gain_at(&self, track: TrackId, time: f64) -> f32 {
        self.value_at(track, LaneParam::Gain, time)
    }
}
