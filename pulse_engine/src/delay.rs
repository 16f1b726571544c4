/// Circular sample buffer used by the delay send bus.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples.max(2)],
            write_pos: 0,
        }
    }

    /// Feedback echo: each output sample is the line `delay_samples` back,
    /// and that sample is fed back in scaled by `feedback`. Output is wet only.
    pub fn process_echo(&mut self, buffer: &mut [f32], delay_samples: u32, feedback: f32) {
        let buffer_len = self.buffer.len();
        let delay = (delay_samples as usize).clamp(1, buffer_len - 1);
        let feedback = feedback.clamp(0.0, 0.95);

        for sample in buffer.iter_mut() {
            let read_pos = (self.write_pos + buffer_len - delay) % buffer_len;
            let delayed = self.buffer[read_pos];
            self.buffer[self.write_pos] = *sample + delayed * feedback;
            *sample = delayed;

            self.write_pos = (self.write_pos + 1) % buffer_len;
        }
    }
}

/// Four parallel feedback combs with mutually prime lengths.
pub struct CombReverb {
    lines: [DelayLine; 4],
    lengths: [u32; 4],
    decay: f32,
}

impl CombReverb {
    const LENGTHS_44K: [u32; 4] = [1557, 1617, 1491, 1422];

    pub fn new(sample_rate: u32, decay: f32) -> Self {
        let lengths = Self::LENGTHS_44K.map(|len| (len as u64 * sample_rate as u64 / 44_100).max(1) as u32);
        Self {
            lines: lengths.map(|len| DelayLine::new(len as usize + 1)),
            lengths,
            decay: decay.clamp(0.1, 0.95),
        }
    }

    /// Wet-only reverb of `buffer`, in place.
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let dry = *sample;
            let mut wet = 0.0;
            for (line, len) in self.lines.iter_mut().zip(self.lengths) {
                let mut s = [dry];
                line.process_echo(&mut s, len, self.decay);
                wet += s[0] * 0.25;
            }
            *sample = wet;
        }
    }
}
