//! Streaming sample-rate conversion on [`AudioBuffer`].
//!
//! Output frame `k` of a stream sits at source position `k * from / to`.
//! The position is kept as an exact rational (output count and source
//! count as integers) so chunk boundaries never introduce drift.
//!
//! - Downsampling or equal rates (`to <= from`): nearest source frame,
//!   rounding half up.
//! - Upsampling (`to > from`): linear interpolation between the two
//!   bracketing source frames.
//!
//! An output frame is emitted only once every source frame it depends on
//! has arrived, so its value never depends on where a chunk ends. The last
//! source frame of each chunk is carried per channel for the interpolation
//! that straddles the boundary.

use crate::buffer::AudioBuffer;

#[derive(Debug, Clone, Default)]
pub(crate) struct ResampleState {
    from: u32,
    to: u32,
    emitted: u64,
    consumed: u64,
    carry: Vec<f32>,
    scratch: Vec<Vec<f32>>,
}

impl ResampleState {
    fn matches(&self, from: u32, to: u32, channels: usize) -> bool {
        self.from == from && self.to == to && self.carry.len() == channels
    }

    fn restart(&mut self, from: u32, to: u32, channels: usize) {
        self.from = from;
        self.to = to;
        self.emitted = 0;
        self.consumed = 0;
        self.carry.clear();
        self.carry.resize(channels, 0.0);
    }
}

impl AudioBuffer {
    /// Converts the buffer contents to `rate`, continuing the stream state
    /// left by the previous call.
    ///
    /// Equal rates are an exact identity. A rate of zero, or a buffer whose
    /// own rate is zero, only relabels the buffer.
    pub fn resample_to(&mut self, rate: u32) {
        let from = self.sample_rate();
        if rate == from {
            return;
        }
        if rate == 0 || from == 0 {
            self.set_sample_rate(rate);
            return;
        }

        let channels = self.channel_count();
        let mut state = std::mem::take(&mut self.resampler);
        if !state.matches(from, rate, channels) {
            #[cfg(feature = "tracing")]
            tracing::debug!("resampler restart: {from} Hz -> {rate} Hz, {channels} channels");
            state.restart(from, rate, channels);
        }

        let n = self.len() as u64;
        if n == 0 {
            self.set_sample_rate(rate);
            self.resampler = state;
            return;
        }
        let last = state.consumed + n - 1;
        let base = state.consumed;
        let (from_w, to_w) = (u128::from(from), u128::from(rate));
        let upsampling = rate > from;

        state.scratch.resize_with(channels, Vec::new);
        for out in &mut state.scratch {
            out.clear();
        }

        let mut k = state.emitted;
        loop {
            let num = u128::from(k) * from_w;
            let floor = (num / to_w) as u64;
            let rem = num % to_w;
            let needed = if upsampling {
                floor + u64::from(rem > 0)
            } else {
                ((2 * num + to_w) / (2 * to_w)) as u64
            };
            if needed > last {
                break;
            }
            for (ch, out) in state.scratch.iter_mut().enumerate() {
                let src = self.channel(ch);
                let at = |index: u64| -> f32 {
                    if index < base {
                        state.carry[ch]
                    } else {
                        src[(index - base) as usize]
                    }
                };
                let value = if !upsampling {
                    at(needed)
                } else if rem == 0 {
                    at(floor)
                } else {
                    let a = at(floor);
                    let b = at(floor + 1);
                    let frac = rem as f64 / to_w as f64;
                    (f64::from(a) + (f64::from(b) - f64::from(a)) * frac) as f32
                };
                out.push(value);
            }
            k += 1;
        }

        for (ch, carry) in state.carry.iter_mut().enumerate() {
            *carry = self.channel(ch)[self.len() - 1];
        }
        state.emitted = k;
        state.consumed = last + 1;

        let produced = state.scratch.first().map_or(0, Vec::len);
        self.resize(produced);
        for (ch, out) in state.scratch.iter().enumerate() {
            self.channel_mut(ch).copy_from_slice(out);
        }
        self.set_sample_rate(rate);
        self.resampler = state;
    }

    /// Forgets the streaming state so the next [`resample_to`] call starts a
    /// new stream.
    ///
    /// [`resample_to`]: AudioBuffer::resample_to
    pub fn reset_resampler(&mut self) {
        self.resampler = ResampleState::default();
    }
}
