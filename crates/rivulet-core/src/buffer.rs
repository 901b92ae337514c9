//! Multi-channel sample block used by chains, engine scratch space and
//! audio objects.
//!
//! An [`AudioBuffer`] stores one `Vec<f32>` per channel, all sized to the
//! same reserved capacity. The logical length is the number of valid frames
//! and never exceeds that capacity; growing past it reallocates every
//! channel. Samples exposed by growing the length are always zero, which is
//! what lets [`add`](AudioBuffer::add) extend a shorter accumulator and sum
//! onto silence.
//!
//! The mixing operations ([`copy`](AudioBuffer::copy),
//! [`add`](AudioBuffer::add), [`add_weighted`](AudioBuffer::add_weighted))
//! touch only the overlap of the two operands: `min` of the channel counts
//! and the other buffer's length. They extend `self` to the other length
//! when it is longer and never shrink it. [`assign`](AudioBuffer::assign) is
//! the exact-replica counterpart used when a buffer must mirror another one.

use crate::resample::ResampleState;

/// A block of non-interleaved `f32` audio with explicit length and rate.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    data: Vec<Vec<f32>>,
    reserved: usize,
    length: usize,
    sample_rate: u32,
    pub(crate) resampler: ResampleState,
}

impl AudioBuffer {
    /// Creates a silent buffer of `length` frames.
    pub fn new(channels: usize, length: usize, sample_rate: u32) -> Self {
        let mut buffer = Self::with_capacity(channels, length, sample_rate);
        buffer.length = length;
        buffer
    }

    /// Creates an empty buffer with room for `capacity` frames per channel.
    pub fn with_capacity(channels: usize, capacity: usize, sample_rate: u32) -> Self {
        Self {
            data: (0..channels).map(|_| vec![0.0; capacity]).collect(),
            reserved: capacity,
            length: 0,
            sample_rate,
            resampler: ResampleState::default(),
        }
    }

    /// Builds a buffer from per-channel sample vectors.
    ///
    /// Shorter channels are zero-padded to the longest one.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let length = channels.iter().map(Vec::len).max().unwrap_or(0);
        let data = channels
            .into_iter()
            .map(|mut ch| {
                ch.resize(length, 0.0);
                ch
            })
            .collect();
        Self {
            data,
            reserved: length,
            length,
            sample_rate,
            resampler: ResampleState::default(),
        }
    }

    /// Number of valid frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true when the buffer holds no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Frames that fit without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.reserved
    }

    /// Number of channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Relabels the sample rate without touching the samples.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Valid samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= channel_count()`.
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.data[index][..self.length]
    }

    /// Mutable valid samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= channel_count()`.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.data[index][..self.length]
    }

    /// Iterates over the valid samples of every channel.
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.iter().map(|ch| &ch[..self.length])
    }

    /// Iterates mutably over the valid samples of every channel.
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> + '_ {
        let length = self.length;
        self.data.iter_mut().map(move |ch| &mut ch[..length])
    }

    /// Grows the reserved capacity to at least `capacity` frames.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.reserved {
            for ch in &mut self.data {
                ch.resize(capacity, 0.0);
            }
            self.reserved = capacity;
        }
    }

    /// Sets the logical length. Frames exposed by growing are zeroed.
    pub fn resize(&mut self, length: usize) {
        if length > self.reserved {
            self.reserve(length);
        }
        if length > self.length {
            let old = self.length;
            for ch in &mut self.data {
                ch[old..length].fill(0.0);
            }
        }
        self.length = length;
    }

    /// Changes the channel count. New channels start silent.
    pub fn set_channel_count(&mut self, channels: usize) {
        let reserved = self.reserved;
        self.data.resize_with(channels, || vec![0.0; reserved]);
    }

    /// Zeroes every valid sample.
    pub fn make_silent(&mut self) {
        for ch in self.channels_mut() {
            ch.fill(0.0);
        }
    }

    /// Returns true when every valid sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.channels().all(|ch| ch.iter().all(|&s| s == 0.0))
    }

    fn extend_to(&mut self, length: usize) {
        if length > self.length {
            self.resize(length);
        }
    }

    /// Copies the overlapping region of `other` into `self`.
    ///
    /// Channels beyond the overlap and frames past `other.len()` keep their
    /// previous contents.
    pub fn copy(&mut self, other: &AudioBuffer) {
        self.extend_to(other.length);
        let n = other.length;
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            dst[..n].copy_from_slice(&src[..n]);
        }
    }

    /// Sums the overlapping region of `other` into `self`.
    pub fn add(&mut self, other: &AudioBuffer) {
        self.extend_to(other.length);
        let n = other.length;
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
                *d += *s;
            }
        }
    }

    /// Sums `other / weight` into `self`.
    ///
    /// Accumulating `w` chains with weight `w` averages them in one pass.
    /// A weight of zero is treated as one.
    pub fn add_weighted(&mut self, other: &AudioBuffer, weight: usize) {
        if weight <= 1 {
            self.add(other);
            return;
        }
        let w = weight as f32;
        self.extend_to(other.length);
        let n = other.length;
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
                *d += *s / w;
            }
        }
    }

    /// Makes `self` an exact replica of `other`: channels, length, rate and
    /// samples. Capacity is kept if it is already large enough.
    pub fn assign(&mut self, other: &AudioBuffer) {
        self.set_channel_count(other.channel_count());
        self.sample_rate = other.sample_rate;
        self.length = 0;
        self.resize(other.length);
        let n = other.length;
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            dst[..n].copy_from_slice(&src[..n]);
        }
    }

    /// Divides every valid sample by `divisor`. Zero is ignored.
    pub fn divide_by(&mut self, divisor: f32) {
        if divisor == 0.0 {
            return;
        }
        for ch in self.channels_mut() {
            for s in ch {
                *s /= divisor;
            }
        }
    }

    /// Clamps every valid sample to `[-1.0, 1.0]`.
    pub fn limit_values(&mut self) {
        for ch in self.channels_mut() {
            for s in ch {
                *s = s.clamp(-1.0, 1.0);
            }
        }
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels()
            .flat_map(|ch| ch.iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

impl PartialEq for AudioBuffer {
    /// Compares the logical content only: rate, shape and valid samples.
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate
            && self.length == other.length
            && self.channel_count() == other.channel_count()
            && self.channels().zip(other.channels()).all(|(a, b)| a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(channels: usize, len: usize) -> AudioBuffer {
        let data = (0..channels)
            .map(|c| (0..len).map(|i| (c * 100 + i) as f32 * 0.001).collect())
            .collect();
        AudioBuffer::from_channels(data, 48_000)
    }

    // --- shape ---

    #[test]
    fn new_buffer_is_silent_with_requested_shape() {
        let buf = AudioBuffer::new(2, 64, 44_100);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.len(), 64);
        assert_eq!(buf.capacity(), 64);
        assert_eq!(buf.sample_rate(), 44_100);
        assert!(buf.is_silent());
    }

    #[test]
    fn resize_within_capacity_keeps_allocation() {
        let mut buf = AudioBuffer::with_capacity(1, 128, 48_000);
        buf.resize(100);
        buf.resize(20);
        assert_eq!(buf.len(), 20);
        assert_eq!(buf.capacity(), 128);
    }

    #[test]
    fn resize_past_capacity_reallocates() {
        let mut buf = AudioBuffer::new(2, 8, 48_000);
        buf.resize(32);
        assert_eq!(buf.len(), 32);
        assert!(buf.capacity() >= 32);
        assert_eq!(buf.channel(1).len(), 32);
    }

    #[test]
    fn growing_length_zeroes_stale_samples() {
        let mut buf = AudioBuffer::new(1, 4, 48_000);
        buf.channel_mut(0).fill(0.7);
        buf.resize(1);
        buf.resize(4);
        assert_eq!(buf.channel(0), &[0.7, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn set_channel_count_adds_silent_channels() {
        let mut buf = ramp(1, 4);
        buf.set_channel_count(3);
        assert_eq!(buf.channel_count(), 3);
        assert!(buf.channel(2).iter().all(|&s| s == 0.0));
        buf.set_channel_count(1);
        assert_eq!(buf.channel_count(), 1);
    }

    #[test]
    fn make_silent_clears_valid_region() {
        let mut buf = ramp(2, 16);
        buf.make_silent();
        assert!(buf.is_silent());
        assert_eq!(buf.len(), 16);
    }

    // --- mixing ---

    #[test]
    fn add_extends_shorter_accumulator() {
        let mut acc = AudioBuffer::new(2, 2, 48_000);
        acc.channel_mut(0).copy_from_slice(&[1.0, 1.0]);
        let other = AudioBuffer::from_channels(vec![vec![0.5; 4], vec![0.25; 4]], 48_000);
        acc.add(&other);
        assert_eq!(acc.len(), 4);
        assert_eq!(acc.channel(0), &[1.5, 1.5, 0.5, 0.5]);
        assert_eq!(acc.channel(1), &[0.25; 4]);
    }

    #[test]
    fn add_never_shrinks() {
        let mut acc = AudioBuffer::new(1, 8, 48_000);
        let other = AudioBuffer::from_channels(vec![vec![1.0; 3]], 48_000);
        acc.add(&other);
        assert_eq!(acc.len(), 8);
        assert_eq!(&acc.channel(0)[..4], &[1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn mixing_touches_only_overlapping_channels() {
        let mut acc = AudioBuffer::from_channels(vec![vec![0.0; 2]; 3], 48_000);
        acc.channel_mut(2).fill(9.0);
        let other = AudioBuffer::from_channels(vec![vec![1.0; 2]], 48_000);
        acc.copy(&other);
        assert_eq!(acc.channel(0), &[1.0, 1.0]);
        assert_eq!(acc.channel(1), &[0.0, 0.0]);
        assert_eq!(acc.channel(2), &[9.0, 9.0]);
    }

    #[test]
    fn add_weighted_averages_contributors() {
        let a = AudioBuffer::from_channels(vec![vec![0.8, -0.4]], 48_000);
        let b = AudioBuffer::from_channels(vec![vec![0.2, 0.4]], 48_000);
        let mut acc = AudioBuffer::with_capacity(1, 2, 48_000);
        acc.add_weighted(&a, 2);
        acc.add_weighted(&b, 2);
        assert!((acc.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!(acc.channel(0)[1].abs() < 1e-6);
    }

    #[test]
    fn add_weighted_zero_weight_is_plain_add() {
        let other = AudioBuffer::from_channels(vec![vec![0.3; 4]], 48_000);
        let mut a = AudioBuffer::new(1, 4, 48_000);
        let mut b = AudioBuffer::new(1, 4, 48_000);
        a.add_weighted(&other, 0);
        b.add(&other);
        assert_eq!(a, b);
    }

    #[test]
    fn assign_replicates_shape_and_rate() {
        let src = ramp(3, 5);
        let mut dst = AudioBuffer::new(1, 64, 8_000);
        dst.channel_mut(0).fill(1.0);
        dst.assign(&src);
        assert_eq!(dst, src);
        assert_eq!(dst.capacity(), 64);
    }

    #[test]
    fn divide_and_limit() {
        let mut buf = AudioBuffer::from_channels(vec![vec![4.0, -3.0, 0.5]], 48_000);
        buf.divide_by(2.0);
        assert_eq!(buf.channel(0), &[2.0, -1.5, 0.25]);
        buf.divide_by(0.0);
        assert_eq!(buf.channel(0), &[2.0, -1.5, 0.25]);
        buf.limit_values();
        assert_eq!(buf.channel(0), &[1.0, -1.0, 0.25]);
        assert_eq!(buf.peak(), 1.0);
    }

    #[test]
    fn equality_ignores_capacity_and_stale_tail() {
        let mut a = AudioBuffer::new(1, 16, 48_000);
        a.channel_mut(0).fill(0.5);
        a.resize(2);
        let b = AudioBuffer::from_channels(vec![vec![0.5, 0.5]], 48_000);
        assert_eq!(a, b);
    }
}
