//! Sample-rate adapter around another audio object.
//!
//! Reads pull from the inner object at its native rate, convert to the
//! engine rate and queue the result, so every read still returns at most
//! one buffer. Writes convert the other way before reaching the inner
//! object.

use rivulet_core::{AudioBuffer, AudioObject, ObjectError};

/// Presents `O` at the engine rate.
#[derive(Debug)]
pub struct Resampled<O> {
    inner: O,
    rate: u32,
    buffersize: usize,
    staging: AudioBuffer,
    pending: Vec<Vec<f32>>,
    position: u64,
}

impl<O: AudioObject> Resampled<O> {
    /// Wraps `inner`, converting to `rate` until the engine sets its own.
    pub fn new(inner: O, rate: u32) -> Self {
        let channels = inner.channels();
        Self {
            inner,
            rate,
            buffersize: 1024,
            staging: AudioBuffer::default(),
            pending: vec![Vec::new(); channels],
            position: 0,
        }
    }

    /// The wrapped object.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Unwraps the adapter.
    pub fn into_inner(self) -> O {
        self.inner
    }

    fn inner_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn to_inner_frames(&self, frames: u64) -> u64 {
        let rate = u64::from(self.rate.max(1));
        frames * u64::from(self.inner_rate()) / rate
    }

    fn pending_frames(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    fn clear_pending(&mut self) {
        for ch in &mut self.pending {
            ch.clear();
        }
        self.staging.reset_resampler();
    }
}

impl<O: AudioObject> AudioObject for Resampled<O> {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn channels(&self) -> usize {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn set_buffersize(&mut self, frames: usize, sample_rate: u32) {
        if sample_rate != self.rate {
            self.rate = sample_rate;
            self.clear_pending();
        }
        self.buffersize = frames;
        let inner_frames = (self.to_inner_frames(frames as u64) as usize).max(1);
        self.inner.set_buffersize(inner_frames, self.inner_rate());
    }

    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        while self.pending_frames() < self.buffersize && !self.inner.finished() {
            let read = self.inner.read_buffer(&mut self.staging)?;
            if read == 0 {
                break;
            }
            self.staging.resample_to(self.rate);
            self.pending.resize_with(self.staging.channel_count(), Vec::new);
            for (queue, ch) in self.pending.iter_mut().zip(self.staging.channels()) {
                queue.extend_from_slice(ch);
            }
        }

        let n = self.pending_frames().min(self.buffersize);
        buffer.set_channel_count(self.pending.len());
        buffer.set_sample_rate(self.rate);
        buffer.resize(n);
        for (dst, queue) in buffer.channels_mut().zip(&mut self.pending) {
            dst.copy_from_slice(&queue[..n]);
            queue.drain(..n);
        }
        self.position += n as u64;
        Ok(n)
    }

    fn write_buffer(&mut self, buffer: &AudioBuffer) -> Result<(), ObjectError> {
        self.staging.assign(buffer);
        self.staging.set_sample_rate(self.rate);
        self.staging.resample_to(self.inner_rate());
        self.inner.write_buffer(&self.staging)?;
        self.position += buffer.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        let inner_rate = u64::from(self.inner_rate().max(1));
        self.inner
            .length()
            .map(|frames| frames * u64::from(self.rate) / inner_rate)
    }

    fn finished(&self) -> bool {
        self.inner.finished() && self.pending_frames() == 0
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        self.inner.seek(self.to_inner_frames(frame))?;
        self.clear_pending();
        self.position = frame;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ObjectError> {
        self.inner.flush()
    }

    fn is_realtime(&self) -> bool {
        self.inner.is_realtime()
    }

    fn prepare(&mut self) -> Result<(), ObjectError> {
        self.inner.prepare()
    }

    fn start(&mut self) -> Result<(), ObjectError> {
        self.inner.start()
    }

    fn stop(&mut self) -> Result<(), ObjectError> {
        self.inner.stop()
    }
}
