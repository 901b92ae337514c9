//! In-memory sources and sinks.
//!
//! [`MemorySink`] hands out a [`SinkTap`] that shares the written samples,
//! so a caller can give the sink to an engine and still inspect the result
//! afterwards. Both memory objects can inject an I/O failure at a chosen
//! frame.

use std::sync::{Arc, Mutex, PoisonError};

use rivulet_core::{AudioBuffer, AudioObject, ObjectError};

use crate::{frames_left, injected};

/// Plays back a buffer held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    data: AudioBuffer,
    position: u64,
    buffersize: usize,
    read_error_at: Option<u64>,
    failed: bool,
}

impl MemorySource {
    /// Wraps `data`; its channel count and rate are the object's.
    pub fn new(label: impl Into<String>, data: AudioBuffer) -> Self {
        Self {
            label: label.into(),
            data,
            position: 0,
            buffersize: 1024,
            read_error_at: None,
            failed: false,
        }
    }

    /// Builds the source from per-channel sample vectors.
    pub fn from_channels(label: impl Into<String>, channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self::new(label, AudioBuffer::from_channels(channels, sample_rate))
    }

    /// `frames` frames of silence.
    pub fn silence(label: impl Into<String>, channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self::new(label, AudioBuffer::new(channels, frames, sample_rate))
    }

    /// Fails the read that would cover `frame`.
    pub fn with_read_error_at(mut self, frame: u64) -> Self {
        self.read_error_at = Some(frame);
        self
    }

    /// The complete contents.
    pub fn data(&self) -> &AudioBuffer {
        &self.data
    }
}

impl AudioObject for MemorySource {
    fn label(&self) -> &str {
        &self.label
    }

    fn channels(&self) -> usize {
        self.data.channel_count()
    }

    fn sample_rate(&self) -> u32 {
        self.data.sample_rate()
    }

    fn set_buffersize(&mut self, frames: usize, _sample_rate: u32) {
        self.buffersize = frames;
    }

    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        let n = frames_left(self.buffersize, self.position, self.data.len() as u64);
        if let Some(at) = self.read_error_at
            && n > 0
            && self.position + n as u64 > at
        {
            self.failed = true;
            return Err(injected(&self.label, "read", at));
        }

        buffer.set_channel_count(self.data.channel_count());
        buffer.set_sample_rate(self.data.sample_rate());
        buffer.resize(n);
        let start = self.position as usize;
        for (dst, src) in buffer.channels_mut().zip(self.data.channels()) {
            dst.copy_from_slice(&src[start..start + n]);
        }
        self.position += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn finished(&self) -> bool {
        self.failed || self.position >= self.data.len() as u64
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        self.position = frame.min(self.data.len() as u64);
        Ok(())
    }
}

/// Shared view of what a [`MemorySink`] has written.
#[derive(Debug, Clone)]
pub struct SinkTap {
    written: Arc<Mutex<AudioBuffer>>,
}

impl SinkTap {
    /// Snapshot of the written samples.
    pub fn buffer(&self) -> AudioBuffer {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of frames covered by writes so far.
    pub fn frames(&self) -> usize {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// One channel of the written samples.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        self.buffer().channel(index).to_vec()
    }
}

/// Records writes into a growable buffer.
///
/// Writes overwrite at the current position; seeking past the end leaves a
/// gap of silence once the next write lands.
#[derive(Debug)]
pub struct MemorySink {
    label: String,
    channels: usize,
    sample_rate: u32,
    written: Arc<Mutex<AudioBuffer>>,
    position: u64,
    write_error_at: Option<u64>,
    flush_error: bool,
    failed: bool,
}

impl MemorySink {
    /// Creates the sink and the tap that observes it.
    pub fn new(label: impl Into<String>, channels: usize, sample_rate: u32) -> (Self, SinkTap) {
        let written = Arc::new(Mutex::new(AudioBuffer::new(channels, 0, sample_rate)));
        let tap = SinkTap {
            written: Arc::clone(&written),
        };
        let sink = Self {
            label: label.into(),
            channels,
            sample_rate,
            written,
            position: 0,
            write_error_at: None,
            flush_error: false,
            failed: false,
        };
        (sink, tap)
    }

    /// Fails the write that would cover `frame`; the sink then stays failed.
    pub fn with_write_error_at(mut self, frame: u64) -> Self {
        self.write_error_at = Some(frame);
        self
    }

    /// Fails every flush, as a full disk would when the header is rewritten.
    pub fn with_flush_error(mut self) -> Self {
        self.flush_error = true;
        self
    }
}

impl AudioObject for MemorySink {
    fn label(&self) -> &str {
        &self.label
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_buffersize(&mut self, _frames: usize, _sample_rate: u32) {}

    fn write_buffer(&mut self, buffer: &AudioBuffer) -> Result<(), ObjectError> {
        if self.failed {
            return Err(injected(&self.label, "write", self.position));
        }
        let n = buffer.len();
        if let Some(at) = self.write_error_at
            && n > 0
            && self.position + n as u64 > at
        {
            self.failed = true;
            return Err(injected(&self.label, "write", at));
        }

        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        let start = self.position as usize;
        if start + n > written.len() {
            written.resize(start + n);
        }
        for index in 0..self.channels.min(buffer.channel_count()) {
            written.channel_mut(index)[start..start + n].copy_from_slice(buffer.channel(index));
        }
        self.position += n as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        Some(
            self.written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len() as u64,
        )
    }

    fn finished(&self) -> bool {
        self.failed
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        self.position = frame;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ObjectError> {
        if self.flush_error {
            return Err(injected(&self.label, "flush", self.position));
        }
        Ok(())
    }
}

/// Discards everything written to it.
#[derive(Debug, Clone)]
pub struct NullSink {
    label: String,
    channels: usize,
    sample_rate: u32,
    position: u64,
}

impl NullSink {
    /// Creates a sink accepting `channels` channels at `sample_rate`.
    pub fn new(label: impl Into<String>, channels: usize, sample_rate: u32) -> Self {
        Self {
            label: label.into(),
            channels,
            sample_rate,
            position: 0,
        }
    }
}

impl AudioObject for NullSink {
    fn label(&self) -> &str {
        &self.label
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_buffersize(&mut self, _frames: usize, _sample_rate: u32) {}

    fn write_buffer(&mut self, buffer: &AudioBuffer) -> Result<(), ObjectError> {
        self.position += buffer.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        None
    }

    fn finished(&self) -> bool {
        false
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        self.position = frame;
        Ok(())
    }
}
