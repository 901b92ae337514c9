//! Sine generator.

use std::f64::consts::TAU;

use rivulet_core::{AudioBuffer, AudioObject, ObjectError};

use crate::frames_left;

/// Sine tone, identical on every channel. Endless unless a length is set.
#[derive(Debug, Clone)]
pub struct ToneSource {
    label: String,
    channels: usize,
    sample_rate: u32,
    frequency: f64,
    amplitude: f32,
    length: Option<u64>,
    position: u64,
    buffersize: usize,
}

impl ToneSource {
    /// `amplitude` is linear, `frequency` in Hz.
    pub fn new(label: impl Into<String>, channels: usize, sample_rate: u32, frequency: f64, amplitude: f32) -> Self {
        Self {
            label: label.into(),
            channels,
            sample_rate,
            frequency,
            amplitude,
            length: None,
            position: 0,
            buffersize: 1024,
        }
    }

    /// Ends the tone after `frames` frames.
    pub fn with_length(mut self, frames: u64) -> Self {
        self.length = Some(frames);
        self
    }

    fn sample_at(&self, frame: u64) -> f32 {
        let t = frame as f64 / f64::from(self.sample_rate.max(1));
        (f64::from(self.amplitude) * (TAU * self.frequency * t).sin()) as f32
    }
}

impl AudioObject for ToneSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_buffersize(&mut self, frames: usize, _sample_rate: u32) {
        self.buffersize = frames;
    }

    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        let n = match self.length {
            Some(length) => frames_left(self.buffersize, self.position, length),
            None => self.buffersize,
        };
        buffer.set_channel_count(self.channels);
        buffer.set_sample_rate(self.sample_rate);
        buffer.resize(n);
        let start = self.position;
        let samples: Vec<f32> = (0..n as u64).map(|i| self.sample_at(start + i)).collect();
        for ch in buffer.channels_mut() {
            ch.copy_from_slice(&samples);
        }
        self.position += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        self.length
    }

    fn finished(&self) -> bool {
        self.length.is_some_and(|length| self.position >= length)
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        self.position = match self.length {
            Some(length) => frame.min(length),
            None => frame,
        };
        Ok(())
    }
}
