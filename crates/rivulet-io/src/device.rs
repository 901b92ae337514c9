//! Virtual realtime device.
//!
//! [`VirtualDevice`] behaves like a soundcard endpoint as far as the engine
//! can tell: it reports itself as realtime, wants `prepare`/`start`/`stop`,
//! refuses reads while stopped and accepts prefill writes before it starts.
//! Its clock is the frame counter, so runs stay deterministic. Every
//! lifecycle call is recorded in a [`DeviceLog`] shared with the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rivulet_core::{AudioBuffer, AudioObject, ObjectError};
use tracing::debug;

/// A lifecycle call observed by a [`VirtualDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// `prepare()` succeeded.
    Prepared,
    /// `start()` succeeded at the given device position.
    Started(u64),
    /// `stop()` at the given device position.
    Stopped(u64),
}

#[derive(Debug, Default)]
struct DeviceState {
    prepared: bool,
    started: bool,
    events: Vec<DeviceEvent>,
    frames: u64,
    prefill: u64,
}

/// Shared record of a device's lifecycle and traffic.
#[derive(Debug, Clone, Default)]
pub struct DeviceLog {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceLog {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the device is running.
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// Whether `prepare()` has been called.
    pub fn is_prepared(&self) -> bool {
        self.lock().prepared
    }

    /// Lifecycle calls in order.
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.lock().events.clone()
    }

    /// Frames read or written in total.
    pub fn frames(&self) -> u64 {
        self.lock().frames
    }

    /// Frames written before the first start.
    pub fn prefill(&self) -> u64 {
        self.lock().prefill
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Capture,
    Playback,
}

/// Deterministic realtime endpoint.
#[derive(Debug)]
pub struct VirtualDevice {
    label: String,
    direction: Direction,
    channels: usize,
    sample_rate: u32,
    buffersize: usize,
    level: f32,
    position: u64,
    fail_prepare: bool,
    log: DeviceLog,
}

impl VirtualDevice {
    fn with_direction(label: impl Into<String>, direction: Direction, channels: usize, sample_rate: u32) -> (Self, DeviceLog) {
        let log = DeviceLog::default();
        let device = Self {
            label: label.into(),
            direction,
            channels,
            sample_rate,
            buffersize: 1024,
            level: 0.0,
            position: 0,
            fail_prepare: false,
            log: log.clone(),
        };
        (device, log)
    }

    /// Capture endpoint delivering a constant level (silence by default).
    pub fn source(label: impl Into<String>, channels: usize, sample_rate: u32) -> (Self, DeviceLog) {
        Self::with_direction(label, Direction::Capture, channels, sample_rate)
    }

    /// Playback endpoint.
    pub fn sink(label: impl Into<String>, channels: usize, sample_rate: u32) -> (Self, DeviceLog) {
        Self::with_direction(label, Direction::Playback, channels, sample_rate)
    }

    /// Constant sample value delivered by a capture endpoint.
    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    /// Makes `prepare()` fail, as a missing device would.
    pub fn with_prepare_error(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    fn not_running(&self) -> ObjectError {
        ObjectError::Device {
            label: self.label.clone(),
            message: "device is not running".into(),
        }
    }
}

impl AudioObject for VirtualDevice {
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
        if self.direction != Direction::Capture {
            return Err(ObjectError::Unsupported {
                label: self.label.clone(),
                operation: "read",
            });
        }
        if !self.log.is_started() {
            return Err(self.not_running());
        }
        let n = self.buffersize;
        buffer.set_channel_count(self.channels);
        buffer.set_sample_rate(self.sample_rate);
        buffer.resize(n);
        for ch in buffer.channels_mut() {
            ch.fill(self.level);
        }
        self.position += n as u64;
        self.log.lock().frames += n as u64;
        Ok(n)
    }

    fn write_buffer(&mut self, buffer: &AudioBuffer) -> Result<(), ObjectError> {
        if self.direction != Direction::Playback {
            return Err(ObjectError::Unsupported {
                label: self.label.clone(),
                operation: "write",
            });
        }
        let n = buffer.len() as u64;
        let mut state = self.log.lock();
        if !state.started {
            state.prefill += n;
        } else {
            // Only frames actually played advance the device clock.
            self.position += n;
        }
        state.frames += n;
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
        Err(ObjectError::Seek {
            label: self.label.clone(),
            frame,
        })
    }

    fn is_realtime(&self) -> bool {
        true
    }

    fn prepare(&mut self) -> Result<(), ObjectError> {
        if self.fail_prepare {
            return Err(ObjectError::Device {
                label: self.label.clone(),
                message: "no such device".into(),
            });
        }
        let mut state = self.log.lock();
        state.prepared = true;
        state.events.push(DeviceEvent::Prepared);
        Ok(())
    }

    fn start(&mut self) -> Result<(), ObjectError> {
        let mut state = self.log.lock();
        if !state.started {
            state.started = true;
            state.events.push(DeviceEvent::Started(self.position));
            debug!("device '{}' started", self.label);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ObjectError> {
        let mut state = self.log.lock();
        if state.started {
            state.started = false;
            state.events.push(DeviceEvent::Stopped(self.position));
            debug!("device '{}' stopped", self.label);
        }
        Ok(())
    }
}
