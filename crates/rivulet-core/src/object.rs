//! The source/sink contract consumed by the engine.
//!
//! Files, memory stores, generators and devices all implement
//! [`AudioObject`]. The engine only ever calls through this trait: it never
//! knows whether a read touched a disk, a socket or a soundcard.
//!
//! Realtime objects (those backed by a device clock) additionally get
//! [`prepare`](AudioObject::prepare), [`start`](AudioObject::start) and
//! [`stop`](AudioObject::stop) calls. Non-realtime objects can ignore them.

use crate::buffer::AudioBuffer;
use crate::error::ObjectError;

/// A source or sink of audio, read or written one buffer at a time.
///
/// Contract relied on by the engine:
///
/// - [`read_buffer`](Self::read_buffer) never returns more frames than the
///   last [`set_buffersize`](Self::set_buffersize) allowed, and sets the
///   buffer's length, channel count and rate to what it delivered.
/// - [`finished`](Self::finished) becomes permanently true once a source is
///   exhausted or a sink fails irrecoverably.
pub trait AudioObject: Send {
    /// Human-readable name used in logs and errors.
    fn label(&self) -> &str;

    /// Channel count delivered or expected.
    fn channels(&self) -> usize;

    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Sets the number of frames per read and the engine rate.
    fn set_buffersize(&mut self, frames: usize, sample_rate: u32);

    /// Reads up to one buffer of frames, returning how many were read.
    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        let _ = buffer;
        Err(ObjectError::Unsupported {
            label: self.label().to_string(),
            operation: "read",
        })
    }

    /// Writes the valid frames of `buffer`.
    fn write_buffer(&mut self, buffer: &AudioBuffer) -> Result<(), ObjectError> {
        let _ = buffer;
        Err(ObjectError::Unsupported {
            label: self.label().to_string(),
            operation: "write",
        })
    }

    /// Current position in frames.
    fn position(&self) -> u64;

    /// Total length in frames, when known.
    fn length(&self) -> Option<u64>;

    /// True once the object will deliver or accept no more data.
    fn finished(&self) -> bool;

    /// Moves to an absolute frame position.
    fn seek(&mut self, frame: u64) -> Result<(), ObjectError>;

    /// Pushes buffered output and headers to storage. The object stays
    /// writable afterwards.
    fn flush(&mut self) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Whether the object is driven by a device clock.
    fn is_realtime(&self) -> bool {
        false
    }

    /// Readies a realtime device for [`start`](Self::start).
    fn prepare(&mut self) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Starts a realtime device.
    fn start(&mut self) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Stops a realtime device.
    fn stop(&mut self) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Position in seconds at the object's own rate.
    fn position_seconds(&self) -> f64 {
        let rate = self.sample_rate();
        if rate == 0 {
            0.0
        } else {
            self.position() as f64 / f64::from(rate)
        }
    }
}

impl AudioObject for Box<dyn AudioObject> {
    fn label(&self) -> &str {
        (**self).label()
    }
    fn channels(&self) -> usize {
        (**self).channels()
    }
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
    fn set_buffersize(&mut self, frames: usize, sample_rate: u32) {
        (**self).set_buffersize(frames, sample_rate);
    }
    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        (**self).read_buffer(buffer)
    }
    fn write_buffer(&mut self, buffer: &AudioBuffer) -> Result<(), ObjectError> {
        (**self).write_buffer(buffer)
    }
    fn position(&self) -> u64 {
        (**self).position()
    }
    fn length(&self) -> Option<u64> {
        (**self).length()
    }
    fn finished(&self) -> bool {
        (**self).finished()
    }
    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        (**self).seek(frame)
    }
    fn flush(&mut self) -> Result<(), ObjectError> {
        (**self).flush()
    }
    fn is_realtime(&self) -> bool {
        (**self).is_realtime()
    }
    fn prepare(&mut self) -> Result<(), ObjectError> {
        (**self).prepare()
    }
    fn start(&mut self) -> Result<(), ObjectError> {
        (**self).start()
    }
    fn stop(&mut self) -> Result<(), ObjectError> {
        (**self).stop()
    }
}
