//! Audio objects for the rivulet engine.
//!
//! Every type here implements [`rivulet_core::AudioObject`]:
//!
//! - **Files**: [`WavSource`] / [`WavSink`] (via `hound`) and [`RawSource`] /
//!   [`RawSink`] for headerless interleaved PCM in any
//!   [`SampleFormat`](rivulet_core::SampleFormat)
//! - **Memory**: [`MemorySource`], [`MemorySink`] with a [`SinkTap`] for
//!   inspecting what was written, and [`NullSink`]
//! - **Generators**: [`ToneSource`]
//! - **Realtime**: [`VirtualDevice`], a clocked device stand-in whose
//!   lifecycle is observable through a [`DeviceLog`]
//! - **Adapters**: [`Resampled`] converts between an object's native rate and
//!   the engine rate
//!
//! ## Quick Start
//!
//! ```rust
//! use rivulet_core::{AudioBuffer, AudioObject};
//! use rivulet_io::{MemorySink, ToneSource};
//!
//! let mut tone = ToneSource::new("a440", 1, 48_000, 440.0, 0.5).with_length(480);
//! let (mut sink, tap) = MemorySink::new("out", 1, 48_000);
//! tone.set_buffersize(128, 48_000);
//!
//! let mut buffer = AudioBuffer::default();
//! while !tone.finished() {
//!     tone.read_buffer(&mut buffer).unwrap();
//!     sink.write_buffer(&buffer).unwrap();
//! }
//! assert_eq!(tap.frames(), 480);
//! ```

mod device;
mod memory;
mod raw;
mod resampled;
mod tone;
mod wav;

pub use device::{DeviceEvent, DeviceLog, VirtualDevice};
pub use memory::{MemorySink, MemorySource, NullSink, SinkTap};
pub use raw::{RawSink, RawSource};
pub use resampled::Resampled;
pub use tone::ToneSource;
pub use wav::{WavInfo, WavSink, WavSource, read_wav_info};

use rivulet_core::ObjectError;

/// Frames a read may return: the buffersize, capped by what is left.
pub(crate) fn frames_left(buffersize: usize, position: u64, length: u64) -> usize {
    let left = length.saturating_sub(position);
    left.min(buffersize as u64) as usize
}

/// Error for an injected failure at `frame`.
pub(crate) fn injected(label: &str, operation: &str, frame: u64) -> ObjectError {
    ObjectError::io(
        label,
        std::io::Error::other(format!("injected {operation} failure at frame {frame}")),
    )
}
