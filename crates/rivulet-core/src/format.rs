//! Interleaved PCM encodings and buffer conversion.
//!
//! Integer formats are quantized asymmetrically so that both `-1.0` and
//! `1.0` are representable: negative values scale by `2^(bits-1)`, positive
//! values by `2^(bits-1) - 1`. Values outside `[-1.0, 1.0]` are clamped
//! first, so loud material saturates instead of wrapping. Unsigned 8-bit
//! data is offset by 128. 24-bit samples are packed into three bytes.
//!
//! `s8` and the 64-bit float formats are recognised by name but have no
//! codec; converting with them fails with
//! [`FormatError::UnsupportedFormat`].

use std::fmt;
use std::str::FromStr;

use crate::buffer::AudioBuffer;
use crate::error::FormatError;

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

/// An interleaved sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, offset by 128.
    U8,
    /// Signed 8-bit (no codec).
    S8,
    /// Signed 16-bit.
    S16(Endianness),
    /// Signed 24-bit packed in three bytes.
    S24(Endianness),
    /// Signed 32-bit.
    S32(Endianness),
    /// IEEE 754 single precision.
    F32(Endianness),
    /// IEEE 754 double precision (no codec).
    F64(Endianness),
}

impl SampleFormat {
    /// Bytes per sample of one channel.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::S16(_) => 2,
            Self::S24(_) => 3,
            Self::S32(_) | Self::F32(_) => 4,
            Self::F64(_) => 8,
        }
    }

    /// Bytes per interleaved frame.
    pub fn frame_size(self, channels: usize) -> usize {
        self.bytes_per_sample() * channels
    }

    /// Whether [`AudioBuffer::decode_from`] and [`AudioBuffer::encode_to`]
    /// can convert this format.
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::S8 | Self::F64(_))
    }

    fn check_supported(self) -> Result<(), FormatError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(FormatError::UnsupportedFormat(self.to_string()))
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, order) = match self {
            Self::U8 => return f.write_str("u8"),
            Self::S8 => return f.write_str("s8"),
            Self::S16(e) => ("s16", e),
            Self::S24(e) => ("s24", e),
            Self::S32(e) => ("s32", e),
            Self::F32(e) => ("f32", e),
            Self::F64(e) => ("f64", e),
        };
        let suffix = match order {
            Endianness::Little => "le",
            Endianness::Big => "be",
        };
        write!(f, "{base}_{suffix}")
    }
}

impl FromStr for SampleFormat {
    type Err = FormatError;

    /// Parses names like `u8`, `s16`, `s24_be`, `f32_le`. A missing byte
    /// order means little-endian.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (base, order) = match lower.split_once('_') {
            Some((base, "le")) => (base, Endianness::Little),
            Some((base, "be")) => (base, Endianness::Big),
            Some(_) => return Err(FormatError::UnsupportedFormat(s.to_string())),
            None => (lower.as_str(), Endianness::Little),
        };
        match base {
            "u8" => Ok(Self::U8),
            "s8" => Ok(Self::S8),
            "s16" => Ok(Self::S16(order)),
            "s24" => Ok(Self::S24(order)),
            "s32" => Ok(Self::S32(order)),
            "f32" => Ok(Self::F32(order)),
            "f64" => Ok(Self::F64(order)),
            _ => Err(FormatError::UnsupportedFormat(s.to_string())),
        }
    }
}

fn quantize(sample: f32, bits: u32) -> i64 {
    let x = f64::from(sample.clamp(-1.0, 1.0));
    let scale = if x < 0.0 {
        (1_i64 << (bits - 1)) as f64
    } else {
        ((1_i64 << (bits - 1)) - 1) as f64
    };
    (x * scale).round() as i64
}

fn dequantize(value: i64, bits: u32) -> f32 {
    let scale = if value < 0 {
        (1_i64 << (bits - 1)) as f64
    } else {
        ((1_i64 << (bits - 1)) - 1) as f64
    };
    (value as f64 / scale) as f32
}

fn read_sample(format: SampleFormat, b: &[u8]) -> f32 {
    use Endianness::{Big, Little};
    match format {
        SampleFormat::U8 => dequantize(i64::from(b[0]) - 128, 8),
        SampleFormat::S16(Little) => dequantize(i64::from(i16::from_le_bytes([b[0], b[1]])), 16),
        SampleFormat::S16(Big) => dequantize(i64::from(i16::from_be_bytes([b[0], b[1]])), 16),
        SampleFormat::S24(order) => {
            let bytes = match order {
                Little => [b[0], b[1], b[2], 0],
                Big => [b[2], b[1], b[0], 0],
            };
            // Sign-extend from bit 23.
            let raw = i32::from_le_bytes(bytes) << 8 >> 8;
            dequantize(i64::from(raw), 24)
        }
        SampleFormat::S32(Little) => {
            dequantize(i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])), 32)
        }
        SampleFormat::S32(Big) => {
            dequantize(i64::from(i32::from_be_bytes([b[0], b[1], b[2], b[3]])), 32)
        }
        SampleFormat::F32(Little) => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        SampleFormat::F32(Big) => f32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        SampleFormat::S8 | SampleFormat::F64(_) => 0.0,
    }
}

fn write_sample(format: SampleFormat, sample: f32, out: &mut Vec<u8>) {
    use Endianness::{Big, Little};
    match format {
        SampleFormat::U8 => out.push((quantize(sample, 8) + 128) as u8),
        SampleFormat::S16(Little) => out.extend_from_slice(&(quantize(sample, 16) as i16).to_le_bytes()),
        SampleFormat::S16(Big) => out.extend_from_slice(&(quantize(sample, 16) as i16).to_be_bytes()),
        SampleFormat::S24(order) => {
            let le = (quantize(sample, 24) as i32).to_le_bytes();
            match order {
                Little => out.extend_from_slice(&le[..3]),
                Big => out.extend_from_slice(&[le[2], le[1], le[0]]),
            }
        }
        SampleFormat::S32(Little) => out.extend_from_slice(&(quantize(sample, 32) as i32).to_le_bytes()),
        SampleFormat::S32(Big) => out.extend_from_slice(&(quantize(sample, 32) as i32).to_be_bytes()),
        SampleFormat::F32(Little) => out.extend_from_slice(&sample.to_le_bytes()),
        SampleFormat::F32(Big) => out.extend_from_slice(&sample.to_be_bytes()),
        SampleFormat::S8 | SampleFormat::F64(_) => {}
    }
}

impl AudioBuffer {
    /// Replaces the buffer contents with interleaved PCM from `bytes`.
    ///
    /// The channel count, length and sample rate follow the input. A
    /// trailing partial frame is ignored.
    pub fn decode_from(
        &mut self,
        bytes: &[u8],
        format: SampleFormat,
        channels: usize,
        sample_rate: u32,
    ) -> Result<(), FormatError> {
        format.check_supported()?;
        let frame_size = format.frame_size(channels);
        let frames = if frame_size == 0 {
            0
        } else {
            bytes.len() / frame_size
        };
        if self.channel_count() != channels {
            self.set_channel_count(channels);
        }
        self.set_sample_rate(sample_rate);
        if self.len() != frames {
            self.resize(frames);
        }

        let width = format.bytes_per_sample();
        for (frame_index, frame) in bytes.chunks_exact(frame_size.max(1)).take(frames).enumerate() {
            for (ch, raw) in frame.chunks_exact(width).enumerate() {
                self.channel_mut(ch)[frame_index] = read_sample(format, raw);
            }
        }
        Ok(())
    }

    /// Encodes the valid frames as interleaved PCM, replacing the contents
    /// of `out`.
    pub fn encode_to(&self, out: &mut Vec<u8>, format: SampleFormat) -> Result<(), FormatError> {
        format.check_supported()?;
        out.clear();
        out.reserve(format.frame_size(self.channel_count()) * self.len());
        for i in 0..self.len() {
            for ch in self.channels() {
                write_sample(format, ch[i], out);
            }
        }
        Ok(())
    }
}
