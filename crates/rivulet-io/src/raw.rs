//! Headerless interleaved PCM files.
//!
//! The sample format, channel count and rate are not stored in the file and
//! must be given when opening it. Conversion goes through
//! [`AudioBuffer::decode_from`] and [`AudioBuffer::encode_to`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use rivulet_core::{AudioBuffer, AudioObject, FormatError, ObjectError, SampleFormat};

use crate::frames_left;

fn check_format(format: SampleFormat) -> Result<(), ObjectError> {
    if format.is_supported() {
        Ok(())
    } else {
        Err(FormatError::UnsupportedFormat(format.to_string()).into())
    }
}

/// Reads raw PCM from a file.
#[derive(Debug)]
pub struct RawSource {
    label: String,
    reader: BufReader<File>,
    format: SampleFormat,
    channels: usize,
    sample_rate: u32,
    length: u64,
    position: u64,
    buffersize: usize,
    bytes: Vec<u8>,
    failed: bool,
}

impl RawSource {
    /// Opens `path`; its size determines the length in frames.
    pub fn open(path: impl AsRef<Path>, format: SampleFormat, channels: usize, sample_rate: u32) -> Result<Self, ObjectError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        check_format(format)?;
        let file = File::open(path).map_err(|e| ObjectError::io(&label, e))?;
        let size = file.metadata().map_err(|e| ObjectError::io(&label, e))?.len();
        let frame_size = format.frame_size(channels.max(1)) as u64;
        Ok(Self {
            label,
            reader: BufReader::new(file),
            format,
            channels,
            sample_rate,
            length: size / frame_size,
            position: 0,
            buffersize: 1024,
            bytes: Vec::new(),
            failed: false,
        })
    }

    /// Sample encoding of the file.
    pub fn format(&self) -> SampleFormat {
        self.format
    }
}

impl AudioObject for RawSource {
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
        let n = frames_left(self.buffersize, self.position, self.length);
        self.bytes.resize(n * self.format.frame_size(self.channels), 0);
        if let Err(err) = self.reader.read_exact(&mut self.bytes) {
            self.failed = true;
            return Err(ObjectError::io(&self.label, err));
        }
        buffer.decode_from(&self.bytes, self.format, self.channels, self.sample_rate)?;
        self.position += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        Some(self.length)
    }

    fn finished(&self) -> bool {
        self.failed || self.position >= self.length
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        let frame = frame.min(self.length);
        let offset = frame * self.format.frame_size(self.channels) as u64;
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| ObjectError::io(&self.label, e))?;
        self.position = frame;
        Ok(())
    }
}

/// Writes raw PCM to a file.
#[derive(Debug)]
pub struct RawSink {
    label: String,
    writer: BufWriter<File>,
    format: SampleFormat,
    channels: usize,
    sample_rate: u32,
    position: u64,
    scratch: AudioBuffer,
    bytes: Vec<u8>,
    failed: bool,
}

impl RawSink {
    /// Creates or truncates `path`.
    pub fn create(path: impl AsRef<Path>, format: SampleFormat, channels: usize, sample_rate: u32) -> Result<Self, ObjectError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        check_format(format)?;
        let file = File::create(path).map_err(|e| ObjectError::io(&label, e))?;
        Ok(Self {
            label,
            writer: BufWriter::new(file),
            format,
            channels,
            sample_rate,
            position: 0,
            scratch: AudioBuffer::default(),
            bytes: Vec::new(),
            failed: false,
        })
    }
}

impl AudioObject for RawSink {
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
        // The file layout is fixed, so the written frame always has exactly
        // `channels` channels.
        self.scratch.assign(buffer);
        self.scratch.set_channel_count(self.channels);
        self.scratch.encode_to(&mut self.bytes, self.format)?;
        if let Err(err) = self.writer.write_all(&self.bytes) {
            self.failed = true;
            return Err(ObjectError::io(&self.label, err));
        }
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
        self.failed
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        let offset = frame * self.format.frame_size(self.channels) as u64;
        self.writer
            .seek(SeekFrom::Start(offset))
            .map_err(|e| ObjectError::io(&self.label, e))?;
        self.position = frame;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ObjectError> {
        self.writer
            .flush()
            .map_err(|e| ObjectError::io(&self.label, e))
    }
}
