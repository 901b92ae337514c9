//! WAV file reading and writing via `hound`.

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavWriter};
use rivulet_core::{AudioBuffer, AudioObject, ObjectError};

use crate::frames_left;

fn wav_error(label: &str, err: hound::Error) -> ObjectError {
    match err {
        hound::Error::IoError(io) => ObjectError::io(label, io),
        other => ObjectError::codec(label, other),
    }
}

/// WAV file metadata read from the header only.
#[derive(Debug, Clone, PartialEq)]
pub struct WavInfo {
    /// Number of channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Whether samples are IEEE float.
    pub float: bool,
    /// Total number of frames.
    pub frames: u64,
}

impl WavInfo {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// Reads WAV metadata without loading sample data.
pub fn read_wav_info(path: impl AsRef<Path>) -> Result<WavInfo, ObjectError> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let reader = WavReader::open(path).map_err(|e| wav_error(&label, e))?;
    let spec = reader.spec();
    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        float: spec.sample_format == SampleFormat::Float,
        frames: u64::from(reader.duration()),
    })
}

/// Streams a WAV file one buffer at a time.
pub struct WavSource {
    label: String,
    reader: WavReader<BufReader<File>>,
    info: WavInfo,
    position: u64,
    buffersize: usize,
    failed: bool,
}

impl std::fmt::Debug for WavSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSource")
            .field("label", &self.label)
            .field("info", &self.info)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl WavSource {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ObjectError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let reader = WavReader::open(path).map_err(|e| wav_error(&label, e))?;
        let spec = reader.spec();
        let info = WavInfo {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            float: spec.sample_format == SampleFormat::Float,
            frames: u64::from(reader.duration()),
        };
        Ok(Self {
            label,
            reader,
            info,
            position: 0,
            buffersize: 1024,
            failed: false,
        })
    }

    /// Header information.
    pub fn info(&self) -> &WavInfo {
        &self.info
    }

    fn read_interleaved(&mut self, samples: usize) -> Result<Vec<f32>, hound::Error> {
        if self.info.float {
            self.reader.samples::<f32>().take(samples).collect()
        } else {
            let scale = (1_i64 << (self.info.bits_per_sample - 1)) as f32;
            self.reader
                .samples::<i32>()
                .take(samples)
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    }
}

impl AudioObject for WavSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn channels(&self) -> usize {
        usize::from(self.info.channels)
    }

    fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    fn set_buffersize(&mut self, frames: usize, _sample_rate: u32) {
        self.buffersize = frames;
    }

    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        let channels = self.channels();
        let n = frames_left(self.buffersize, self.position, self.info.frames);
        let interleaved = match self.read_interleaved(n * channels) {
            Ok(samples) => samples,
            Err(err) => {
                self.failed = true;
                return Err(wav_error(&self.label, err));
            }
        };
        let n = interleaved.len() / channels.max(1);

        buffer.set_channel_count(channels);
        buffer.set_sample_rate(self.info.sample_rate);
        buffer.resize(n);
        for (c, ch) in buffer.channels_mut().enumerate() {
            for (i, s) in ch.iter_mut().enumerate() {
                *s = interleaved[i * channels + c];
            }
        }
        self.position += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        Some(self.info.frames)
    }

    fn finished(&self) -> bool {
        self.failed || self.position >= self.info.frames
    }

    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        let frame = frame.min(self.info.frames);
        let target = u32::try_from(frame).map_err(|_| ObjectError::Seek {
            label: self.label.clone(),
            frame,
        })?;
        self.reader
            .seek(target)
            .map_err(|e| ObjectError::io(&self.label, e))?;
        self.position = frame;
        Ok(())
    }
}

/// Writes a WAV file. 32-bit files are float, narrower ones integer PCM.
///
/// The writer appends only: seeking forward pads with silence, seeking
/// backwards fails. [`flush`](AudioObject::flush) rewrites the header so the
/// file is valid while writing continues; [`finalize`](WavSink::finalize)
/// closes it for good. Dropping the sink finalizes it too, but any error is
/// lost there.
pub struct WavSink {
    label: String,
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: usize,
    sample_rate: u32,
    bits_per_sample: u16,
    position: u64,
    failed: bool,
}

impl std::fmt::Debug for WavSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSink")
            .field("label", &self.label)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("bits_per_sample", &self.bits_per_sample)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl WavSink {
    /// Creates or truncates `path`. `bits_per_sample` is 16, 24 or 32.
    pub fn create(path: impl AsRef<Path>, channels: usize, sample_rate: u32, bits_per_sample: u16) -> Result<Self, ObjectError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        if !matches!(bits_per_sample, 16 | 24 | 32) {
            return Err(ObjectError::codec(
                &label,
                format!("unsupported WAV bit depth {bits_per_sample}"),
            ));
        }
        let channel_count = u16::try_from(channels)
            .map_err(|_| ObjectError::codec(&label, format!("too many channels: {channels}")))?;
        let spec = hound::WavSpec {
            channels: channel_count,
            sample_rate,
            bits_per_sample,
            sample_format: if bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        };
        let writer = WavWriter::create(path, spec).map_err(|e| wav_error(&label, e))?;
        Ok(Self {
            label,
            writer: Some(writer),
            channels,
            sample_rate,
            bits_per_sample,
            position: 0,
            failed: false,
        })
    }

    /// Writes the final header. Later writes fail.
    pub fn finalize(&mut self) -> Result<(), ObjectError> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(|e| wav_error(&self.label, e)),
            None => Ok(()),
        }
    }

    fn write_frames(&mut self, buffer: &AudioBuffer, frames: usize) -> Result<(), hound::Error> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(hound::Error::IoError(std::io::Error::other("writer finalized")));
        };
        let present = buffer.channel_count().min(self.channels);
        let sample = |c: usize, i: usize| {
            if c < present && i < buffer.len() {
                buffer.channel(c)[i].clamp(-1.0, 1.0)
            } else {
                0.0
            }
        };
        if self.bits_per_sample == 32 {
            for i in 0..frames {
                for c in 0..self.channels {
                    writer.write_sample(sample(c, i))?;
                }
            }
        } else {
            let half = (1_i64 << (self.bits_per_sample - 1)) as f32;
            for i in 0..frames {
                for c in 0..self.channels {
                    let x = sample(c, i);
                    let scaled = if x < 0.0 { x * half } else { x * (half - 1.0) };
                    writer.write_sample(scaled.round() as i32)?;
                }
            }
        }
        Ok(())
    }
}

impl AudioObject for WavSink {
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
        if let Err(err) = self.write_frames(buffer, buffer.len()) {
            self.failed = true;
            return Err(wav_error(&self.label, err));
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
        if frame < self.position {
            return Err(ObjectError::Seek {
                label: self.label.clone(),
                frame,
            });
        }
        let gap = usize::try_from(frame - self.position).map_err(|_| ObjectError::Seek {
            label: self.label.clone(),
            frame,
        })?;
        if gap > 0 {
            let silence = AudioBuffer::default();
            self.write_frames(&silence, gap)
                .map_err(|e| wav_error(&self.label, e))?;
            self.position = frame;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ObjectError> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(|e| wav_error(&self.label, e)),
            None => Ok(()),
        }
    }
}
