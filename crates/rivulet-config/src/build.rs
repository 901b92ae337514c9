//! Turns a validated [`SetupFile`] into engine objects.

use rivulet_core::{AudioObject, Chain, SampleFormat};
use rivulet_engine::{Engine, EngineContext, Setup, SetupError};
use rivulet_io::{NullSink, RawSink, RawSource, Resampled, ToneSource, WavSink, WavSource};
use tracing::debug;

use crate::error::ConfigError;
use crate::registry::OperatorRegistry;
use crate::setup_file::{ChainConfig, ObjectConfig, SetupFile};

/// Presents `object` at `rate`, wrapping it only when needed.
fn at_rate<O: AudioObject + 'static>(object: O, rate: u32, entry: &str) -> Box<dyn AudioObject> {
    if object.sample_rate() == rate {
        Box::new(object)
    } else {
        debug!("{entry}: resampling {} Hz to {rate} Hz", object.sample_rate());
        Box::new(Resampled::new(object, rate))
    }
}

fn raw_format(format: &str, entry: &str) -> Result<SampleFormat, ConfigError> {
    format
        .parse()
        .map_err(|e| ConfigError::validation(entry, format!("{e}")))
}

fn open_input(config: &ObjectConfig, rate: u32, entry: &str) -> Result<Box<dyn AudioObject>, ConfigError> {
    let object: Box<dyn AudioObject> = match config {
        ObjectConfig::Wav { path, channels, .. } => {
            let source = WavSource::open(path).map_err(|e| ConfigError::object(entry, e))?;
            if let Some(channels) = channels
                && *channels != source.channels()
            {
                return Err(ConfigError::validation(
                    entry,
                    format!("file has {} channels, {channels} configured", source.channels()),
                ));
            }
            at_rate(source, rate, entry)
        }
        ObjectConfig::Raw {
            path,
            format,
            channels,
            resample_from,
        } => {
            let native = resample_from.unwrap_or(rate);
            let source = RawSource::open(path, raw_format(format, entry)?, *channels, native)
                .map_err(|e| ConfigError::object(entry, e))?;
            at_rate(source, rate, entry)
        }
        ObjectConfig::Tone {
            frequency,
            amplitude,
            channels,
            length,
            resample_from,
        } => {
            let native = resample_from.unwrap_or(rate);
            let mut tone = ToneSource::new(entry, *channels, native, *frequency, *amplitude);
            if let Some(seconds) = length {
                tone = tone.with_length((seconds * f64::from(native)).round() as u64);
            }
            at_rate(tone, rate, entry)
        }
        ObjectConfig::Null { .. } => {
            return Err(ConfigError::validation(entry, "null objects cannot be read"));
        }
    };
    Ok(object)
}

fn open_output(config: &ObjectConfig, rate: u32, entry: &str) -> Result<Box<dyn AudioObject>, ConfigError> {
    let object: Box<dyn AudioObject> = match config {
        ObjectConfig::Wav { path, channels, bits } => {
            let sink = WavSink::create(path, channels.unwrap_or(2), rate, *bits)
                .map_err(|e| ConfigError::object(entry, e))?;
            Box::new(sink)
        }
        ObjectConfig::Raw {
            path,
            format,
            channels,
            resample_from,
        } => {
            let native = resample_from.unwrap_or(rate);
            let sink = RawSink::create(path, raw_format(format, entry)?, *channels, native)
                .map_err(|e| ConfigError::object(entry, e))?;
            at_rate(sink, rate, entry)
        }
        ObjectConfig::Null { channels } => Box::new(NullSink::new(entry, *channels, rate)),
        ObjectConfig::Tone { .. } => {
            return Err(ConfigError::validation(entry, "tone objects cannot be written"));
        }
    };
    Ok(object)
}

fn build_chain(config: &ChainConfig, registry: &OperatorRegistry) -> Result<Chain, ConfigError> {
    let entry = config.entry();
    let mut chain = Chain::new(config.name.as_str());
    chain.connect_input(config.input - 1);
    if let Some(output) = config.output {
        chain.connect_output(output - 1);
    }
    for (j, op) in config.operators.iter().enumerate() {
        let operator = op.instantiate(registry, &format!("{entry}, operator {}", j + 1))?;
        chain.add_operator(operator).map_err(SetupError::from)?;
    }
    if config.muted {
        chain.toggle_mute();
    }
    if config.bypassed {
        chain.toggle_bypass();
    }
    Ok(chain)
}

impl SetupFile {
    /// Opens every object and assembles the chains.
    ///
    /// Output files are created (and truncated) here.
    pub fn build(&self, registry: &OperatorRegistry) -> Result<Setup, ConfigError> {
        self.validate(registry)?;
        let rate = self.engine.sample_rate;
        let mut setup = Setup::new();
        for (i, input) in self.inputs.iter().enumerate() {
            setup.add_input_boxed(open_input(input, rate, &Self::input_entry(i))?);
        }
        for (i, output) in self.outputs.iter().enumerate() {
            setup.add_output_boxed(open_output(output, rate, &Self::output_entry(i))?);
        }
        for chain in &self.chains {
            setup.add_chain(build_chain(chain, registry)?);
        }
        debug!(
            "built setup: {} inputs, {} outputs, {} chains",
            self.inputs.len(),
            self.outputs.len(),
            self.chains.len()
        );
        Ok(setup)
    }

    /// Builds the setup and hands it to a new engine.
    pub fn into_engine(self, registry: &OperatorRegistry, ctx: EngineContext) -> Result<Engine, ConfigError> {
        let setup = self.build(registry)?;
        Ok(Engine::new(setup, self.engine, ctx)?)
    }
}
