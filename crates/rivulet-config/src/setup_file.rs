//! The setup file model.
//!
//! A setup file has one optional `[engine]` table and any number of
//! `[[input]]`, `[[output]]` and `[[chain]]` tables:
//!
//! ```toml
//! [engine]
//! buffersize = 512
//! sample_rate = 44100
//!
//! [[input]]
//! kind = "wav"
//! path = "guitar.wav"
//!
//! [[output]]
//! kind = "wav"
//! path = "out.wav"
//! bits = 24
//!
//! [[chain]]
//! name = "lead"
//! input = 1
//! output = 1
//! operators = [{ kind = "amplify", params = [80] }]
//! ```
//!
//! Chains refer to inputs and outputs by their position in the file,
//! counting from 1.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rivulet_core::{ChainOperator, SampleFormat};
use rivulet_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::OperatorRegistry;

fn default_channels() -> usize {
    2
}

fn default_bits() -> u16 {
    16
}

fn default_frequency() -> f64 {
    440.0
}

fn default_amplitude() -> f32 {
    0.5
}

/// One `[[input]]` or `[[output]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectConfig {
    /// WAV file. Inputs take channels and rate from the file header and
    /// are resampled when the rate differs from the engine's.
    Wav {
        /// File path.
        path: PathBuf,
        /// Channel count of a written file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channels: Option<usize>,
        /// Bits per sample of a written file: 16, 24 or 32 (float).
        #[serde(default = "default_bits")]
        bits: u16,
    },
    /// Headerless PCM file.
    Raw {
        /// File path.
        path: PathBuf,
        /// Sample format name, e.g. `s16_le`.
        format: String,
        /// Interleaved channel count.
        channels: usize,
        /// Rate of the file when it differs from the engine's.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resample_from: Option<u32>,
    },
    /// Sine generator (input only).
    Tone {
        /// Frequency in Hz.
        #[serde(default = "default_frequency")]
        frequency: f64,
        /// Peak amplitude.
        #[serde(default = "default_amplitude")]
        amplitude: f32,
        /// Channel count.
        #[serde(default = "default_channels")]
        channels: usize,
        /// Length in seconds; endless when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<f64>,
        /// Rate to generate at when it differs from the engine's.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resample_from: Option<u32>,
    },
    /// Discards everything (output only).
    Null {
        /// Channel count.
        #[serde(default = "default_channels")]
        channels: usize,
    },
}

impl ObjectConfig {
    /// The `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Wav { .. } => "wav",
            Self::Raw { .. } => "raw",
            Self::Tone { .. } => "tone",
            Self::Null { .. } => "null",
        }
    }

    /// File path, for file-backed kinds.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Wav { path, .. } | Self::Raw { path, .. } => Some(path),
            Self::Tone { .. } | Self::Null { .. } => None,
        }
    }

    fn check_input(&self, entry: &str) -> Result<(), ConfigError> {
        match self {
            Self::Null { .. } => Err(ConfigError::validation(entry, "null objects cannot be read")),
            Self::Tone {
                frequency,
                amplitude,
                length,
                ..
            } => {
                if !frequency.is_finite() || *frequency <= 0.0 {
                    return Err(ConfigError::validation(
                        entry,
                        format!("tone frequency must be positive, got {frequency}"),
                    ));
                }
                if !amplitude.is_finite() {
                    return Err(ConfigError::validation(entry, "tone amplitude must be finite"));
                }
                if let Some(length) = length
                    && (!length.is_finite() || *length < 0.0)
                {
                    return Err(ConfigError::validation(
                        entry,
                        format!("tone length must be non-negative, got {length}"),
                    ));
                }
                self.check_common(entry)
            }
            _ => self.check_common(entry),
        }
    }

    fn check_output(&self, entry: &str) -> Result<(), ConfigError> {
        match self {
            Self::Tone { .. } => Err(ConfigError::validation(entry, "tone objects cannot be written")),
            Self::Wav { bits, .. } if !matches!(bits, 16 | 24 | 32) => Err(ConfigError::validation(
                entry,
                format!("wav bits must be 16, 24 or 32, got {bits}"),
            )),
            _ => self.check_common(entry),
        }
    }

    fn check_common(&self, entry: &str) -> Result<(), ConfigError> {
        let channels = match self {
            Self::Wav { channels, .. } => *channels,
            Self::Raw { channels, .. } | Self::Tone { channels, .. } | Self::Null { channels } => Some(*channels),
        };
        if channels == Some(0) {
            return Err(ConfigError::validation(entry, "channels must be at least 1"));
        }
        if let Self::Raw { format, .. } = self {
            let parsed: SampleFormat = format
                .parse()
                .map_err(|e| ConfigError::validation(entry, format!("{e}")))?;
            if !parsed.is_supported() {
                return Err(ConfigError::validation(
                    entry,
                    format!("sample format '{parsed}' cannot be converted"),
                ));
            }
        }
        if let Self::Raw { resample_from, .. } | Self::Tone { resample_from, .. } = self
            && *resample_from == Some(0)
        {
            return Err(ConfigError::validation(entry, "resample_from must be positive"));
        }
        Ok(())
    }
}

/// One operator inside a `[[chain]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Registry id.
    pub kind: String,
    /// Parameter values in 1-based parameter order. Missing trailing
    /// values keep their defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,
}

impl OperatorConfig {
    /// Creates an operator entry with default parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter value.
    pub fn with_param(mut self, value: f64) -> Self {
        self.params.push(value);
        self
    }

    /// Creates the operator and applies the configured parameters.
    pub fn instantiate(
        &self,
        registry: &OperatorRegistry,
        entry: &str,
    ) -> Result<Box<dyn ChainOperator>, ConfigError> {
        let mut op = registry
            .create(&self.kind)
            .ok_or_else(|| ConfigError::UnknownOperator {
                entry: entry.to_string(),
                kind: self.kind.clone(),
            })?;
        for (i, &value) in self.params.iter().enumerate() {
            op.set_parameter(i + 1, value)
                .map_err(|source| ConfigError::InvalidParameter {
                    entry: entry.to_string(),
                    source,
                })?;
        }
        Ok(op)
    }
}

/// One `[[chain]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unique chain name.
    pub name: String,
    /// Position of the input in the file, from 1.
    pub input: usize,
    /// Position of the output in the file, from 1. A chain without an
    /// output is processed but its result is dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<usize>,
    /// Operators in processing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<OperatorConfig>,
    /// Start muted.
    #[serde(default)]
    pub muted: bool,
    /// Start with operators bypassed.
    #[serde(default)]
    pub bypassed: bool,
}

impl ChainConfig {
    /// Creates a chain entry bound to `input`, no output yet.
    pub fn new(name: impl Into<String>, input: usize) -> Self {
        Self {
            name: name.into(),
            input,
            output: None,
            operators: Vec::new(),
            muted: false,
            bypassed: false,
        }
    }

    /// Binds the chain to `output`.
    pub fn with_output(mut self, output: usize) -> Self {
        self.output = Some(output);
        self
    }

    /// Appends an operator.
    pub fn with_operator(mut self, operator: OperatorConfig) -> Self {
        self.operators.push(operator);
        self
    }

    /// How validation errors refer to this chain.
    pub fn entry(&self) -> String {
        format!("chain '{}'", self.name)
    }
}

/// A complete setup file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupFile {
    /// Engine settings.
    pub engine: EngineConfig,
    /// `[[input]]` tables in file order.
    #[serde(rename = "input", skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ObjectConfig>,
    /// `[[output]]` tables in file order.
    #[serde(rename = "output", skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ObjectConfig>,
    /// `[[chain]]` tables in file order.
    #[serde(rename = "chain", skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<ChainConfig>,
}

impl SetupFile {
    /// Load a setup from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let file: SetupFile = toml::from_str(&content)?;
        Ok(file)
    }

    /// Load a setup from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the setup to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the setup to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Entry name of the input at `index` (0-based).
    pub fn input_entry(index: usize) -> String {
        format!("input {}", index + 1)
    }

    /// Entry name of the output at `index` (0-based).
    pub fn output_entry(index: usize) -> String {
        format!("output {}", index + 1)
    }

    /// Checks everything that can be checked without touching files.
    pub fn validate(&self, registry: &OperatorRegistry) -> Result<(), ConfigError> {
        self.engine.validate()?;
        for (i, input) in self.inputs.iter().enumerate() {
            input.check_input(&Self::input_entry(i))?;
        }
        for (i, output) in self.outputs.iter().enumerate() {
            output.check_output(&Self::output_entry(i))?;
        }

        let mut names = HashSet::new();
        for chain in &self.chains {
            let entry = chain.entry();
            if !names.insert(chain.name.as_str()) {
                return Err(ConfigError::validation(entry, "chain name is used twice"));
            }
            if chain.input == 0 || chain.input > self.inputs.len() {
                return Err(ConfigError::validation(
                    entry,
                    format!(
                        "input {} does not exist ({} configured, numbered from 1)",
                        chain.input,
                        self.inputs.len()
                    ),
                ));
            }
            if let Some(output) = chain.output
                && (output == 0 || output > self.outputs.len())
            {
                return Err(ConfigError::validation(
                    entry,
                    format!(
                        "output {output} does not exist ({} configured, numbered from 1)",
                        self.outputs.len()
                    ),
                ));
            }
            for (j, op) in chain.operators.iter().enumerate() {
                op.instantiate(registry, &format!("{entry}, operator {}", j + 1))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> SetupFile {
        SetupFile::from_toml(toml).unwrap()
    }

    fn validation_entry(file: &SetupFile) -> String {
        match file.validate(&OperatorRegistry::new()) {
            Err(ConfigError::Validation { entry, .. }) => entry,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    const FULL: &str = r#"
[engine]
buffersize = 256
sample_rate = 44100
mixmode = "normal"
looping = true

[[input]]
kind = "tone"
frequency = 220
channels = 1
length = 2.5

[[input]]
kind = "raw"
path = "take.raw"
format = "s24_be"
channels = 2
resample_from = 48000

[[output]]
kind = "wav"
path = "out.wav"
channels = 2
bits = 24

[[output]]
kind = "null"

[[chain]]
name = "lead"
input = 1
output = 1
operators = [
    { kind = "channel_copy", params = [1, 2] },
    { kind = "amplify", params = [80] },
]

[[chain]]
name = "monitor"
input = 2
muted = true
"#;

    // --- parsing ---

    #[test]
    fn full_file_parses() {
        let file = parse(FULL);
        assert_eq!(file.engine.buffersize, 256);
        assert_eq!(file.engine.sample_rate, 44_100);
        assert!(file.engine.looping);
        assert_eq!(file.engine.poll_interval_ms, 100);

        assert_eq!(file.inputs.len(), 2);
        assert!(matches!(
            file.inputs[0],
            ObjectConfig::Tone { frequency, channels: 1, length: Some(l), .. } if frequency == 220.0 && l == 2.5
        ));
        assert_eq!(file.inputs[1].kind(), "raw");
        assert_eq!(file.outputs[1], ObjectConfig::Null { channels: 2 });

        let lead = &file.chains[0];
        assert_eq!(lead.output, Some(1));
        assert_eq!(lead.operators.len(), 2);
        assert_eq!(lead.operators[1], OperatorConfig::new("amplify").with_param(80.0));
        assert!(file.chains[1].muted);
        assert_eq!(file.chains[1].output, None);

        file.validate(&OperatorRegistry::new()).unwrap();
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let file = parse("");
        assert_eq!(file, SetupFile::default());
        assert_eq!(file.engine, EngineConfig::default());
    }

    #[test]
    fn unknown_object_kind_is_a_parse_error() {
        let err = SetupFile::from_toml("[[input]]\nkind = \"mp3\"\npath = \"a.mp3\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn wav_defaults_to_sixteen_bits() {
        let file = parse("[[output]]\nkind = \"wav\"\npath = \"o.wav\"\n");
        assert_eq!(
            file.outputs[0],
            ObjectConfig::Wav {
                path: "o.wav".into(),
                channels: None,
                bits: 16
            }
        );
    }

    // --- validation ---

    #[test]
    fn chain_with_missing_input_is_named() {
        let mut file = parse(FULL);
        file.chains[1].input = 3;
        assert_eq!(validation_entry(&file), "chain 'monitor'");
    }

    #[test]
    fn object_indices_start_at_one() {
        let mut file = parse(FULL);
        file.chains[0].output = Some(0);
        assert_eq!(validation_entry(&file), "chain 'lead'");
    }

    #[test]
    fn duplicate_chain_names_are_rejected() {
        let mut file = parse(FULL);
        file.chains[1].name = "lead".into();
        assert_eq!(validation_entry(&file), "chain 'lead'");
    }

    #[test]
    fn null_input_and_tone_output_are_rejected() {
        let mut file = parse(FULL);
        file.inputs.push(ObjectConfig::Null { channels: 1 });
        assert_eq!(validation_entry(&file), "input 3");

        let mut file = parse(FULL);
        file.outputs[1] = file.inputs[0].clone();
        assert_eq!(validation_entry(&file), "output 2");
    }

    #[test]
    fn unusable_raw_format_is_rejected() {
        for format in ["s12", "f64_le"] {
            let mut file = parse(FULL);
            if let ObjectConfig::Raw { format: f, .. } = &mut file.inputs[1] {
                *f = format.into();
            }
            assert_eq!(validation_entry(&file), "input 2", "format {format}");
        }
    }

    #[test]
    fn bad_engine_settings_surface_as_setup_errors() {
        let mut file = parse(FULL);
        file.engine.buffersize = 0;
        assert!(matches!(
            file.validate(&OperatorRegistry::new()),
            Err(ConfigError::Setup(_))
        ));
    }

    #[test]
    fn unknown_operator_names_chain_and_position() {
        let mut file = parse(FULL);
        file.chains[0].operators.push(OperatorConfig::new("fuzz"));
        match file.validate(&OperatorRegistry::new()) {
            Err(ConfigError::UnknownOperator { entry, kind }) => {
                assert_eq!(entry, "chain 'lead', operator 3");
                assert_eq!(kind, "fuzz");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn operator_parameters_are_checked() {
        let registry = OperatorRegistry::new();
        let too_many = OperatorConfig::new("pan").with_param(50.0).with_param(1.0);
        assert!(matches!(
            too_many.instantiate(&registry, "chain 'x', operator 1"),
            Err(ConfigError::InvalidParameter { .. })
        ));
        let out_of_range = OperatorConfig::new("amplify").with_param(-1.0);
        assert!(out_of_range.instantiate(&registry, "e").is_err());

        let ok = OperatorConfig::new("channel_copy").with_param(2.0);
        let op = ok.instantiate(&registry, "e").unwrap();
        assert_eq!(op.get_parameter(1), Some(2.0));
        assert_eq!(op.get_parameter(2), Some(2.0));
    }

    // --- save / load ---

    #[test]
    fn saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.toml");
        let file = parse(FULL);
        file.save(&path).unwrap();
        assert_eq!(SetupFile::load(&path).unwrap(), file);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = SetupFile::load("/nonexistent/rivulet/setup.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
