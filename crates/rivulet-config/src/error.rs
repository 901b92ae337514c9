//! Error types for setup files.

use std::path::PathBuf;

use rivulet_core::{ObjectError, OperatorError};
use rivulet_engine::SetupError;
use thiserror::Error;

/// Errors raised while loading a setup file or building an engine from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Operator kind missing from the registry
    #[error("{entry}: unknown operator '{kind}'")]
    UnknownOperator {
        /// Table entry naming the operator, e.g. `chain 'lead'`.
        entry: String,
        /// Requested kind.
        kind: String,
    },

    /// Operator refused a configured parameter
    #[error("{entry}: {source}")]
    InvalidParameter {
        /// Table entry naming the operator.
        entry: String,
        /// Rejection from the operator.
        #[source]
        source: OperatorError,
    },

    /// An entry is well-formed TOML but makes no sense
    #[error("{entry}: {reason}")]
    Validation {
        /// Offending table entry, e.g. `input 2`.
        entry: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An object could not be opened or created
    #[error("{entry}: {source}")]
    Object {
        /// Table entry describing the object.
        entry: String,
        /// Failure from the object.
        #[source]
        source: ObjectError,
    },

    /// The engine refused the assembled setup
    #[error(transparent)]
    Setup(#[from] SetupError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error for `entry`.
    pub fn validation(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Validation {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an object failure with the entry that described the object.
    pub fn object(entry: impl Into<String>, source: ObjectError) -> Self {
        ConfigError::Object {
            entry: entry.into(),
            source,
        }
    }
}
