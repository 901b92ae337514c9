//! Error types for buffer conversion, audio objects, operators and chains.
//!
//! Buffer mixing and operator processing are total, so the only failures in
//! this crate are at the edges: naming a PCM encoding that is not supported,
//! an [`AudioObject`](crate::AudioObject) failing its I/O, an operator
//! rejecting a parameter, or editing a chain while it is connected.

use std::io;

/// Errors from PCM encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The named sample encoding is unknown or has no codec.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Errors raised by an audio object at its I/O boundary.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// Underlying OS-level I/O failure.
    #[error("{label}: I/O error")]
    Io {
        /// Object label.
        label: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A file or stream codec rejected the data.
    #[error("{label}: {message}")]
    Codec {
        /// Object label.
        label: String,
        /// Codec diagnostic.
        message: String,
    },

    /// PCM conversion failed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The object cannot be positioned at the requested frame.
    #[error("{label}: cannot seek to frame {frame}")]
    Seek {
        /// Object label.
        label: String,
        /// Requested frame.
        frame: u64,
    },

    /// The object does not support the operation at all.
    #[error("{label}: {operation} is not supported")]
    Unsupported {
        /// Object label.
        label: String,
        /// Operation name.
        operation: &'static str,
    },

    /// A realtime device refused a lifecycle transition.
    #[error("{label}: device error: {message}")]
    Device {
        /// Object label.
        label: String,
        /// Device diagnostic.
        message: String,
    },
}

impl ObjectError {
    /// Wraps an I/O error with the object label.
    pub fn io(label: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            label: label.into(),
            source,
        }
    }

    /// Builds a codec error from any displayable diagnostic.
    pub fn codec(label: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Codec {
            label: label.into(),
            message: message.to_string(),
        }
    }
}

/// Errors from operator parameter access.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperatorError {
    /// Parameter index outside `1..=parameter_count()`.
    #[error("{operator}: no parameter {index}")]
    NoSuchParameter {
        /// Operator name.
        operator: String,
        /// Requested 1-based index.
        index: usize,
    },

    /// The operator refused the value.
    #[error("{operator}: parameter {index} rejects {value}: {reason}")]
    Rejected {
        /// Operator name.
        operator: String,
        /// 1-based parameter index.
        index: usize,
        /// Offending value.
        value: f64,
        /// Why it was refused.
        reason: String,
    },
}

/// Errors from editing a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Operators cannot be added or removed while the chain is attached to a
    /// running engine.
    #[error("chain '{0}' is connected to a running engine")]
    Connected(String),

    /// Operator index outside `1..=operator_count()`.
    #[error("chain '{chain}' has no operator {index}")]
    NoSuchOperator {
        /// Chain name.
        chain: String,
        /// Requested 1-based index.
        index: usize,
    },
}
