//! Engine error taxonomy.
//!
//! - [`SetupError`]: the topology or configuration cannot run. Always
//!   returned before the first cycle.
//! - [`EngineError::RuntimeIo`]: an audio object failed mid-run. The engine
//!   logs it, treats the object as finished and keeps going; this variant
//!   only escapes when a caller-driven operation (such as a realtime
//!   `start()`) fails directly.
//! - [`EngineError::Transport`]: some objects could not be repositioned.
//! - [`EngineError::ConcurrencyFault`]: the submix handshake broke. Fatal.

use rivulet_core::{ChainError, ObjectError, OperatorError};

use crate::command::CommandKind;

/// Invalid or unsupported topology and configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// No chains were defined.
    #[error("no chains configured")]
    NoChains,

    /// No input objects were defined.
    #[error("no inputs configured")]
    NoInputs,

    /// No output objects were defined.
    #[error("no outputs configured")]
    NoOutputs,

    /// A chain is not bound to any input.
    #[error("chain '{0}' has no input")]
    ChainWithoutInput(String),

    /// A chain refers to an object index that does not exist.
    #[error("chain '{chain}' refers to missing {kind} {index}")]
    UnknownObject {
        /// Chain name.
        chain: String,
        /// `"input"` or `"output"`.
        kind: &'static str,
        /// Offending index.
        index: usize,
    },

    /// Buffer size of zero.
    #[error("buffersize must be at least one frame")]
    ZeroBuffersize,

    /// Sample rate of zero.
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    /// Handshake or poll interval of zero.
    #[error("{0} must be positive")]
    ZeroInterval(&'static str),

    /// A length bound that is negative or not finite.
    #[error("invalid length {0} seconds")]
    InvalidLength(f64),

    /// An operator refused its configured parameter.
    #[error(transparent)]
    Operator(#[from] OperatorError),

    /// A chain could not be edited.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Multitrack sync needs exactly one realtime input and one realtime
    /// output to measure device latency.
    #[error(
        "multitrack sync supports one realtime input and one realtime output, found {inputs} and {outputs}"
    )]
    UnsupportedRealtimeTopology {
        /// Realtime inputs found.
        inputs: usize,
        /// Realtime outputs found.
        outputs: usize,
    },

    /// A realtime device failed to prepare.
    #[error("failed to prepare '{label}'")]
    Device {
        /// Object label.
        label: String,
        /// Device error.
        #[source]
        source: ObjectError,
    },

    /// Multitrack sync found the output ahead of the input.
    #[error("multitrack sync measured a negative offset of {0} frames")]
    NegativeSyncOffset(i64),
}

/// Problems building or sending a control command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// The command needs a numeric payload.
    #[error("'{0}' requires a value")]
    MissingValue(CommandKind),

    /// The command takes no payload.
    #[error("'{0}' takes no value")]
    UnexpectedValue(CommandKind),

    /// The payload is out of range for the command.
    #[error("'{kind}' cannot take {value}")]
    InvalidValue {
        /// Command kind.
        kind: CommandKind,
        /// Offending value.
        value: f64,
    },

    /// Text that names no command.
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// The payload text is not a number.
    #[error("'{0}' is not a number")]
    NotANumber(String),

    /// The engine owning the queue is gone.
    #[error("engine is no longer accepting commands")]
    Disconnected,
}

/// Everything that can go wrong while the engine runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration or topology problem.
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// An audio object failed outside the cycle loop.
    #[error("runtime I/O error: {0}")]
    RuntimeIo(#[from] ObjectError),

    /// Some objects could not be repositioned.
    #[error("{failed} of {attempted} objects could not be repositioned")]
    Transport {
        /// Objects whose seek failed.
        failed: usize,
        /// Objects a seek was attempted on.
        attempted: usize,
    },

    /// The submix handshake broke down.
    #[error("concurrency fault on chain {chain}: {detail}")]
    ConcurrencyFault {
        /// Chain index involved.
        chain: usize,
        /// What went wrong.
        detail: String,
    },

    /// The submix worker thread could not be spawned.
    #[error("failed to spawn submix worker")]
    Spawn(#[source] std::io::Error),

    /// Invalid control command.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl EngineError {
    /// Whether the run cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConcurrencyFault { .. } | Self::Spawn(_))
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
