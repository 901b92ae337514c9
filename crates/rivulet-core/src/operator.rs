//! The in-place processing contract consumed by chains.
//!
//! Parameters are addressed with 1-based indices and carried as `f64`.
//! Operators must accept parameter reads and writes between cycles, while
//! they are not processing. Each parameter is described by a [`ParamSpec`],
//! which also provides the range check most operators want.

use crate::buffer::AudioBuffer;
use crate::error::OperatorError;

/// Static description of one operator parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Display name, e.g. `"gain-%"`.
    pub name: &'static str,
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
    /// Value after construction.
    pub default: f64,
}

impl ParamSpec {
    /// Creates a parameter description.
    pub const fn new(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    /// Accepts finite values inside `[min, max]`.
    pub fn validate(&self, operator: &str, index: usize, value: f64) -> Result<f64, OperatorError> {
        if !value.is_finite() {
            return Err(OperatorError::Rejected {
                operator: operator.to_string(),
                index,
                value,
                reason: "value is not finite".into(),
            });
        }
        if value < self.min || value > self.max {
            return Err(OperatorError::Rejected {
                operator: operator.to_string(),
                index,
                value,
                reason: format!("{} must be within {}..={}", self.name, self.min, self.max),
            });
        }
        Ok(value)
    }
}

/// A signal-processing stage applied in place to a chain's buffer.
pub trait ChainOperator: Send {
    /// Registry name of the operator.
    fn name(&self) -> &str;

    /// Called before the first cycle with the incoming channel count and
    /// engine sample rate.
    fn init(&mut self, channels: usize, sample_rate: u32) {
        let _ = (channels, sample_rate);
    }

    /// Channel count this operator produces for `input` channels.
    ///
    /// The chain resizes the buffer to this count before calling
    /// [`process`](Self::process).
    fn output_channels(&self, input: usize) -> usize {
        input
    }

    /// Processes the buffer's valid frames in place.
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Number of parameters.
    fn parameter_count(&self) -> usize;

    /// Description of parameter `index` (1-based).
    fn parameter_spec(&self, index: usize) -> Option<ParamSpec>;

    /// Current value of parameter `index` (1-based).
    fn get_parameter(&self, index: usize) -> Option<f64>;

    /// Sets parameter `index` (1-based).
    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), OperatorError>;

    /// Name of parameter `index` (1-based).
    fn parameter_name(&self, index: usize) -> Option<&'static str> {
        self.parameter_spec(index).map(|spec| spec.name)
    }
}
