//! Built-in chain operators.
//!
//! These cover gain staging and channel routing, enough for configuration
//! files and tests to build meaningful chains without a plugin host.

use crate::buffer::AudioBuffer;
use crate::error::OperatorError;
use crate::operator::{ChainOperator, ParamSpec};

fn no_such(operator: &str, index: usize) -> OperatorError {
    OperatorError::NoSuchParameter {
        operator: operator.to_string(),
        index,
    }
}

// ---------------------------------------------------------------------------
// Amplify
// ---------------------------------------------------------------------------

const AMPLIFY_PARAMS: [ParamSpec; 1] = [ParamSpec::new("gain-%", 0.0, 10_000.0, 100.0)];

/// Scales every channel by a percentage gain (`100` = unity).
#[derive(Debug, Clone)]
pub struct Amplify {
    gain_percent: f64,
}

impl Amplify {
    /// Creates an amplifier. Out-of-range gains are clamped.
    pub fn new(gain_percent: f64) -> Self {
        let spec = AMPLIFY_PARAMS[0];
        Self {
            gain_percent: gain_percent.clamp(spec.min, spec.max),
        }
    }
}

impl Default for Amplify {
    fn default() -> Self {
        Self::new(AMPLIFY_PARAMS[0].default)
    }
}

impl ChainOperator for Amplify {
    fn name(&self) -> &str {
        "amplify"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let gain = (self.gain_percent / 100.0) as f32;
        for ch in buffer.channels_mut() {
            for s in ch {
                *s *= gain;
            }
        }
    }

    fn parameter_count(&self) -> usize {
        AMPLIFY_PARAMS.len()
    }

    fn parameter_spec(&self, index: usize) -> Option<ParamSpec> {
        index.checked_sub(1).and_then(|i| AMPLIFY_PARAMS.get(i).copied())
    }

    fn get_parameter(&self, index: usize) -> Option<f64> {
        (index == 1).then_some(self.gain_percent)
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), OperatorError> {
        let spec = self.parameter_spec(index).ok_or_else(|| no_such("amplify", index))?;
        self.gain_percent = spec.validate("amplify", index, value)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelCopy
// ---------------------------------------------------------------------------

const CHANNEL_COPY_PARAMS: [ParamSpec; 2] = [
    ParamSpec::new("from-channel", 1.0, 64.0, 1.0),
    ParamSpec::new("to-channel", 1.0, 64.0, 2.0),
];

/// Copies one channel over another, widening the buffer when the target
/// channel does not exist yet. Channels are numbered from 1.
#[derive(Debug, Clone)]
pub struct ChannelCopy {
    from: usize,
    to: usize,
}

impl ChannelCopy {
    /// Creates a copier from channel `from` to channel `to` (1-based).
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from: from.clamp(1, 64),
            to: to.clamp(1, 64),
        }
    }
}

impl Default for ChannelCopy {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

impl ChainOperator for ChannelCopy {
    fn name(&self) -> &str {
        "channel_copy"
    }

    fn output_channels(&self, input: usize) -> usize {
        input.max(self.to)
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let (from, to) = (self.from - 1, self.to - 1);
        if from == to || to >= buffer.channel_count() {
            return;
        }
        if from >= buffer.channel_count() {
            buffer.channel_mut(to).fill(0.0);
            return;
        }
        for i in 0..buffer.len() {
            let s = buffer.channel(from)[i];
            buffer.channel_mut(to)[i] = s;
        }
    }

    fn parameter_count(&self) -> usize {
        CHANNEL_COPY_PARAMS.len()
    }

    fn parameter_spec(&self, index: usize) -> Option<ParamSpec> {
        index
            .checked_sub(1)
            .and_then(|i| CHANNEL_COPY_PARAMS.get(i).copied())
    }

    fn get_parameter(&self, index: usize) -> Option<f64> {
        match index {
            1 => Some(self.from as f64),
            2 => Some(self.to as f64),
            _ => None,
        }
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), OperatorError> {
        let spec = self
            .parameter_spec(index)
            .ok_or_else(|| no_such("channel_copy", index))?;
        let channel = spec.validate("channel_copy", index, value)?.round() as usize;
        if index == 1 {
            self.from = channel;
        } else {
            self.to = channel;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pan
// ---------------------------------------------------------------------------

const PAN_PARAMS: [ParamSpec; 1] = [ParamSpec::new("right-%", 0.0, 100.0, 50.0)];

/// Linear stereo balance: `0` is hard left, `50` centre, `100` hard right.
///
/// Only the first two channels are touched; mono buffers pass unchanged.
#[derive(Debug, Clone)]
pub struct Pan {
    right_percent: f64,
}

impl Pan {
    /// Creates a panner at the given position.
    pub fn new(right_percent: f64) -> Self {
        Self {
            right_percent: right_percent.clamp(0.0, 100.0),
        }
    }

    fn gains(&self) -> (f32, f32) {
        let p = self.right_percent;
        let left = ((100.0 - p) / 50.0).min(1.0);
        let right = (p / 50.0).min(1.0);
        (left as f32, right as f32)
    }
}

impl Default for Pan {
    fn default() -> Self {
        Self::new(PAN_PARAMS[0].default)
    }
}

impl ChainOperator for Pan {
    fn name(&self) -> &str {
        "pan"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if buffer.channel_count() < 2 {
            return;
        }
        let (left, right) = self.gains();
        for s in buffer.channel_mut(0) {
            *s *= left;
        }
        for s in buffer.channel_mut(1) {
            *s *= right;
        }
    }

    fn parameter_count(&self) -> usize {
        PAN_PARAMS.len()
    }

    fn parameter_spec(&self, index: usize) -> Option<ParamSpec> {
        index.checked_sub(1).and_then(|i| PAN_PARAMS.get(i).copied())
    }

    fn get_parameter(&self, index: usize) -> Option<f64> {
        (index == 1).then_some(self.right_percent)
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), OperatorError> {
        let spec = self.parameter_spec(index).ok_or_else(|| no_such("pan", index))?;
        self.right_percent = spec.validate("pan", index, value)?;
        Ok(())
    }
}
