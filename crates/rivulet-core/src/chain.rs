//! Ordered operator pipeline with its own buffer.
//!
//! A [`Chain`] refers to its input and output audio objects by index into
//! the engine's object tables; it never calls them itself. The engine fills
//! [`buffer_mut`](Chain::buffer_mut) before [`process`](Chain::process) and
//! reads [`buffer`](Chain::buffer) afterwards.

use crate::buffer::AudioBuffer;
use crate::error::ChainError;
use crate::operator::ChainOperator;

/// A named pipeline of [`ChainOperator`]s bound to one input and at most one
/// output.
pub struct Chain {
    name: String,
    operators: Vec<Box<dyn ChainOperator>>,
    buffer: AudioBuffer,
    input: Option<usize>,
    output: Option<usize>,
    muted: bool,
    bypassed: bool,
    effects_enabled: bool,
    connected: bool,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field(
                "operators",
                &self.operators.iter().map(|op| op.name()).collect::<Vec<_>>(),
            )
            .field("input", &self.input)
            .field("output", &self.output)
            .field("muted", &self.muted)
            .field("bypassed", &self.bypassed)
            .finish_non_exhaustive()
    }
}

impl Chain {
    /// Creates an unbound chain with no operators.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operators: Vec::new(),
            buffer: AudioBuffer::with_capacity(0, 0, 0),
            input: None,
            output: None,
            muted: false,
            bypassed: false,
            effects_enabled: true,
            connected: false,
        }
    }

    /// Chain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds the chain to input object `index`.
    pub fn connect_input(&mut self, index: usize) {
        self.input = Some(index);
    }

    /// Binds the chain to output object `index`.
    pub fn connect_output(&mut self, index: usize) {
        self.output = Some(index);
    }

    /// Removes the output binding; the chain stops contributing to mixes.
    pub fn disconnect_output(&mut self) {
        self.output = None;
    }

    /// Bound input index.
    pub fn input(&self) -> Option<usize> {
        self.input
    }

    /// Bound output index.
    pub fn output(&self) -> Option<usize> {
        self.output
    }

    /// A chain without an input cannot run.
    pub fn is_valid(&self) -> bool {
        self.input.is_some()
    }

    /// Marks the chain as attached to (or released from) a running engine.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Whether a running engine currently owns the chain.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Appends an operator.
    pub fn add_operator(&mut self, operator: Box<dyn ChainOperator>) -> Result<(), ChainError> {
        if self.connected {
            return Err(ChainError::Connected(self.name.clone()));
        }
        self.operators.push(operator);
        Ok(())
    }

    /// Removes operator `index` (1-based) and returns it.
    pub fn remove_operator(&mut self, index: usize) -> Result<Box<dyn ChainOperator>, ChainError> {
        if self.connected {
            return Err(ChainError::Connected(self.name.clone()));
        }
        if index == 0 || index > self.operators.len() {
            return Err(ChainError::NoSuchOperator {
                chain: self.name.clone(),
                index,
            });
        }
        Ok(self.operators.remove(index - 1))
    }

    /// Number of operators.
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Operator `index` (1-based).
    pub fn operator(&self, index: usize) -> Option<&dyn ChainOperator> {
        index
            .checked_sub(1)
            .and_then(|i| self.operators.get(i))
            .map(|op| &**op)
    }

    /// Mutable operator `index` (1-based).
    pub fn operator_mut(&mut self, index: usize) -> Option<&mut (dyn ChainOperator + 'static)> {
        let i = index.checked_sub(1)?;
        self.operators.get_mut(i).map(|op| &mut **op)
    }

    /// Whether the output is forced to silence.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Mutes or unmutes.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Flips the mute flag.
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Whether operator processing is skipped.
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Enables or disables operator processing for this chain.
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    /// Flips the bypass flag.
    pub fn toggle_bypass(&mut self) {
        self.bypassed = !self.bypassed;
    }

    /// Engine-wide effects switch, independent of the chain's own bypass.
    pub fn set_effects_enabled(&mut self, enabled: bool) {
        self.effects_enabled = enabled;
    }

    /// The chain's buffer.
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// The chain's buffer, for the engine to fill.
    pub fn buffer_mut(&mut self) -> &mut AudioBuffer {
        &mut self.buffer
    }

    /// Prepares the buffer and initializes every operator in order,
    /// threading channel count changes through the pipeline.
    pub fn init(&mut self, channels: usize, sample_rate: u32, buffersize: usize) {
        self.buffer.reserve(buffersize);
        self.buffer.set_channel_count(channels);
        self.buffer.set_sample_rate(sample_rate);
        let mut current = channels;
        for op in &mut self.operators {
            op.init(current, sample_rate);
            current = op.output_channels(current);
        }
    }

    /// Runs the pipeline over the buffer.
    ///
    /// Bypassed chains (or all chains with effects disabled) leave the
    /// buffer untouched. Muted chains end with a silent buffer.
    ///
    /// The chain must be bound to an input; setup validation guarantees
    /// this for every chain an engine runs.
    pub fn process(&mut self) {
        debug_assert!(self.is_valid(), "chain '{}' processed with no input", self.name);
        if !self.bypassed && self.effects_enabled {
            for op in &mut self.operators {
                let channels = op.output_channels(self.buffer.channel_count());
                if channels != self.buffer.channel_count() {
                    self.buffer.set_channel_count(channels);
                }
                op.process(&mut self.buffer);
            }
        }
        if self.muted {
            self.buffer.make_silent();
        }
    }
}
