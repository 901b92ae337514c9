//! Topology description handed to [`Engine::new`](crate::Engine::new).
//!
//! A [`Setup`] owns the input objects, the output objects and the chains
//! that connect them. Chains refer to objects by the index returned from
//! [`Setup::add_input`] / [`Setup::add_output`].

use rivulet_core::{AudioObject, Chain};

use crate::error::SetupError;
use crate::mixmode::TopologySummary;

/// Objects and chains for one engine.
#[derive(Default)]
pub struct Setup {
    pub(crate) inputs: Vec<Box<dyn AudioObject>>,
    pub(crate) outputs: Vec<Box<dyn AudioObject>>,
    pub(crate) chains: Vec<Chain>,
}

impl std::fmt::Debug for Setup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setup")
            .field(
                "inputs",
                &self.inputs.iter().map(|o| o.label()).collect::<Vec<_>>(),
            )
            .field(
                "outputs",
                &self.outputs.iter().map(|o| o.label()).collect::<Vec<_>>(),
            )
            .field("chains", &self.chains)
            .finish()
    }
}

impl Setup {
    /// Creates an empty setup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an input object and returns its index.
    pub fn add_input(&mut self, object: impl AudioObject + 'static) -> usize {
        self.add_input_boxed(Box::new(object))
    }

    /// Adds an already boxed input object.
    pub fn add_input_boxed(&mut self, object: Box<dyn AudioObject>) -> usize {
        self.inputs.push(object);
        self.inputs.len() - 1
    }

    /// Adds an output object and returns its index.
    pub fn add_output(&mut self, object: impl AudioObject + 'static) -> usize {
        self.add_output_boxed(Box::new(object))
    }

    /// Adds an already boxed output object.
    pub fn add_output_boxed(&mut self, object: Box<dyn AudioObject>) -> usize {
        self.outputs.push(object);
        self.outputs.len() - 1
    }

    /// Adds a chain and returns its index.
    pub fn add_chain(&mut self, chain: Chain) -> usize {
        self.chains.push(chain);
        self.chains.len() - 1
    }

    /// Mutable access to a chain before the engine takes ownership.
    pub fn chain_mut(&mut self, index: usize) -> Option<&mut Chain> {
        self.chains.get_mut(index)
    }

    /// Chains in processing order.
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Input objects.
    pub fn inputs(&self) -> impl Iterator<Item = &dyn AudioObject> {
        self.inputs.iter().map(|o| &**o)
    }

    /// Output objects.
    pub fn outputs(&self) -> impl Iterator<Item = &dyn AudioObject> {
        self.outputs.iter().map(|o| &**o)
    }

    /// Counts used for mixmode selection.
    pub fn summary(&self) -> TopologySummary {
        TopologySummary {
            chains: self.chains.len(),
            inputs: self.inputs.len(),
            outputs: self.outputs.len(),
            realtime_inputs: self.inputs.iter().filter(|o| o.is_realtime()).count(),
            realtime_outputs: self.outputs.iter().filter(|o| o.is_realtime()).count(),
        }
    }

    /// Checks that every chain is bound to objects that exist.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.chains.is_empty() {
            return Err(SetupError::NoChains);
        }
        if self.inputs.is_empty() {
            return Err(SetupError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(SetupError::NoOutputs);
        }
        for chain in &self.chains {
            let Some(input) = chain.input() else {
                return Err(SetupError::ChainWithoutInput(chain.name().to_string()));
            };
            if input >= self.inputs.len() {
                return Err(SetupError::UnknownObject {
                    chain: chain.name().to_string(),
                    kind: "input",
                    index: input,
                });
            }
            if let Some(output) = chain.output()
                && output >= self.outputs.len()
            {
                return Err(SetupError::UnknownObject {
                    chain: chain.name().to_string(),
                    kind: "output",
                    index: output,
                });
            }
        }
        Ok(())
    }
}
