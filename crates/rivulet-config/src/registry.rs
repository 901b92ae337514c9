//! Operator registry and factory.
//!
//! Setup files name operators by id; the registry turns an id into a fresh
//! [`ChainOperator`] with default parameters and describes what each one
//! accepts for `rivulet operators`.

use rivulet_core::operator::ParamSpec;
use rivulet_core::ops::{Amplify, ChannelCopy, Pan};
use rivulet_core::ChainOperator;

/// Describes an operator in the registry.
#[derive(Debug, Clone)]
pub struct OperatorDescriptor {
    /// Identifier used in setup files (lowercase, no spaces).
    pub id: &'static str,
    /// Brief description of the operator.
    pub description: &'static str,
}

/// Factory function type for creating operators.
type OperatorFactory = fn() -> Box<dyn ChainOperator>;

struct RegistryEntry {
    descriptor: OperatorDescriptor,
    factory: OperatorFactory,
}

/// Registry of the operators a setup file may name.
pub struct OperatorRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.descriptor.id))
            .finish()
    }
}

impl OperatorRegistry {
    /// Create a registry with the built-in operators registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(3),
        };
        registry.register(
            OperatorDescriptor {
                id: "amplify",
                description: "Scale every channel by a percentage gain",
            },
            || Box::new(Amplify::default()),
        );
        registry.register(
            OperatorDescriptor {
                id: "channel_copy",
                description: "Copy one channel over another, widening the buffer if needed",
            },
            || Box::new(ChannelCopy::default()),
        );
        registry.register(
            OperatorDescriptor {
                id: "pan",
                description: "Linear stereo balance between the first two channels",
            },
            || Box::new(Pan::default()),
        );
        registry
    }

    /// Register an operator. A later registration with the same id wins.
    pub fn register(&mut self, descriptor: OperatorDescriptor, factory: OperatorFactory) {
        self.entries.retain(|e| e.descriptor.id != descriptor.id);
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// All registered operators, in registration order.
    pub fn all_operators(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Look up an operator by id.
    pub fn get(&self, id: &str) -> Option<&OperatorDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Create an operator with default parameters.
    pub fn create(&self, id: &str) -> Option<Box<dyn ChainOperator>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.factory)())
    }

    /// Parameter descriptions of an operator, 1-based order.
    ///
    /// Creates a temporary instance to read them.
    pub fn param_specs(&self, id: &str) -> Option<Vec<ParamSpec>> {
        let op = self.create(id)?;
        Some(
            (1..=op.parameter_count())
                .filter_map(|i| op.parameter_spec(i))
                .collect(),
        )
    }

    /// Returns the number of registered operators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
