//! Processor class registry.
//!
//! The graph builder resolves every class tag in a description through a
//! [`ProcessorRegistry`]. Each entry pairs a [`ProcessorDescriptor`] (class
//! name, port names, category) with a factory function. Unknown tags are a
//! build error, never silently skipped.
//!
//! The engine's singleton nodes (`the_host_inputs`, `the_midi_inputs`,
//! `the_host_phasor`) are created by the builder directly and do not need
//! registry entries.

use crate::error::BuildError;
use crate::processor::{Processor, ProcessorConfig};

/// Broad grouping of processor classes, used for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorCategory {
    /// Signal sources (oscillators, constants).
    Generator,
    /// Sample-wise arithmetic.
    Arithmetic,
    /// Mixing and routing.
    Routing,
    /// Everything else.
    Utility,
}

impl ProcessorCategory {
    /// Returns a human-readable name for the category.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessorCategory::Generator => "Generator",
            ProcessorCategory::Arithmetic => "Arithmetic",
            ProcessorCategory::Routing => "Routing",
            ProcessorCategory::Utility => "Utility",
        }
    }
}

/// Factory function type for creating processors.
pub type ProcessorFactory = fn(&ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError>;

/// Describes a processor class.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorDescriptor {
    /// Class tag used in graph descriptions.
    pub class: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for listing.
    pub category: ProcessorCategory,
    /// Input names in port order.
    pub inputs: &'static [&'static str],
    /// Output names in port order.
    pub outputs: &'static [&'static str],
    /// Parameter names the class accepts.
    pub params: &'static [&'static str],
}

impl ProcessorDescriptor {
    /// Index of the named input.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|n| *n == name)
    }

    /// Index of the named output.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|n| *n == name)
    }

    /// Index of the named parameter.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|n| *n == name)
    }
}

struct RegistryEntry {
    descriptor: ProcessorDescriptor,
    factory: ProcessorFactory,
}

/// Registry of processor classes.
#[derive(Default)]
pub struct ProcessorRegistry {
    entries: Vec<RegistryEntry>,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class. A later registration under the same tag replaces the earlier one.
    pub fn register(&mut self, descriptor: ProcessorDescriptor, factory: ProcessorFactory) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.class == descriptor.class)
        {
            entry.descriptor = descriptor;
            entry.factory = factory;
            return;
        }
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Descriptor for a class tag.
    pub fn get(&self, class: &str) -> Option<&ProcessorDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.class == class)
            .map(|e| &e.descriptor)
    }

    /// Returns true if the class is registered.
    pub fn contains(&self, class: &str) -> bool {
        self.get(class).is_some()
    }

    /// Instantiates a class.
    pub fn create(
        &self,
        config: &ProcessorConfig<'_>,
    ) -> Result<(ProcessorDescriptor, Box<dyn Processor>), BuildError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.class == config.class)
            .ok_or_else(|| BuildError::UnknownClass {
                class: config.class.to_string(),
                path: config.path.to_string(),
            })?;
        let processor = (entry.factory)(config)?;
        Ok((entry.descriptor, processor))
    }

    /// Descriptors in registration order.
    pub fn all(&self) -> Vec<&ProcessorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Descriptors in one category.
    pub fn in_category(&self, category: ProcessorCategory) -> Vec<&ProcessorDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
