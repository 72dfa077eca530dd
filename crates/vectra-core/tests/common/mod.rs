//! Processors and helpers shared by the integration tests.

#![allow(dead_code)]

use vectra_core::{
    BuildError, Inputs, ParamValue, ProcessContext, Processor, ProcessorCategory,
    ProcessorConfig, ProcessorDescriptor, ProcessorRegistry, SignalBuffer,
};

/// Copies `in` to `out`.
pub struct Pass;

impl Processor for Pass {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        inputs.get(0).copy_to(outputs[0].row_mut(0));
    }
}

/// `out = in * gain`.
pub struct Gain {
    gain: f32,
}

impl Processor for Gain {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        match (name, value.as_scalar()) {
            ("gain", Some(g)) => {
                self.gain = g;
                true
            }
            _ => false,
        }
    }

    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        let input = inputs.get(0);
        for (i, out) in outputs[0].row_mut(0).iter_mut().enumerate() {
            *out = input.value(i) * self.gain;
        }
    }
}

/// `out = in1 + in2`.
pub struct Add;

impl Processor for Add {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        let (a, b) = (inputs.get(0), inputs.get(1));
        for (i, out) in outputs[0].row_mut(0).iter_mut().enumerate() {
            *out = a.value(i) + b.value(i);
        }
    }
}

/// Passes its input until `poison` is set, then emits NaN until reset.
pub struct Poison {
    armed: bool,
}

impl Processor for Poison {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        match (name, value.as_scalar()) {
            ("poison", Some(v)) => {
                self.armed = v != 0.0;
                true
            }
            _ => false,
        }
    }

    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        if self.armed {
            outputs[0].fill(f32::NAN);
        } else {
            inputs.get(0).copy_to(outputs[0].row_mut(0));
        }
    }

    fn reset(&mut self) {
        self.armed = false;
    }
}

fn make_pass(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Pass))
}

fn make_gain(config: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    let gain = config.attr_float("gain", 1.0)? as f32;
    Ok(Box::new(Gain { gain }))
}

fn make_add(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Add))
}

fn make_poison(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Poison { armed: false }))
}

/// A registry with `pass`, `gain`, `add` and `poison`.
pub fn test_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(
        ProcessorDescriptor {
            class: "pass",
            description: "Copies its input",
            category: ProcessorCategory::Utility,
            inputs: &["in"],
            outputs: &["out"],
            params: &[],
        },
        make_pass,
    );
    registry.register(
        ProcessorDescriptor {
            class: "gain",
            description: "Scales its input",
            category: ProcessorCategory::Arithmetic,
            inputs: &["in"],
            outputs: &["out"],
            params: &["gain"],
        },
        make_gain,
    );
    registry.register(
        ProcessorDescriptor {
            class: "add",
            description: "Sums two inputs",
            category: ProcessorCategory::Arithmetic,
            inputs: &["in1", "in2"],
            outputs: &["out"],
            params: &[],
        },
        make_add,
    );
    registry.register(
        ProcessorDescriptor {
            class: "poison",
            description: "Emits NaN on demand",
            category: ProcessorCategory::Utility,
            inputs: &["in"],
            outputs: &["out"],
            params: &["poison"],
        },
        make_poison,
    );
    registry
}

/// Runs one callback of `frames` samples with no transport.
pub fn run(
    engine: &mut vectra_core::DspEngine,
    inputs: &[&[f32]],
    outputs: &mut [Vec<f32>],
    frames: usize,
) {
    let mut slices: Vec<&mut [f32]> = outputs.iter_mut().map(|o| &mut o[..frames]).collect();
    engine.process_block(
        inputs,
        &mut slices,
        frames,
        &vectra_core::TransportInfo::default(),
    );
}
