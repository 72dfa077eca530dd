//! Routing and utility processors: pass-through, constant and gain.

use vectra_core::{BuildError, Inputs, ParamValue, ProcessContext, Processor, ProcessorConfig, SignalBuffer};

/// Copies `in` to `out` unchanged.
#[derive(Debug, Default)]
pub struct PassThrough;

impl Processor for PassThrough {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        inputs.get(0).copy_to(outputs[0].row_mut(0));
    }
}

/// Outputs a fixed value.
///
/// Attribute and parameter: `value` (default 0).
#[derive(Debug, Default)]
pub struct Constant {
    value: f32,
}

impl Constant {
    /// A constant source.
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Processor for Constant {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        match (name, value.as_scalar()) {
            ("value", Some(v)) => {
                self.value = v;
                true
            }
            _ => false,
        }
    }

    fn process(&mut self, _: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        outputs[0].row_mut(0).fill(self.value);
    }
}

/// Scales `in` by `gain`.
///
/// Attribute and parameter: `gain` (linear, default 1).
#[derive(Debug)]
pub struct Gain {
    gain: f32,
}

impl Gain {
    /// A gain stage.
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }
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

pub(crate) fn make_pass(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(PassThrough))
}

pub(crate) fn make_constant(config: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Constant::new(config.attr_float("value", 0.0)? as f32)))
}

pub(crate) fn make_gain(config: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Gain::new(config.attr_float("gain", 1.0)? as f32)))
}
