//! Sine oscillator.

use core::f32::consts::TAU;

use libm::{floorf, sinf};
use vectra_core::{BuildError, Inputs, ParamValue, ProcessContext, Processor, ProcessorConfig, SignalBuffer};

/// Sine oscillator with phase held in [0, 1).
///
/// Frequency comes from the `freq` input when it is connected, otherwise from
/// the `freq` attribute/parameter (Hz, default 440). `reset` returns the phase
/// to zero.
#[derive(Debug)]
pub struct Sine {
    freq: f32,
    phase: f32,
    sample_rate: f32,
}

impl Sine {
    /// An oscillator at `freq` Hz.
    pub fn new(freq: f32) -> Self {
        Self {
            freq,
            phase: 0.0,
            sample_rate: 48000.0,
        }
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }
}

impl Processor for Sine {
    fn prepare(&mut self, ctx: &ProcessContext) {
        self.sample_rate = ctx.sample_rate;
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        match (name, value.as_scalar()) {
            ("freq", Some(f)) => {
                self.freq = f;
                true
            }
            _ => false,
        }
    }

    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        let freq = inputs.get(0);
        let inv_rate = 1.0 / self.sample_rate;
        for (i, out) in outputs[0].row_mut(0).iter_mut().enumerate() {
            *out = sinf(self.phase * TAU);
            self.phase += freq.value_or(i, self.freq) * inv_rate;
            self.phase -= floorf(self.phase);
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

pub(crate) fn make_sine(config: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Sine::new(config.attr_float("freq", 440.0)? as f32)))
}
