//! Two-input arithmetic.
//!
//! Unconnected inputs take the operation's identity (0 for add, 1 for
//! multiply and for the divisor), so a half-wired node passes its other input.

use vectra_core::{BuildError, Inputs, ProcessContext, Processor, ProcessorConfig, SignalBuffer};

/// Divisors smaller than this produce silence instead of huge values.
const MIN_DIVISOR: f32 = 1e-12;

/// Which operation a [`Binary`] node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `in1 + in2`
    Add,
    /// `in1 * in2`
    Multiply,
    /// `in1 / in2`
    Divide,
}

impl BinaryOp {
    fn identity(self) -> f32 {
        match self {
            Self::Add => 0.0,
            Self::Multiply | Self::Divide => 1.0,
        }
    }

    #[inline]
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Multiply => a * b,
            Self::Divide => {
                if b.abs() < MIN_DIVISOR {
                    0.0
                } else {
                    a / b
                }
            }
        }
    }
}

/// Elementwise binary operation over `in1` and `in2`.
#[derive(Debug)]
pub struct Binary {
    op: BinaryOp,
}

impl Binary {
    /// A node applying `op`.
    pub fn new(op: BinaryOp) -> Self {
        Self { op }
    }
}

impl Processor for Binary {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        let identity = self.op.identity();
        let (a, b) = (inputs.get(0), inputs.get(1));
        for (i, out) in outputs[0].row_mut(0).iter_mut().enumerate() {
            *out = self.op.apply(a.value_or(i, identity), b.value_or(i, identity));
        }
    }
}

pub(crate) fn make_add(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Binary::new(BinaryOp::Add)))
}

pub(crate) fn make_multiply(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Binary::new(BinaryOp::Multiply)))
}

pub(crate) fn make_divide(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Binary::new(BinaryOp::Divide)))
}
