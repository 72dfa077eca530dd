//! Matrix mixer used as the per-voice patcher.
//!
//! `out_j = sum_i matrix[i][j] * in_i`, with rows indexed by input and
//! columns by output. Starts as the identity, so an unconfigured patcher
//! passes `in_k` to `out_k`.

use vectra_core::{
    BuildError, Inputs, ParamMatrix, ParamValue, ProcessContext, Processor, ProcessorConfig,
    SignalBuffer,
};

/// Inputs and outputs of the patcher.
pub const PATCHER_SIZE: usize = 4;

/// 4x4 matrix mixer.
#[derive(Debug)]
pub struct Patcher {
    matrix: ParamMatrix,
}

impl Patcher {
    /// An identity patcher.
    pub fn new() -> Self {
        let mut matrix = ParamMatrix::zeros(PATCHER_SIZE, PATCHER_SIZE);
        for i in 0..PATCHER_SIZE {
            matrix.data[i * PATCHER_SIZE + i] = 1.0;
        }
        Self { matrix }
    }

    /// The current routing matrix.
    pub fn matrix(&self) -> &ParamMatrix {
        &self.matrix
    }
}

impl Default for Patcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Patcher {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        match (name, value.as_matrix()) {
            ("matrix", Some(m))
                if m.rows == PATCHER_SIZE && m.cols == PATCHER_SIZE && m.is_well_formed() =>
            {
                self.matrix.data.copy_from_slice(&m.data);
                true
            }
            _ => false,
        }
    }

    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        for (j, output) in outputs.iter_mut().enumerate().take(PATCHER_SIZE) {
            let row = output.row_mut(0);
            row.fill(0.0);
            for i in 0..PATCHER_SIZE {
                let weight = self.matrix.get(i, j);
                let input = inputs.get(i);
                if weight == 0.0 || !input.is_connected() {
                    continue;
                }
                for (n, out) in row.iter_mut().enumerate() {
                    *out += weight * input.value(n);
                }
            }
        }
    }
}

pub(crate) fn make_patcher(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
    Ok(Box::new(Patcher::new()))
}
