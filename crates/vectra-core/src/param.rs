//! Processor parameter values.
//!
//! Parameters are either a single number or a small row-major matrix (used by
//! matrix mixers). Both forms deserialize straight from patch files:
//! `gain = 0.5` or `matrix = { rows = 2, cols = 2, data = [1, 0, 0, 1] }`.

use serde::{Deserialize, Serialize};

/// A row-major matrix parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamMatrix {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
    /// `rows * cols` values, row-major.
    pub data: Vec<f32>,
}

impl ParamMatrix {
    /// Builds a zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Value at `(row, col)`, or zero outside the matrix or a short `data`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        if row >= self.rows || col >= self.cols {
            return 0.0;
        }
        self.data.get(row * self.cols + col).copied().unwrap_or(0.0)
    }

    /// Returns true if `data` holds exactly `rows * cols` values.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.rows * self.cols
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A single number.
    Scalar(f32),
    /// A matrix.
    Matrix(ParamMatrix),
}

impl ParamValue {
    /// The scalar value, if this is one.
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Matrix(_) => None,
        }
    }

    /// The matrix value, if this is one.
    pub fn as_matrix(&self) -> Option<&ParamMatrix> {
        match self {
            Self::Scalar(_) => None,
            Self::Matrix(m) => Some(m),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Scalar(v)
    }
}

impl From<ParamMatrix> for ParamValue {
    fn from(m: ParamMatrix) -> Self {
        Self::Matrix(m)
    }
}

/// The last value applied to each parameter of a node.
///
/// Slots are laid out from the class's declared parameter names when the
/// node is built, so recording a value later only swaps it into place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    names: &'static [&'static str],
    values: Vec<Option<ParamValue>>,
}

impl ParamSet {
    /// An empty slot for each of `names`.
    pub fn new(names: &'static [&'static str]) -> Self {
        Self {
            names,
            values: vec![None; names.len()],
        }
    }

    /// Declared parameter names.
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Slot index of `name`.
    pub fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    /// The recorded value for `name`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(self.index(name)?)?.as_ref()
    }

    /// Stores `value` in slot `index` and returns what it held. Hands
    /// `value` back as the error if there is no such slot.
    pub fn replace(
        &mut self,
        index: usize,
        value: ParamValue,
    ) -> Result<Option<ParamValue>, ParamValue> {
        match self.values.get_mut(index) {
            Some(slot) => Ok(slot.replace(value)),
            None => Err(value),
        }
    }

    /// Recorded values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> + '_ {
        self.names
            .iter()
            .zip(&self.values)
            .filter_map(|(&name, value)| Some((name, value.as_ref()?)))
    }

    /// Number of recorded parameters.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
