//! The processor contract.
//!
//! A [`Processor`] is the unit of computation in a graph. The engine only
//! relies on this trait: processors declare their ports through their
//! registry descriptor, receive their inputs as [`Inputs`] and write one
//! [`SignalBuffer`] per output on every vector step.
//!
//! Inputs may be unconnected. Processors must treat an unconnected input as
//! silence (or their own default) and never fault on it.

use std::collections::BTreeMap;

use crate::description::AttrValue;
use crate::error::BuildError;
use crate::param::ParamValue;
use crate::signal::SignalBuffer;

/// Fixed context for every vector step of a compiled graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessContext {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Samples per vector step.
    pub vector_size: usize,
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            vector_size: 64,
        }
    }
}

/// Where a processor input reads from, as resolved by compilation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputBinding {
    /// Nothing connected.
    Unconnected,
    /// A constant bound in the description.
    Constant(f32),
    /// One channel of a signal slot in the graph's pool.
    Slot {
        /// Pool index.
        slot: usize,
        /// Row within the slot.
        channel: usize,
    },
}

/// The value of one input for the current vector.
#[derive(Debug, Clone, Copy)]
pub enum InputSignal<'a> {
    /// Nothing connected.
    Unconnected,
    /// The same value for every sample.
    Constant(f32),
    /// A vector of samples.
    Signal(&'a [f32]),
}

impl InputSignal<'_> {
    /// Sample `i` of the input; unconnected inputs read as zero.
    #[inline]
    pub fn value(&self, i: usize) -> f32 {
        match self {
            Self::Unconnected => 0.0,
            Self::Constant(v) => *v,
            Self::Signal(s) => s.get(i).copied().unwrap_or(0.0),
        }
    }

    /// Sample `i`, or `default` when unconnected.
    #[inline]
    pub fn value_or(&self, i: usize, default: f32) -> f32 {
        match self {
            Self::Unconnected => default,
            _ => self.value(i),
        }
    }

    /// Returns true unless unconnected.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Unconnected)
    }

    /// Writes the input into `dest`, zero-filling when unconnected.
    pub fn copy_to(&self, dest: &mut [f32]) {
        match self {
            Self::Unconnected => dest.fill(0.0),
            Self::Constant(v) => dest.fill(*v),
            Self::Signal(s) => {
                let n = s.len().min(dest.len());
                dest[..n].copy_from_slice(&s[..n]);
                dest[n..].fill(0.0);
            }
        }
    }
}

/// A processor's view of its inputs during one vector step.
///
/// The signal pool is split around the running node's own output slots, so
/// inputs are read through shared borrows while outputs are written through
/// an exclusive one.
pub struct Inputs<'a> {
    bindings: &'a [InputBinding],
    before: &'a [SignalBuffer],
    after: &'a [SignalBuffer],
    after_start: usize,
}

impl<'a> Inputs<'a> {
    /// Views `bindings` over a pool split into the slots before and after the
    /// running node's outputs.
    pub(crate) fn new(
        bindings: &'a [InputBinding],
        before: &'a [SignalBuffer],
        after: &'a [SignalBuffer],
        after_start: usize,
    ) -> Self {
        Self {
            bindings,
            before,
            after,
            after_start,
        }
    }

    /// An input set with every input unconnected.
    pub fn unconnected(bindings: &'a [InputBinding]) -> Self {
        Self::new(bindings, &[], &[], 0)
    }

    /// Number of declared inputs.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if the processor declares no inputs.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The input at `index`. Out-of-range indices read as unconnected.
    pub fn get(&self, index: usize) -> InputSignal<'a> {
        match self.bindings.get(index) {
            None | Some(InputBinding::Unconnected) => InputSignal::Unconnected,
            Some(InputBinding::Constant(v)) => InputSignal::Constant(*v),
            Some(InputBinding::Slot { slot, channel }) => {
                let buffer = if *slot < self.before.len() {
                    self.before.get(*slot)
                } else if *slot >= self.after_start {
                    self.after.get(*slot - self.after_start)
                } else {
                    None
                };
                match buffer {
                    Some(buf) if *channel < buf.channels() => {
                        InputSignal::Signal(buf.row(*channel))
                    }
                    _ => InputSignal::Unconnected,
                }
            }
        }
    }
}

/// A processing node.
///
/// Ports are declared by the processor's [`ProcessorDescriptor`](crate::registry::ProcessorDescriptor);
/// `inputs` and `outputs` passed to [`process`](Self::process) follow that
/// declaration order.
pub trait Processor: Send {
    /// Called after compilation and on every `prepare`. Allocate here, not in `process`.
    fn prepare(&mut self, ctx: &ProcessContext) {
        let _ = ctx;
    }

    /// Channels carried by output `output`. Queried once at compile time.
    fn output_channels(&self, output: usize) -> usize {
        let _ = output;
        1
    }

    /// Applies a parameter. Returns false if the name is not recognised.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        let _ = (name, value);
        false
    }

    /// Produces one vector on every output.
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], ctx: &ProcessContext);

    /// Clears internal state (delay lines, envelopes, phases).
    fn reset(&mut self) {}
}

/// What a factory receives when the builder instantiates a class.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig<'a> {
    /// Full node path.
    pub path: &'a str,
    /// Class tag.
    pub class: &'a str,
    /// Construction attributes.
    pub attrs: &'a BTreeMap<String, AttrValue>,
    /// Engine polyphony.
    pub max_voices: usize,
    /// Voice index when inside a per-voice copy.
    pub voice: Option<usize>,
}

impl ProcessorConfig<'_> {
    /// Integer attribute, or `default` when absent.
    pub fn attr_int(&self, name: &str, default: i64) -> Result<i64, BuildError> {
        match self.attrs.get(name) {
            None => Ok(default),
            Some(v) => v.as_int().ok_or_else(|| self.invalid(name, "an integer")),
        }
    }

    /// Float attribute, or `default` when absent.
    pub fn attr_float(&self, name: &str, default: f64) -> Result<f64, BuildError> {
        match self.attrs.get(name) {
            None => Ok(default),
            Some(v) => v.as_float().ok_or_else(|| self.invalid(name, "a number")),
        }
    }

    /// String attribute, if present.
    pub fn attr_str(&self, name: &str) -> Result<Option<&str>, BuildError> {
        match self.attrs.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| self.invalid(name, "a string")),
        }
    }

    fn invalid(&self, attr: &str, expected: &str) -> BuildError {
        BuildError::InvalidAttribute {
            path: self.path.to_string(),
            attr: attr.to_string(),
            reason: format!("expected {expected}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_signal_values() {
        let data = [1.0, 2.0];
        assert_eq!(InputSignal::Unconnected.value(0), 0.0);
        assert_eq!(InputSignal::Unconnected.value_or(0, 7.0), 7.0);
        assert_eq!(InputSignal::Constant(3.0).value(5), 3.0);
        assert_eq!(InputSignal::Signal(&data).value(1), 2.0);
        assert_eq!(InputSignal::Signal(&data).value(9), 0.0);
    }

    #[test]
    fn inputs_resolve_across_split() {
        let mut before = SignalBuffer::new(2, 1);
        before.fill(1.0);
        let mut after = SignalBuffer::new(2, 2);
        after.row_mut(1).fill(2.0);
        let bindings = [
            InputBinding::Slot {
                slot: 0,
                channel: 0,
            },
            InputBinding::Slot {
                slot: 3,
                channel: 1,
            },
            InputBinding::Slot {
                slot: 1,
                channel: 0,
            },
            InputBinding::Constant(0.5),
        ];
        let before = [before];
        let after = [after];
        let inputs = Inputs::new(&bindings, &before, &after, 3);
        assert_eq!(inputs.get(0).value(1), 1.0);
        assert_eq!(inputs.get(1).value(0), 2.0);
        // slot 1 is the running node's own output
        assert!(!inputs.get(2).is_connected());
        assert_eq!(inputs.get(3).value(0), 0.5);
        assert!(!inputs.get(4).is_connected());
    }

    #[test]
    fn config_attr_lookup() {
        let mut attrs = BTreeMap::new();
        attrs.insert("size".to_string(), AttrValue::Int(4));
        attrs.insert("mode".to_string(), AttrValue::Text("fast".into()));
        let config = ProcessorConfig {
            path: "a",
            class: "x",
            attrs: &attrs,
            max_voices: 4,
            voice: None,
        };
        assert_eq!(config.attr_int("size", 1).unwrap(), 4);
        assert_eq!(config.attr_int("missing", 9).unwrap(), 9);
        assert_eq!(config.attr_str("mode").unwrap(), Some("fast"));
        assert!(config.attr_int("mode", 0).is_err());
    }
}
