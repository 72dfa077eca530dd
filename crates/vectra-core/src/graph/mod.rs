//! Node graphs: construction, compilation and per-vector execution.
//!
//! A [`Graph`] is built from a [`GraphDescription`](crate::description::GraphDescription)
//! by [`build_graph`], compiled into a fixed execution order with one signal
//! buffer per output slot by [`Graph::compile`], and then run one vector at a
//! time by the engine. Topology never changes after build; a different patch
//! means a new graph.
//!
//! # Execution
//!
//! The compiled order is a topological order of the wiring with ties broken
//! by declaration order. Every node's outputs occupy a contiguous range of
//! the signal pool, so each step splits the pool into "before", "own outputs"
//! and "after" and hands the processor shared views of its inputs and an
//! exclusive view of its outputs.

mod builder;
mod compile;
mod node;

pub use builder::{BuildOptions, BuiltGraph, PATCHER_PATTERN, build_graph};
pub use node::{NodeId, NodeInfo, NodeKind};

pub(crate) use compile::CompiledGraph;
pub(crate) use node::NodeData;

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use crate::error::{BuildError, GraphError};
use crate::param::ParamValue;
use crate::path;
use crate::processor::Inputs;
use crate::publish::{CaptureMode, TapReader, TapWriter, open_tap};
use crate::signal::SignalBuffer;
use crate::special::{EventsToSignals, HostPhasor};

/// Where a wired input reads from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum WireSource {
    Output {
        node: usize,
        output: usize,
        channel: usize,
    },
    Constant(f32),
}

/// One entry of the wiring table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Wire {
    pub to: usize,
    pub input: usize,
    pub source: WireSource,
}

/// One contribution to a host output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HostOutput {
    pub channel: usize,
    pub node: usize,
    pub output: usize,
    pub row: usize,
}

/// Result of one [`Graph::process_vector`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOutcome {
    /// The vector ran and taps were fed.
    Done,
    /// The host output mix holds NaN or infinity. Taps were not fed.
    NonFinite,
    /// Nothing ran because the graph has not been compiled.
    NotCompiled,
}

/// A built processor graph.
pub struct Graph {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) wires: Vec<Wire>,
    pub(crate) host_outputs: Vec<HostOutput>,
    pub(crate) output_channels: usize,
    pub(crate) taps: Vec<TapWriter>,
    pub(crate) host_inputs: Option<usize>,
    pub(crate) event_input: Option<usize>,
    pub(crate) host_phasor: Option<usize>,
    pub(crate) patchers: Vec<NodeId>,
    pub(crate) compiled: Option<CompiledGraph>,
    /// One buffer per output slot. Sized at compile(), reused every vector.
    pub(crate) pool: Vec<SignalBuffer>,
    /// Host output mix for the last vector, one row per host output channel.
    pub(crate) mix: SignalBuffer,
}

impl Graph {
    /// Creates an empty graph feeding `output_channels` host outputs.
    pub fn new(output_channels: usize) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            wires: Vec::new(),
            host_outputs: Vec::new(),
            output_channels,
            taps: Vec::new(),
            host_inputs: None,
            event_input: None,
            host_phasor: None,
            patchers: Vec::new(),
            compiled: None,
            pool: Vec::new(),
            mix: SignalBuffer::default(),
        }
    }

    // --- Construction (builder only) ---

    pub(crate) fn add_node(&mut self, data: NodeData) -> Result<usize, BuildError> {
        if self.index.contains_key(&data.path) {
            return Err(BuildError::DuplicatePath(data.path));
        }
        let idx = self.nodes.len();
        self.index.insert(data.path.clone(), idx);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: {} ({}) as NodeId({idx})", data.path, data.class);
        self.nodes.push(data);
        Ok(idx)
    }

    pub(crate) fn add_wire(&mut self, wire: Wire) -> Result<(), BuildError> {
        if self
            .wires
            .iter()
            .any(|w| w.to == wire.to && w.input == wire.input)
        {
            let node = &self.nodes[wire.to];
            return Err(BuildError::InputAlreadyConnected {
                path: node.path.clone(),
                port: node.inputs[wire.input].to_string(),
            });
        }
        self.wires.push(wire);
        Ok(())
    }

    // --- Introspection ---

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Id of the node at exactly `path`.
    pub fn node_id(&self, path: &str) -> Option<NodeId> {
        self.index
            .get(path::normalize(path))
            .map(|&i| NodeId(i as u32))
    }

    /// Ids of every node matching `pattern`, in declaration order.
    pub fn find(&self, pattern: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| path::matches(pattern, &n.path))
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    /// Details of one node.
    pub fn node(&self, id: NodeId) -> Option<NodeInfo<'_>> {
        let n = self.nodes.get(id.slot())?;
        Some(NodeInfo {
            id,
            path: &n.path,
            class: &n.class,
            inputs: n.inputs,
            outputs: n.outputs,
            voice: n.voice,
            enabled: n.enabled.load(Ordering::Acquire),
        })
    }

    /// Node paths in declaration order.
    pub fn node_paths_in_order(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.path.as_str()).collect()
    }

    /// Execution order of the current compilation; empty until compiled.
    pub fn compiled_order(&self) -> Vec<NodeId> {
        self.compiled
            .as_ref()
            .map(|c| c.order.iter().map(|&i| NodeId(i as u32)).collect())
            .unwrap_or_default()
    }

    /// Returns true once a compile has succeeded.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Vector size of the current compilation.
    pub fn vector_size(&self) -> Option<usize> {
        self.compiled.as_ref().map(|c| c.ctx.vector_size)
    }

    /// Host output channels this graph mixes into.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Connections as `("from.output[channel]", "to.input")` pairs, constants as `"= value"`.
    pub fn connections(&self) -> Vec<(String, String)> {
        self.wires
            .iter()
            .map(|w| {
                let to = &self.nodes[w.to];
                let dest = format!("{}.{}", to.path, to.inputs[w.input]);
                let src = match w.source {
                    WireSource::Output {
                        node,
                        output,
                        channel,
                    } => {
                        let from = &self.nodes[node];
                        format!("{}.{}[{channel}]", from.path, from.outputs[output])
                    }
                    WireSource::Constant(v) => format!("= {v}"),
                };
                (src, dest)
            })
            .collect()
    }

    /// Nodes matching [`PATCHER_PATTERN`], collected after build.
    pub fn patchers(&self) -> &[NodeId] {
        &self.patchers
    }

    /// The event-to-signal front end, if the graph has one.
    pub fn event_input(&self) -> Option<&EventsToSignals> {
        match &self.nodes.get(self.event_input?)?.kind {
            NodeKind::EventInput(front) => Some(front),
            _ => None,
        }
    }

    /// Mutable access to the event-to-signal front end.
    pub fn event_input_mut(&mut self) -> Option<&mut EventsToSignals> {
        match &mut self.nodes.get_mut(self.event_input?)?.kind {
            NodeKind::EventInput(front) => Some(front),
            _ => None,
        }
    }

    /// Mutable access to the host phasor.
    pub fn host_phasor_mut(&mut self) -> Option<&mut HostPhasor> {
        match &mut self.nodes.get_mut(self.host_phasor?)?.kind {
            NodeKind::HostPhasor(phasor) => Some(phasor),
            _ => None,
        }
    }

    /// Channels carried by `the_host_inputs`, zero when absent.
    pub fn host_input_channels(&self) -> usize {
        match self.host_inputs.map(|i| &self.nodes[i].kind) {
            Some(NodeKind::HostInputs(inputs)) => inputs.channels(),
            _ => 0,
        }
    }

    // --- Parameters and enablement ---

    /// Applies a parameter to the node at `path`.
    pub fn set_param(
        &mut self,
        path: &str,
        name: &str,
        value: ParamValue,
    ) -> Result<(), GraphError> {
        let &idx = self
            .index
            .get(path::normalize(path))
            .ok_or_else(|| GraphError::NodeNotFound(path.to_string()))?;
        let applied = match self.nodes[idx].params.index(name) {
            Some(slot) => self.set_param_at(idx, slot, value).is_ok(),
            None => false,
        };
        if !applied {
            return Err(GraphError::UnknownParam {
                path: self.nodes[idx].path.clone(),
                param: name.to_string(),
            });
        }
        Ok(())
    }

    /// Applies parameter `slot` of node `node`, both already resolved.
    ///
    /// Returns the value previously recorded in the slot, or hands `value`
    /// back if the node, the slot or the processor rejects it. Never
    /// allocates, so the audio thread can call it.
    pub(crate) fn set_param_at(
        &mut self,
        node: usize,
        slot: usize,
        value: ParamValue,
    ) -> Result<Option<ParamValue>, ParamValue> {
        let Some(data) = self.nodes.get_mut(node) else {
            return Err(value);
        };
        let Some(&name) = data.params.names().get(slot) else {
            return Err(value);
        };
        if !data.kind.processor_mut().set_param(name, &value) {
            return Err(value);
        }
        data.params.replace(slot, value)
    }

    /// Last value applied to a parameter.
    pub fn param(&self, path: &str, name: &str) -> Option<&ParamValue> {
        let &idx = self.index.get(path::normalize(path))?;
        self.nodes[idx].params.get(name)
    }

    /// Parameter names the node at `path` accepts.
    pub fn param_names(&self, path: &str) -> Option<&'static [&'static str]> {
        let &idx = self.index.get(path::normalize(path))?;
        Some(self.nodes[idx].params.names())
    }

    /// Enables or disables every node at or below `pattern`. Returns how many
    /// nodes were affected.
    pub fn set_enabled(&mut self, pattern: &str, enabled: bool) -> Result<usize, GraphError> {
        let mut count = 0;
        for node in self
            .nodes
            .iter()
            .filter(|n| path::matches_prefix(pattern, &n.path))
        {
            node.enabled.store(enabled, Ordering::Release);
            count += 1;
        }
        if count == 0 {
            return Err(GraphError::NodeNotFound(pattern.to_string()));
        }
        Ok(count)
    }

    /// Sets the enabled flag of already-resolved nodes. Returns false if any
    /// index is out of range; the others are still applied.
    pub(crate) fn set_enabled_at(&self, nodes: &[usize], enabled: bool) -> bool {
        let mut all = true;
        for &n in nodes {
            match self.nodes.get(n) {
                Some(node) => node.enabled.store(enabled, Ordering::Release),
                None => all = false,
            }
        }
        all
    }

    /// Whether the node at `path` is enabled.
    pub fn is_enabled(&self, path: &str) -> Option<bool> {
        let &idx = self.index.get(path::normalize(path))?;
        Some(self.nodes[idx].enabled.load(Ordering::Acquire))
    }

    // --- Published signals ---

    /// Attaches one tap per channel of `output` on every node matching
    /// `pattern`, in declaration (voice) order, and returns the reading halves.
    ///
    /// Taps already published under `alias` are retired, but only once the
    /// new ones were created successfully.
    pub fn publish(
        &mut self,
        alias: &str,
        pattern: &str,
        output: &str,
        mode: CaptureMode,
        length: usize,
    ) -> Result<Vec<TapReader>, BuildError> {
        let matches = self.find(pattern);
        if matches.is_empty() {
            return Err(BuildError::UnknownNode(pattern.to_string()));
        }
        let mut readers = Vec::new();
        let mut writers = Vec::new();
        for id in matches {
            let n = id.slot();
            let node = &self.nodes[n];
            let out = node
                .output_index(output)
                .ok_or_else(|| BuildError::UnknownPort {
                    path: node.path.clone(),
                    direction: "output",
                    port: output.to_string(),
                })?;
            for channel in 0..node.output_channels(out) {
                let (sink, source) = open_tap(mode, length)?;
                readers.push(TapReader::new(
                    source,
                    node.enabled.clone(),
                    format!("{}.{output}[{channel}]", node.path),
                ));
                writers.push(TapWriter {
                    alias: alias.to_string(),
                    node: n,
                    output: out,
                    channel,
                    sink,
                });
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_publish: {alias} = {pattern}.{output} -> {} tap(s), {length} samples",
            readers.len()
        );
        self.taps.retain(|t| t.alias != alias);
        self.taps.extend(writers);
        Ok(readers)
    }

    /// Samples dropped across all FIFO taps because readers fell behind.
    pub fn dropped_tap_samples(&self) -> u64 {
        self.taps.iter().map(TapWriter::dropped).sum()
    }

    /// Audio-side taps currently attached.
    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    // --- Execution ---

    /// Row `channel` of `the_host_inputs`' output, for the scheduler to fill.
    pub(crate) fn host_input_row_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        let node = self.host_inputs?;
        let slot = self.compiled.as_ref()?.slot_start[node];
        let buf = self.pool.get_mut(slot)?;
        if channel < buf.channels() {
            Some(buf.row_mut(channel))
        } else {
            None
        }
    }

    /// Host output mix produced by the last vector.
    pub fn host_mix(&self) -> &SignalBuffer {
        &self.mix
    }

    /// Runs every node once in compiled order and mixes host outputs. Taps
    /// are fed only when the mix is finite; a non-finite mix is reported as
    /// [`VectorOutcome::NonFinite`] and left for the caller to recover from.
    pub fn process_vector(&mut self) -> VectorOutcome {
        let Some(compiled) = self.compiled.as_ref() else {
            return VectorOutcome::NotCompiled;
        };
        let ctx = compiled.ctx;
        for &n in &compiled.order {
            let node = &mut self.nodes[n];
            let start = compiled.slot_start[n];
            let end = start + node.outputs.len();
            let (before, rest) = self.pool.split_at_mut(start);
            let (outputs, after) = rest.split_at_mut(end - start);
            if !node.enabled.load(Ordering::Relaxed) {
                outputs.iter_mut().for_each(SignalBuffer::clear);
                continue;
            }
            let inputs = Inputs::new(&compiled.bindings[n], before, after, end);
            node.kind.processor_mut().process(&inputs, outputs, &ctx);
        }

        Self::mix_host_outputs(&mut self.mix, &self.pool, &self.host_outputs, compiled);
        if !self.mix.is_finite() {
            return VectorOutcome::NonFinite;
        }

        for tap in &mut self.taps {
            if !self.nodes[tap.node].enabled.load(Ordering::Relaxed) {
                continue;
            }
            let buf = &self.pool[compiled.slot_start[tap.node] + tap.output];
            tap.write(buf.row(tap.channel));
        }
        VectorOutcome::Done
    }

    fn mix_host_outputs(
        mix: &mut SignalBuffer,
        pool: &[SignalBuffer],
        host_outputs: &[HostOutput],
        compiled: &CompiledGraph,
    ) {
        mix.clear();
        for route in host_outputs {
            let src = &pool[compiled.slot_start[route.node] + route.output];
            if route.row >= src.channels() || route.channel >= mix.channels() {
                continue;
            }
            for (dst, s) in mix.row_mut(route.channel).iter_mut().zip(src.row(route.row)) {
                *dst += *s;
            }
        }
    }

    /// Clears every processor's state and zeroes all signals.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.kind.processor_mut().reset();
        }
        self.pool.iter_mut().for_each(SignalBuffer::clear);
        self.mix.clear();
    }

    /// Re-prepares processors for a new sample rate without recompiling.
    pub(crate) fn prepare_processors(&mut self, sample_rate: f32) {
        let Some(compiled) = self.compiled.as_mut() else {
            return;
        };
        compiled.ctx.sample_rate = sample_rate;
        let ctx = compiled.ctx;
        for node in &mut self.nodes {
            node.kind.processor_mut().prepare(&ctx);
        }
        for buf in &mut self.pool {
            buf.set_sample_rate(sample_rate);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Small processors for graph and engine unit tests.

    use crate::error::BuildError;
    use crate::param::ParamValue;
    use crate::processor::{Inputs, ProcessContext, Processor, ProcessorConfig};
    use crate::registry::{ProcessorCategory, ProcessorDescriptor, ProcessorRegistry};
    use crate::signal::SignalBuffer;

    pub struct Pass;

    impl Processor for Pass {
        fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
            inputs.get(0).copy_to(outputs[0].row_mut(0));
        }
    }

    pub struct Gain(pub f32);

    impl Processor for Gain {
        fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
            match (name, value.as_scalar()) {
                ("gain", Some(v)) => {
                    self.0 = v;
                    true
                }
                _ => false,
            }
        }

        fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
            let input = inputs.get(0);
            for (i, out) in outputs[0].row_mut(0).iter_mut().enumerate() {
                *out = input.value(i) * self.0;
            }
        }
    }

    pub struct Sum;

    impl Processor for Sum {
        fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
            let (a, b) = (inputs.get(0), inputs.get(1));
            for (i, out) in outputs[0].row_mut(0).iter_mut().enumerate() {
                *out = a.value(i) + b.value(i);
            }
        }
    }

    fn make_pass(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
        Ok(Box::new(Pass))
    }

    fn make_gain(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
        Ok(Box::new(Gain(1.0)))
    }

    fn make_sum(_: &ProcessorConfig<'_>) -> Result<Box<dyn Processor>, BuildError> {
        Ok(Box::new(Sum))
    }

    pub fn registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        registry.register(
            ProcessorDescriptor {
                class: "pass",
                description: "copy",
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
                description: "scale",
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
                description: "sum",
                category: ProcessorCategory::Arithmetic,
                inputs: &["in1", "in2"],
                outputs: &["out"],
                params: &[],
            },
            make_sum,
        );
        registry
    }
}
