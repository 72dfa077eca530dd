//! Graph node types.
//!
//! Each node has a [`NodeId`] and a [`NodeKind`]. The singleton nodes the
//! builder creates itself get their own variants so the engine can reach them
//! without downcasting; everything built from the registry is a boxed
//! [`Processor`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::param::ParamSet;
use crate::processor::Processor;
use crate::special::{EventsToSignals, HostInputs, HostPhasor};

/// Identifier for a node in a graph.
///
/// Ids are assigned in declaration order starting from zero and are only
/// meaningful for the graph that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The role of a node in the graph.
pub enum NodeKind {
    /// Host input channels (`the_host_inputs`).
    HostInputs(HostInputs),
    /// Event-to-signal front end (`the_midi_inputs`).
    EventInput(EventsToSignals),
    /// Host transport phasor (`the_host_phasor`).
    HostPhasor(HostPhasor),
    /// Any registry-built processor.
    Processor(Box<dyn Processor>),
}

impl NodeKind {
    pub(crate) fn processor(&self) -> &dyn Processor {
        match self {
            NodeKind::HostInputs(p) => p,
            NodeKind::EventInput(p) => p,
            NodeKind::HostPhasor(p) => p,
            NodeKind::Processor(p) => p.as_ref(),
        }
    }

    pub(crate) fn processor_mut(&mut self) -> &mut dyn Processor {
        match self {
            NodeKind::HostInputs(p) => p,
            NodeKind::EventInput(p) => p,
            NodeKind::HostPhasor(p) => p,
            NodeKind::Processor(p) => p.as_mut(),
        }
    }
}

/// Internal bookkeeping for a node.
pub(crate) struct NodeData {
    pub path: String,
    pub class: String,
    pub kind: NodeKind,
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
    /// Last value applied to each declared parameter.
    pub params: ParamSet,
    /// Shared with published-signal readers.
    pub enabled: Arc<AtomicBool>,
    /// Voice index when the node sits inside a per-voice copy.
    pub voice: Option<usize>,
}

impl NodeData {
    pub fn new(
        path: String,
        class: &str,
        kind: NodeKind,
        inputs: &'static [&'static str],
        outputs: &'static [&'static str],
        params: ParamSet,
        voice: Option<usize>,
    ) -> Self {
        Self {
            path,
            class: class.to_string(),
            kind,
            inputs,
            outputs,
            params,
            enabled: Arc::new(AtomicBool::new(true)),
            voice,
        }
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|n| *n == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|n| *n == name)
    }

    pub fn output_channels(&self, output: usize) -> usize {
        self.kind.processor().output_channels(output).max(1)
    }
}

/// Read-only view of one node, for introspection.
#[derive(Debug, Clone, Copy)]
pub struct NodeInfo<'a> {
    /// Node id.
    pub id: NodeId,
    /// Full path.
    pub path: &'a str,
    /// Class tag.
    pub class: &'a str,
    /// Input names.
    pub inputs: &'static [&'static str],
    /// Output names.
    pub outputs: &'static [&'static str],
    /// Voice index inside a per-voice copy.
    pub voice: Option<usize>,
    /// Current enabled state.
    pub enabled: bool,
}
