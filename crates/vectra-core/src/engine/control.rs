//! Control-thread commands delivered at vector boundaries.
//!
//! Paths and parameter names are resolved to indices on the sending thread,
//! against a directory of the current graph. The audio thread only swaps
//! values into place and sends every consumed command back, so the strings
//! and matrices it carried are freed by the next sender, never by the audio
//! thread.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::param::ParamValue;
use crate::path;

/// A resolved change travelling to the audio thread and back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlCommand {
    /// Set parameter `slot` of node `node`. After it has been applied,
    /// `value` holds whatever the slot held before.
    SetParam {
        generation: u64,
        node: usize,
        slot: usize,
        value: ParamValue,
    },
    /// Enable or disable `nodes`.
    SetEnabled {
        generation: u64,
        nodes: Vec<usize>,
        enabled: bool,
    },
}

impl ControlCommand {
    pub fn generation(&self) -> u64 {
        match self {
            Self::SetParam { generation, .. } | Self::SetEnabled { generation, .. } => *generation,
        }
    }
}

/// Path and parameter lookup for one built graph.
#[derive(Debug)]
pub(crate) struct ControlDirectory {
    generation: u64,
    index: HashMap<String, usize>,
    paths: Vec<String>,
    params: Vec<&'static [&'static str]>,
}

impl ControlDirectory {
    pub fn new(graph: &Graph, generation: u64) -> Self {
        Self {
            generation,
            index: graph.index.clone(),
            paths: graph.nodes.iter().map(|n| n.path.clone()).collect(),
            params: graph.nodes.iter().map(|n| n.params.names()).collect(),
        }
    }

    fn resolve_param(&self, path: &str, name: &str) -> Result<(usize, usize), GraphError> {
        let &node = self
            .index
            .get(path::normalize(path))
            .ok_or_else(|| GraphError::NodeNotFound(path.to_string()))?;
        let slot = self.params[node]
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| GraphError::UnknownParam {
                path: self.paths[node].clone(),
                param: name.to_string(),
            })?;
        Ok((node, slot))
    }

    fn resolve_prefix(&self, pattern: &str) -> Vec<usize> {
        self.paths
            .iter()
            .enumerate()
            .filter(|(_, p)| path::matches_prefix(pattern, p))
            .map(|(i, _)| i)
            .collect()
    }
}

type SharedDirectory = Arc<Mutex<Option<Arc<ControlDirectory>>>>;

/// Sending side of the engine's control queue.
///
/// Commands are applied by the audio thread before the next vector step, so
/// a change never lands halfway through a vector. Lookups happen here, so
/// unknown nodes and parameters are reported to the caller immediately.
/// Commands resolved against a graph that has since been rebuilt are
/// rejected by the engine. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<ControlCommand>,
    returned: Receiver<ControlCommand>,
    directory: SharedDirectory,
}

impl ControlHandle {
    /// Queues a parameter change.
    pub fn set_param(
        &self,
        path: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), GraphError> {
        let directory = self.directory(path)?;
        let (node, slot) = directory.resolve_param(path, name)?;
        self.send(ControlCommand::SetParam {
            generation: directory.generation,
            node,
            slot,
            value: value.into(),
        })
    }

    /// Queues an enable toggle for every node at or below `pattern`. Returns
    /// how many nodes it will affect.
    pub fn set_enabled(&self, pattern: &str, enabled: bool) -> Result<usize, GraphError> {
        let directory = self.directory(pattern)?;
        let nodes = directory.resolve_prefix(pattern);
        if nodes.is_empty() {
            return Err(GraphError::NodeNotFound(pattern.to_string()));
        }
        let count = nodes.len();
        self.send(ControlCommand::SetEnabled {
            generation: directory.generation,
            nodes,
            enabled,
        })?;
        Ok(count)
    }

    fn directory(&self, path: &str) -> Result<Arc<ControlDirectory>, GraphError> {
        self.directory
            .lock()
            .clone()
            .ok_or_else(|| GraphError::NodeNotFound(path.to_string()))
    }

    fn send(&self, command: ControlCommand) -> Result<(), GraphError> {
        self.collect_returned();
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => GraphError::QueueFull,
            TrySendError::Disconnected(_) => GraphError::Disconnected,
        })
    }

    /// Drops commands the audio thread has finished with.
    pub fn collect_returned(&self) {
        while self.returned.try_recv().is_ok() {}
    }
}

/// Both directions of the queue plus the directory handles resolve against.
/// The engine keeps this and hands out [`ControlHandle`]s.
pub(crate) struct ControlQueue {
    tx: Sender<ControlCommand>,
    rx: Receiver<ControlCommand>,
    return_tx: Sender<ControlCommand>,
    return_rx: Receiver<ControlCommand>,
    directory: SharedDirectory,
    generation: u64,
}

impl ControlQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        // Handles drain returns before every send, so in-flight commands
        // stay within one queue's worth; the slack covers racing handles.
        let (return_tx, return_rx) = bounded(capacity * 2);
        Self {
            tx,
            rx,
            return_tx,
            return_rx,
            directory: Arc::new(Mutex::new(None)),
            generation: 0,
        }
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.tx.clone(),
            returned: self.return_rx.clone(),
            directory: Arc::clone(&self.directory),
        }
    }

    /// Points handles at a newly built graph, or at nothing. Commands
    /// resolved against the previous graph become stale.
    pub fn install(&mut self, graph: Option<&Graph>) {
        self.generation += 1;
        *self.directory.lock() = graph.map(|g| Arc::new(ControlDirectory::new(g, self.generation)));
    }

    /// Generation of the installed graph.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn try_recv(&self) -> Option<ControlCommand> {
        self.rx.try_recv().ok()
    }

    /// Hands a consumed command back to the control side. Only when the
    /// return queue is full is it dropped here.
    pub fn give_back(&self, command: ControlCommand) {
        let _ = self.return_tx.try_send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{GraphDescription, ProcDescription};
    use crate::graph::test_support::registry;
    use crate::graph::{BuildOptions, build_graph};

    fn queue_with_graph(capacity: usize) -> ControlQueue {
        let desc = GraphDescription::new()
            .node(ProcDescription::new("a", "gain"))
            .node(ProcDescription::new("b", "pass"));
        let options = BuildOptions {
            make_event_input: false,
            ..BuildOptions::default()
        };
        let built = build_graph(&desc, &registry(), &options).unwrap();
        let mut queue = ControlQueue::new(capacity);
        queue.install(Some(&built.graph));
        queue
    }

    #[test]
    fn resolves_before_sending() {
        let queue = queue_with_graph(4);
        let handle = queue.handle();
        handle.set_param("a", "gain", 0.5).unwrap();
        assert!(matches!(
            queue.try_recv(),
            Some(ControlCommand::SetParam { value: ParamValue::Scalar(v), .. }) if v == 0.5
        ));
        assert_eq!(
            handle.set_param("missing", "gain", 1.0),
            Err(GraphError::NodeNotFound("missing".into()))
        );
        assert!(matches!(
            handle.set_param("b", "gain", 1.0),
            Err(GraphError::UnknownParam { .. })
        ));
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn full_queue_reports_error() {
        let queue = queue_with_graph(1);
        let handle = queue.handle();
        assert_eq!(handle.set_enabled("a", false), Ok(1));
        assert_eq!(handle.set_param("a", "gain", 0.5), Err(GraphError::QueueFull));
        assert!(matches!(
            queue.try_recv(),
            Some(ControlCommand::SetEnabled { enabled: false, .. })
        ));
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn returned_commands_are_dropped_by_the_sender() {
        let queue = queue_with_graph(2);
        let handle = queue.handle();
        handle.set_param("a", "gain", 0.5).unwrap();
        let command = queue.try_recv().unwrap();
        queue.give_back(command);
        assert_eq!(queue.return_rx.len(), 1);
        handle.collect_returned();
        assert!(queue.return_rx.is_empty());
    }

    #[test]
    fn reinstall_makes_commands_stale() {
        let mut queue = queue_with_graph(4);
        let handle = queue.handle();
        handle.set_param("a", "gain", 0.5).unwrap();
        let before = queue.generation();
        queue.install(None);
        assert_ne!(queue.try_recv().map(|c| c.generation()), Some(queue.generation()));
        assert_eq!(before + 1, queue.generation());
        assert_eq!(
            handle.set_param("a", "gain", 0.5),
            Err(GraphError::NodeNotFound("a".into()))
        );
    }

    #[test]
    fn dropped_queue_disconnects() {
        let queue = queue_with_graph(4);
        let handle = queue.handle();
        drop(queue);
        assert_eq!(handle.set_enabled("a", true), Err(GraphError::Disconnected));
    }
}
