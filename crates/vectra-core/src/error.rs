//! Error types for graph construction, compilation and engine lifecycle.
//!
//! Each phase has its own error enum so callers can tell a malformed patch
//! ([`BuildError`]) from an unschedulable one ([`CompileError`]) or a host
//! misconfiguration ([`EngineError`]). [`ResourceError`] is shared by every
//! phase that allocates signal memory or ring storage.

use thiserror::Error;

/// Storage could not be obtained for a signal buffer or ring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The requested ring capacity exceeds [`MAX_RING_CAPACITY`](crate::ring::MAX_RING_CAPACITY).
    #[error("ring capacity {requested} exceeds the maximum of {max} samples")]
    RingTooLarge {
        /// Requested capacity in samples.
        requested: usize,
        /// Largest capacity the engine will allocate.
        max: usize,
    },
    /// The allocator refused a signal buffer.
    #[error("could not allocate a signal of {samples} samples")]
    Allocation {
        /// Total samples requested.
        samples: usize,
    },
}

/// A graph description could not be turned into a node graph.
///
/// Builds are all-or-nothing: whenever one of these is returned the engine
/// holds no graph at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No processor class with this name is registered.
    #[error("unknown processor class '{class}' for '{path}'")]
    UnknownClass {
        /// Class name as written in the description.
        class: String,
        /// Path of the node that requested it.
        path: String,
    },
    /// A connection or declaration referenced a node that does not exist.
    #[error("no node matches '{0}'")]
    UnknownNode(String),
    /// A connection named an input or output the processor class does not have.
    #[error("'{path}' has no {direction} named '{port}'")]
    UnknownPort {
        /// Node path.
        path: String,
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// The missing port name.
        port: String,
    },
    /// A parameter was rejected by the processor.
    #[error("'{path}' does not accept parameter '{param}'")]
    UnknownParam {
        /// Node path.
        path: String,
        /// Parameter name.
        param: String,
    },
    /// An attribute value had the wrong type or range.
    #[error("attribute '{attr}' on '{path}': {reason}")]
    InvalidAttribute {
        /// Node path.
        path: String,
        /// Attribute name.
        attr: String,
        /// What was expected.
        reason: String,
    },
    /// Two nodes resolved to the same path.
    #[error("duplicate node path '{0}'")]
    DuplicatePath(String),
    /// A node input already has a source.
    #[error("input '{port}' of '{path}' is already connected")]
    InputAlreadyConnected {
        /// Node path.
        path: String,
        /// Input name.
        port: String,
    },
    /// A connection selected a channel the source output does not carry.
    #[error("'{path}.{port}' has {channels} channel(s), channel {channel} requested")]
    ChannelOutOfRange {
        /// Source node path.
        path: String,
        /// Source output name.
        port: String,
        /// Requested channel.
        channel: usize,
        /// Channels available.
        channels: usize,
    },
    /// Structural problem not covered by a more specific variant.
    #[error("malformed graph description: {0}")]
    Malformed(String),
    /// Tap storage could not be allocated.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// The built graph could not be scheduled.
///
/// A failed compile leaves the previously compiled schedule in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// There is no graph to compile.
    #[error("no graph has been built")]
    NoGraph,
    /// The wiring contains a feedback loop. Lists every node left unscheduled.
    #[error("graph contains a cycle through: {}", .nodes.join(", "))]
    Cycle {
        /// Paths of the nodes on or behind the cycle.
        nodes: Vec<String>,
    },
    /// The vector size is zero.
    #[error("vector size must be greater than zero")]
    ZeroVectorSize,
    /// Signal storage could not be allocated.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// A runtime graph operation (parameter change, enable toggle) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No node has this path.
    #[error("no node at '{0}'")]
    NodeNotFound(String),
    /// The processor rejected the parameter.
    #[error("'{path}' does not accept parameter '{param}'")]
    UnknownParam {
        /// Node path.
        path: String,
        /// Parameter name.
        param: String,
    },
    /// The control queue is full; the command was not delivered.
    #[error("control queue is full")]
    QueueFull,
    /// The engine that owned the control queue is gone.
    #[error("engine has been dropped")]
    Disconnected,
}

/// Engine lifecycle failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// [`prepare`](crate::DspEngine::prepare) was called before a successful build and compile.
    #[error("engine is not ready: {0}")]
    NotReady(&'static str),
    /// A prepare argument was out of range.
    #[error("invalid engine setting: {0}")]
    InvalidConfig(String),
    /// Graph construction failed.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Graph compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Ring storage could not be allocated.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_nodes() {
        let err = CompileError::Cycle {
            nodes: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "graph contains a cycle through: a, b");
    }

    #[test]
    fn resource_error_converts_into_every_phase() {
        let res = ResourceError::RingTooLarge {
            requested: 10,
            max: 5,
        };
        assert!(matches!(
            BuildError::from(res.clone()),
            BuildError::Resource(_)
        ));
        assert!(matches!(
            CompileError::from(res.clone()),
            CompileError::Resource(_)
        ));
        let engine: EngineError = res.into();
        assert!(engine.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn unknown_class_display() {
        let err = BuildError::UnknownClass {
            class: "wobble".into(),
            path: "voices/osc".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown processor class 'wobble' for 'voices/osc'"
        );
    }
}
