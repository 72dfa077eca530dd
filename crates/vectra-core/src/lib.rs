//! Vectra Core - a real-time signal graph engine
//!
//! This crate builds directed graphs of signal processors from a declarative
//! description, compiles them into a fixed execution order, and drives them in
//! fixed-size vectors from host callbacks of any size.
//!
//! # Core Abstractions
//!
//! ## Processors
//!
//! - [`Processor`] - Object-safe trait every node implements
//! - [`ProcessorRegistry`] - Class tag to factory mapping used by the builder
//! - [`SignalBuffer`] - One vector of one or more channels
//!
//! ## Graphs
//!
//! - [`GraphDescription`] - Declarative tree of processors and containers
//! - [`Graph`] - Built graph with compile and per-vector execution
//! - Per-voice containers replicate their contents once per voice
//!
//! ## Scheduling
//!
//! - [`DspEngine`] - Stages host I/O through rings and runs whole vectors
//! - [`DenormalGuard`] - Scoped flush-to-zero for the compute loop
//!
//! ## Published Signals
//!
//! - [`SignalReader`] - Pull-based reads of tapped outputs from another thread
//! - [`CaptureMode`] - Most-recent or first-in-first-out consumption
//!
//! # Example
//!
//! ```rust,ignore
//! use vectra_core::{DspEngine, EngineConfig, GraphDescription, TransportInfo};
//!
//! let mut engine = DspEngine::new(EngineConfig::default(), registry)?;
//! engine.build_graph(&desc)?;
//! engine.compile()?;
//! engine.prepare(48000.0, 512, 64)?;
//!
//! engine.process_block(&inputs, &mut outputs, 512, &TransportInfo::default());
//! ```

pub mod config;
pub mod denormal;
pub mod description;
pub mod engine;
pub mod error;
pub mod graph;
pub mod param;
pub mod path;
pub mod processor;
pub mod publish;
pub mod registry;
pub mod ring;
pub mod signal;
pub mod special;
pub mod window;

pub use config::EngineConfig;
pub use denormal::DenormalGuard;
pub use description::{
    AttrValue, ContainerDescription, GraphDescription, NodeDescription, ProcDescription,
};
pub use engine::{
    ControlHandle, DspEngine, EngineDiagnostics, EngineStats, StagingInfo, TransportInfo,
};
pub use error::{BuildError, CompileError, EngineError, GraphError, ResourceError};
pub use graph::{Graph, NodeId, NodeInfo, VectorOutcome};
pub use param::{ParamMatrix, ParamValue};
pub use processor::{InputSignal, Inputs, ProcessContext, Processor, ProcessorConfig};
pub use publish::{CaptureMode, PublishedRead, SignalReader};
pub use registry::{ProcessorCategory, ProcessorDescriptor, ProcessorFactory, ProcessorRegistry};
pub use signal::SignalBuffer;
