//! The block scheduler.
//!
//! [`DspEngine`] owns a built graph and adapts arbitrary host callback sizes
//! to the graph's fixed vector size. Each host input channel is staged through
//! a ring; once at least one vector of input is pending the graph runs, and
//! its host output mix is pushed into one ring per output channel. The host
//! then reads exactly as many samples as it supplied.
//!
//! Output rings are seeded with one vector of silence at [`prepare`](DspEngine::prepare),
//! so latency is always exactly one vector and a full vector is always ready
//! for the host:
//!
//! ```text
//! host in ──► input rings ──► [ vector, vector, ... ] ──► output rings ──► host out
//!                 ▲ pending < V between callbacks          ▲ seeded with V zeros
//! ```
//!
//! # Lifecycle
//!
//! `build_graph` → `compile` → `prepare` → `process_block`... Rebuilding or
//! recompiling requires another `prepare` before processing resumes. Until
//! then `process_block` writes silence and counts the call in
//! [`EngineDiagnostics::unprepared_callbacks`].
//!
//! # Events
//!
//! Event times are sample offsets into the next host callback. The engine adds
//! the input still pending from earlier callbacks, so an event lands on the
//! same sample of the stream it would without vector buffering.

mod control;
mod stats;

pub use control::ControlHandle;
pub use stats::{EngineDiagnostics, EngineStats};

use std::time::Instant;

use crate::config::{EngineConfig, validate_vector_size};
use crate::denormal::DenormalGuard;
use crate::description::GraphDescription;
use crate::error::{EngineError, GraphError};
use crate::graph::{self, BuildOptions, Graph, NodeId, VectorOutcome};
use crate::param::ParamValue;
use crate::processor::ProcessContext;
use crate::publish::{CaptureMode, PublishedRead, PublishedSignals, SignalReader};
use crate::registry::ProcessorRegistry;
use crate::ring::SampleRing;
use crate::signal::SignalBuffer;
use crate::special::EventsToSignals;

use control::{ControlCommand, ControlQueue};
use stats::StatsAccumulator;

/// Host transport state for one callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportInfo {
    /// Wall-clock position in seconds.
    pub secs: f64,
    /// Musical position in beats.
    pub ppq_position: f64,
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Whether the transport is running.
    pub playing: bool,
}

impl Default for TransportInfo {
    fn default() -> Self {
        Self {
            secs: 0.0,
            ppq_position: 0.0,
            bpm: 120.0,
            playing: false,
        }
    }
}

/// Ring sizes and fill levels, for inspection after `prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingInfo {
    /// Capacity of each input ring.
    pub input_capacity: Vec<usize>,
    /// Capacity of each output ring.
    pub output_capacity: Vec<usize>,
    /// Samples waiting in each output ring.
    pub output_buffered: Vec<usize>,
    /// Input samples not yet processed.
    pub pending: usize,
}

/// A graph plus everything needed to run it from a host callback.
pub struct DspEngine {
    config: EngineConfig,
    registry: ProcessorRegistry,
    graph: Option<Graph>,
    signals: SignalReader,
    control: ControlQueue,
    sample_rate: f32,
    host_buffer_size: usize,
    vector_size: usize,
    prepared: bool,
    input_rings: Vec<SampleRing>,
    output_rings: Vec<SampleRing>,
    /// Input samples staged but not yet processed. Always below one vector
    /// between callbacks.
    pending: usize,
    /// Samples run through the graph so far in the current callback.
    callback_offset: usize,
    diagnostics: EngineDiagnostics,
    stats: StatsAccumulator,
    last_stats: Option<EngineStats>,
}

impl DspEngine {
    /// Creates an engine with no graph.
    pub fn new(config: EngineConfig, registry: ProcessorRegistry) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            control: ControlQueue::new(config.control_queue_capacity),
            vector_size: config.vector_size,
            config,
            registry,
            graph: None,
            signals: SignalReader::new(),
            sample_rate: 48000.0,
            host_buffer_size: 0,
            prepared: false,
            input_rings: Vec::new(),
            output_rings: Vec::new(),
            pending: 0,
            callback_offset: 0,
            diagnostics: EngineDiagnostics::default(),
            stats: StatsAccumulator::default(),
            last_stats: None,
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The registry graphs are built from.
    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    // --- Lifecycle ---

    /// Builds a new graph, discarding the current one and its publications.
    ///
    /// On error the engine holds no graph.
    pub fn build_graph(&mut self, desc: &GraphDescription) -> Result<(), EngineError> {
        self.graph = None;
        self.prepared = false;
        self.signals.replace(PublishedSignals::new());
        self.control.install(None);

        let built = graph::build_graph(desc, &self.registry, &BuildOptions::from(&self.config))?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "engine_build: {} nodes, {} publication(s)",
            built.graph.node_count(),
            built.published.aliases().len()
        );
        self.control.install(Some(&built.graph));
        self.graph = Some(built.graph);
        self.signals.replace(built.published);
        Ok(())
    }

    /// Compiles the current graph at the current vector size and sample rate.
    ///
    /// On error the previous compilation, if any, is kept. A successful
    /// compile must be followed by [`prepare`](Self::prepare).
    pub fn compile(&mut self) -> Result<(), EngineError> {
        let graph = self
            .graph
            .as_mut()
            .ok_or(EngineError::NotReady("no graph has been built"))?;
        graph.compile(ProcessContext {
            sample_rate: self.sample_rate,
            vector_size: self.vector_size,
        })?;
        self.prepared = false;
        Ok(())
    }

    /// Sizes every staging ring for `host_buffer_size` callbacks at
    /// `vector_size`, seeds the output latency and resets all processing state.
    ///
    /// A `vector_size` of zero uses the configured default. Recompiles if
    /// the vector size changed. Requires a built and compiled graph.
    pub fn prepare(
        &mut self,
        sample_rate: f32,
        host_buffer_size: usize,
        vector_size: usize,
    ) -> Result<(), EngineError> {
        let graph = self
            .graph
            .as_mut()
            .ok_or(EngineError::NotReady("no graph has been built"))?;
        if !graph.is_compiled() {
            return Err(EngineError::NotReady("graph has not been compiled"));
        }
        let vector_size = if vector_size == 0 {
            self.config.vector_size
        } else {
            vector_size
        };
        validate_vector_size(vector_size)?;
        if host_buffer_size == 0 {
            return Err(EngineError::InvalidConfig(
                "host buffer size must be greater than zero".into(),
            ));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }

        self.prepared = false;
        if graph.vector_size() == Some(vector_size) {
            graph.prepare_processors(sample_rate);
        } else {
            graph.compile(ProcessContext {
                sample_rate,
                vector_size,
            })?;
        }

        let capacity = host_buffer_size + vector_size;
        let input_rings = (0..graph.host_input_channels())
            .map(|_| SampleRing::new(capacity))
            .collect::<Result<Vec<_>, _>>()?;
        let mut output_rings = (0..graph.output_channels())
            .map(|_| SampleRing::new(capacity))
            .collect::<Result<Vec<_>, _>>()?;
        for ring in &mut output_rings {
            ring.write_zeros(vector_size);
        }

        if let Some(front) = graph.event_input_mut() {
            front.set_buffer_sizes(host_buffer_size, vector_size);
        }
        graph.reset();

        self.input_rings = input_rings;
        self.output_rings = output_rings;
        self.sample_rate = sample_rate;
        self.host_buffer_size = host_buffer_size;
        self.vector_size = vector_size;
        self.pending = 0;
        self.callback_offset = 0;
        self.stats.reset();
        self.prepared = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "engine_prepare: {sample_rate} Hz, host {host_buffer_size}, vector {vector_size}, {} in / {} out",
            self.input_rings.len(),
            self.output_rings.len()
        );
        Ok(())
    }

    /// Returns true once `prepare` has succeeded for the current graph.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Sample rate from the last `prepare`.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Vector size the graph runs at.
    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    /// Host buffer size from the last `prepare`.
    pub fn host_buffer_size(&self) -> usize {
        self.host_buffer_size
    }

    /// Fixed delay between host input and host output, in samples.
    pub fn latency(&self) -> usize {
        self.vector_size
    }

    /// Current ring sizes and fill levels.
    pub fn staging(&self) -> StagingInfo {
        StagingInfo {
            input_capacity: self.input_rings.iter().map(SampleRing::capacity).collect(),
            output_capacity: self.output_rings.iter().map(SampleRing::capacity).collect(),
            output_buffered: self.output_rings.iter().map(SampleRing::available).collect(),
            pending: self.pending,
        }
    }

    // --- Audio path ---

    /// Processes one host callback of `frames` samples.
    ///
    /// `inputs` and `outputs` hold one slice per channel. Missing input
    /// channels read as silence; missing output channels are skipped. Never
    /// fails: problems are counted in [`diagnostics`](Self::diagnostics).
    pub fn process_block(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
        transport: &TransportInfo,
    ) {
        self.diagnostics.callbacks += 1;
        if !self.prepared || self.graph.is_none() {
            self.diagnostics.unprepared_callbacks += 1;
            zero_outputs(outputs, frames);
            return;
        }
        if let Some(phasor) = self.graph.as_mut().and_then(Graph::host_phasor_mut) {
            phasor.set_time_and_rate(
                transport.secs,
                transport.ppq_position,
                transport.bpm,
                transport.playing,
            );
        }

        let started = self.config.collect_stats.then(Instant::now);
        self.callback_offset = 0;
        let mut fault = false;
        {
            let _guard = DenormalGuard::new();
            let mut done = 0;
            while done < frames {
                let n = (frames - done).min(self.host_buffer_size);
                fault |= self.run_chunk(inputs, outputs, done, n);
                done += n;
            }
        }
        if fault {
            zero_outputs(outputs, frames);
        }

        let processed = self.callback_offset;
        if let Some(front) = self.graph.as_mut().and_then(Graph::event_input_mut) {
            front.end_block(processed);
        }

        if let Some(started) = started
            && let Some(stats) = self
                .stats
                .record(frames, started.elapsed(), self.sample_rate)
        {
            #[cfg(feature = "tracing")]
            tracing::info!(
                "engine_stats: {:.3} us/sample, {:.2}% cpu over {} samples",
                stats.micros_per_sample,
                stats.cpu_fraction * 100.0,
                stats.samples
            );
            self.last_stats = Some(stats);
        }
    }

    /// Stages `n` samples starting at `offset`, runs every whole vector now
    /// pending and reads `n` samples back. Returns true on a numeric fault.
    fn run_chunk(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        offset: usize,
        n: usize,
    ) -> bool {
        let Some(graph) = self.graph.as_mut() else {
            return false;
        };
        let v = self.vector_size;

        for (ch, ring) in self.input_rings.iter_mut().enumerate() {
            match inputs.get(ch).and_then(|s| s.get(offset..offset + n)) {
                Some(src) => ring.write(src),
                None => ring.write_zeros(n),
            };
        }
        self.pending += n;

        let mut fault = false;
        while self.pending >= v {
            Self::apply_commands(graph, &self.control, &mut self.diagnostics);

            for (ch, ring) in self.input_rings.iter_mut().enumerate() {
                if let Some(row) = graph.host_input_row_mut(ch) {
                    let got = ring.read(row);
                    if got < row.len() {
                        row[got..].fill(0.0);
                        Self::starved(&mut self.diagnostics, "input", ch, got, row.len());
                    }
                }
            }
            if let Some(front) = graph.event_input_mut() {
                front.set_frame_offset(self.callback_offset);
            }

            if graph.process_vector() == VectorOutcome::NonFinite {
                graph.reset();
                fault = true;
                self.diagnostics.numeric_faults += 1;
                #[cfg(feature = "tracing")]
                tracing::warn!("engine_fault: non-finite output, graph state cleared");
            }
            let mix = graph.host_mix();
            for (ch, ring) in self.output_rings.iter_mut().enumerate() {
                if ch < mix.channels() {
                    ring.write(mix.row(ch));
                } else {
                    ring.write_zeros(v);
                }
            }

            self.pending -= v;
            self.callback_offset += v;
            self.diagnostics.vectors += 1;
        }

        for (ch, ring) in self.output_rings.iter_mut().enumerate() {
            let got = match outputs.get_mut(ch).and_then(|d| d.get_mut(offset..offset + n)) {
                Some(dest) => {
                    let got = ring.read(dest);
                    dest[got..].fill(0.0);
                    got
                }
                None => ring.discard(n),
            };
            if got < n {
                Self::starved(&mut self.diagnostics, "output", ch, got, n);
            }
        }
        fault
    }

    fn apply_commands(graph: &mut Graph, control: &ControlQueue, diagnostics: &mut EngineDiagnostics) {
        while let Some(mut command) = control.try_recv() {
            let current = command.generation() == control.generation();
            let applied = current
                && match &mut command {
                    ControlCommand::SetParam {
                        node, slot, value, ..
                    } => {
                        let incoming = std::mem::replace(value, ParamValue::Scalar(0.0));
                        match graph.set_param_at(*node, *slot, incoming) {
                            Ok(previous) => {
                                if let Some(previous) = previous {
                                    *value = previous;
                                }
                                true
                            }
                            Err(rejected) => {
                                *value = rejected;
                                false
                            }
                        }
                    }
                    ControlCommand::SetEnabled { nodes, enabled, .. } => {
                        graph.set_enabled_at(nodes, *enabled)
                    }
                };
            if !applied {
                diagnostics.rejected_commands += 1;
                #[cfg(feature = "tracing")]
                tracing::warn!("engine_control: command rejected (stale: {})", !current);
            }
            control.give_back(command);
        }
    }

    fn starved(
        diagnostics: &mut EngineDiagnostics,
        direction: &str,
        channel: usize,
        got: usize,
        wanted: usize,
    ) {
        diagnostics.starvation_events += 1;
        #[cfg(feature = "tracing")]
        tracing::warn!("engine_starvation: {direction} ring {channel} read {got} of {wanted}");
        #[cfg(not(feature = "tracing"))]
        let _ = (direction, channel, got, wanted);
    }

    // --- Events ---

    fn with_events(&mut self, f: impl FnOnce(&mut EventsToSignals, usize) -> bool) -> bool {
        let pending = self.pending;
        self.graph
            .as_mut()
            .and_then(Graph::event_input_mut)
            .is_some_and(|front| f(front, pending))
    }

    /// Queues a note on `time` samples into the next callback. Returns false
    /// if there is no event front end or its queue is full.
    pub fn add_note_on(&mut self, note: u8, velocity: u8, time: usize) -> bool {
        self.with_events(|front, pending| front.add_note_on(note, velocity, time + pending))
    }

    /// Queues a note off.
    pub fn add_note_off(&mut self, note: u8, time: usize) -> bool {
        self.with_events(|front, pending| front.add_note_off(note, time + pending))
    }

    /// Queues a controller change.
    pub fn set_controller(&mut self, controller: u8, value: u8, time: usize) -> bool {
        self.with_events(|front, pending| front.set_controller(controller, value, time + pending))
    }

    /// Queues a 14-bit pitch wheel change (8192 is centre).
    pub fn set_pitch_wheel(&mut self, value: u16, time: usize) -> bool {
        self.with_events(|front, pending| front.set_pitch_wheel(value, time + pending))
    }

    /// Queues polyphonic aftertouch.
    pub fn set_aftertouch(&mut self, note: u8, value: u8, time: usize) -> bool {
        self.with_events(|front, pending| front.set_aftertouch(note, value, time + pending))
    }

    /// Queues channel aftertouch.
    pub fn set_channel_aftertouch(&mut self, value: u8, time: usize) -> bool {
        self.with_events(|front, pending| front.set_channel_aftertouch(value, time + pending))
    }

    /// Queues a sustain pedal change.
    pub fn set_sustain_pedal(&mut self, on: bool, time: usize) -> bool {
        self.with_events(|front, pending| front.set_sustain_pedal(on, time + pending))
    }

    /// Drops every queued event and releases all voices.
    pub fn clear_events(&mut self) {
        if let Some(front) = self.graph.as_mut().and_then(Graph::event_input_mut) {
            front.clear_events();
        }
    }

    // --- Published signals ---

    /// Publishes `output` of every node matching `pattern` under `alias`,
    /// replacing any earlier publication with that alias.
    pub fn publish(
        &mut self,
        pattern: &str,
        output: &str,
        alias: &str,
        mode: CaptureMode,
        length: usize,
    ) -> Result<(), EngineError> {
        let graph = self
            .graph
            .as_mut()
            .ok_or(EngineError::NotReady("no graph has been built"))?;
        let taps = graph.publish(alias, pattern, output, mode, length)?;
        self.signals.register(alias, taps);
        Ok(())
    }

    /// Reads every enabled tap under `alias` into successive rows of `dest`.
    pub fn read_published(&self, alias: &str, dest: &mut SignalBuffer) -> PublishedRead {
        self.signals.read(alias, dest)
    }

    /// Taps registered under `alias`.
    pub fn published_voice_count(&self, alias: &str) -> usize {
        self.signals.voice_count(alias)
    }

    /// Taps under `alias` whose node is currently enabled.
    pub fn published_enabled_voice_count(&self, alias: &str) -> usize {
        self.signals.enabled_voice_count(alias)
    }

    /// Ring length of the taps under `alias`.
    pub fn published_buffer_length(&self, alias: &str) -> usize {
        self.signals.buffer_length(alias)
    }

    /// A cloneable reader for another thread.
    pub fn signal_reader(&self) -> SignalReader {
        self.signals.clone()
    }

    // --- Control ---

    /// A handle for queuing parameter and enable changes from another thread.
    pub fn control_handle(&self) -> ControlHandle {
        self.control.handle()
    }

    /// Applies a parameter immediately. Only call while not processing.
    pub fn set_param(
        &mut self,
        path: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), GraphError> {
        self.graph
            .as_mut()
            .ok_or_else(|| GraphError::NodeNotFound(path.to_string()))?
            .set_param(path, name, value.into())
    }

    /// Enables or disables every node at or below `pattern` immediately.
    pub fn set_enabled(&mut self, pattern: &str, enabled: bool) -> Result<usize, GraphError> {
        self.graph
            .as_mut()
            .ok_or_else(|| GraphError::NodeNotFound(pattern.to_string()))?
            .set_enabled(pattern, enabled)
    }

    // --- Introspection ---

    /// The current graph, if built.
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Mutable access to the current graph. Only call while not processing.
    pub fn graph_mut(&mut self) -> Option<&mut Graph> {
        self.graph.as_mut()
    }

    /// Patcher nodes collected at build.
    pub fn patcher_list(&self) -> &[NodeId] {
        self.graph.as_ref().map(Graph::patchers).unwrap_or_default()
    }

    /// Counters kept by the audio path.
    pub fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            dropped_tap_samples: self.graph.as_ref().map_or(0, Graph::dropped_tap_samples),
            ..self.diagnostics
        }
    }

    /// The most recent statistics flush, when `collect_stats` is on.
    pub fn last_stats(&self) -> Option<EngineStats> {
        self.last_stats
    }
}

fn zero_outputs(outputs: &mut [&mut [f32]], frames: usize) {
    for out in outputs.iter_mut() {
        let n = frames.min(out.len());
        out[..n].fill(0.0);
    }
}
