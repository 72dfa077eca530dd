//! Graph construction from a description tree.

use crate::config::EngineConfig;
use crate::description::{
    ChannelKeyword, ChannelSelect, ConnectionDescription, GraphDescription, NodeDescription,
    ProcDescription,
};
use crate::error::BuildError;
use crate::param::ParamSet;
use crate::path;
use crate::processor::ProcessorConfig;
use crate::publish::PublishedSignals;
use crate::registry::ProcessorRegistry;
use crate::special::{
    EVENT_INPUT_CLASS, EVENT_INPUT_NAME, EVENT_OUTPUTS, EventsToSignals, HOST_INPUT_OUTPUTS,
    HOST_INPUTS_CLASS, HOST_INPUTS_NAME, HOST_PHASOR_CLASS, HOST_PHASOR_NAME, HOST_PHASOR_OUTPUTS,
    HostInputs, HostPhasor,
};

use super::{Graph, HostOutput, NodeData, NodeId, NodeKind, Wire, WireSource};

/// Nodes collected into [`Graph::patchers`] after build.
pub const PATCHER_PATTERN: &str = "voices/voice/patcher";

/// Builder settings taken from the engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Copies made of per-voice containers; polyphony of the event front end.
    pub max_voices: usize,
    /// Channels of `the_host_inputs`; zero omits the node.
    pub input_channels: usize,
    /// Host output channels.
    pub output_channels: usize,
    /// Create `the_midi_inputs`.
    pub make_event_input: bool,
    /// Ring length for publications that do not set one.
    pub default_signal_length: usize,
}

impl From<&EngineConfig> for BuildOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_voices: config.max_voices,
            input_channels: config.input_channels,
            output_channels: config.output_channels,
            make_event_input: config.make_event_input,
            default_signal_length: config.default_signal_length,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// A freshly built graph and the reading side of its publications.
pub struct BuiltGraph {
    /// The wired, uncompiled graph.
    pub graph: Graph,
    /// Readers for every signal the description published.
    pub published: PublishedSignals,
}

/// Builds a wired graph from `desc`.
///
/// Always creates `the_host_phasor`; creates `the_midi_inputs` when
/// `options.make_event_input` is set and `the_host_inputs` when there are
/// input channels. Per-voice containers are instantiated `max_voices` times
/// as `name#0 .. name#N-1`. Any error abandons the whole build.
pub fn build_graph(
    desc: &GraphDescription,
    registry: &ProcessorRegistry,
    options: &BuildOptions,
) -> Result<BuiltGraph, BuildError> {
    if options.max_voices == 0 {
        return Err(BuildError::Malformed("max_voices must be at least 1".into()));
    }
    let mut builder = Builder {
        registry,
        options,
        graph: Graph::new(options.output_channels),
    };
    builder.add_singletons()?;
    builder.add_nodes(&desc.nodes, "", None)?;
    for conn in &desc.connections {
        builder.connect(conn, "", None)?;
    }
    builder.add_outputs(desc)?;
    let published = builder.add_publications(desc)?;

    let mut graph = builder.graph;
    graph.patchers = graph.find(PATCHER_PATTERN);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "graph_build: {} nodes, {} wires, {} patcher(s)",
        graph.node_count(),
        graph.wires.len(),
        graph.patchers.len()
    );
    Ok(BuiltGraph { graph, published })
}

struct Builder<'a> {
    registry: &'a ProcessorRegistry,
    options: &'a BuildOptions,
    graph: Graph,
}

impl Builder<'_> {
    fn add_singletons(&mut self) -> Result<(), BuildError> {
        if self.options.input_channels > 0 {
            let idx = self.graph.add_node(NodeData::new(
                HOST_INPUTS_NAME.into(),
                HOST_INPUTS_CLASS,
                NodeKind::HostInputs(HostInputs::new(self.options.input_channels)),
                &[],
                HOST_INPUT_OUTPUTS,
                ParamSet::default(),
                None,
            ))?;
            self.graph.host_inputs = Some(idx);
        }
        if self.options.make_event_input {
            let idx = self.graph.add_node(NodeData::new(
                EVENT_INPUT_NAME.into(),
                EVENT_INPUT_CLASS,
                NodeKind::EventInput(EventsToSignals::new(self.options.max_voices)),
                &[],
                EVENT_OUTPUTS,
                ParamSet::default(),
                None,
            ))?;
            self.graph.event_input = Some(idx);
        }
        let idx = self.graph.add_node(NodeData::new(
            HOST_PHASOR_NAME.into(),
            HOST_PHASOR_CLASS,
            NodeKind::HostPhasor(HostPhasor::new()),
            &[],
            HOST_PHASOR_OUTPUTS,
            ParamSet::default(),
            None,
        ))?;
        self.graph.host_phasor = Some(idx);
        Ok(())
    }

    fn add_nodes(
        &mut self,
        nodes: &[NodeDescription],
        prefix: &str,
        voice: Option<usize>,
    ) -> Result<(), BuildError> {
        for node in nodes {
            if !path::is_valid_name(node.name()) {
                return Err(BuildError::Malformed(format!(
                    "invalid node name '{}' under '{prefix}'",
                    node.name()
                )));
            }
            match node {
                NodeDescription::Proc(proc) => self.add_proc(proc, prefix, voice)?,
                NodeDescription::Container(container) => {
                    let copies = if container.per_voice {
                        Some(self.options.max_voices)
                    } else {
                        container.copies
                    };
                    let instances: Vec<(String, Option<usize>)> = match copies {
                        None => vec![(path::join(prefix, &container.name), voice)],
                        Some(count) => (0..count)
                            .map(|i| {
                                let name = path::copy_name(&container.name, i);
                                let v = if container.per_voice { Some(i) } else { voice };
                                (path::join(prefix, &name), v)
                            })
                            .collect(),
                    };
                    for (inst_path, inst_voice) in instances {
                        self.add_nodes(&container.nodes, &inst_path, inst_voice)?;
                        for conn in &container.connections {
                            self.connect(conn, &inst_path, inst_voice)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn add_proc(
        &mut self,
        proc: &ProcDescription,
        prefix: &str,
        voice: Option<usize>,
    ) -> Result<(), BuildError> {
        let node_path = path::join(prefix, &proc.name);
        let config = ProcessorConfig {
            path: &node_path,
            class: &proc.class,
            attrs: &proc.attrs,
            max_voices: self.options.max_voices,
            voice,
        };
        let (descriptor, mut processor) = self.registry.create(&config)?;
        let mut params = ParamSet::new(descriptor.params);
        for (name, value) in &proc.params {
            let accepted = descriptor.param_index(name).is_some_and(|slot| {
                processor.set_param(name, value) && params.replace(slot, value.clone()).is_ok()
            });
            if !accepted {
                return Err(BuildError::UnknownParam {
                    path: node_path,
                    param: name.clone(),
                });
            }
        }
        let data = NodeData::new(
            node_path.clone(),
            &proc.class,
            NodeKind::Processor(processor),
            descriptor.inputs,
            descriptor.outputs,
            params,
            voice,
        );
        let idx = self.graph.add_node(data)?;
        for (input, &value) in &proc.constants {
            let slot = descriptor
                .input_index(input)
                .ok_or_else(|| BuildError::UnknownPort {
                    path: node_path.clone(),
                    direction: "input",
                    port: input.clone(),
                })?;
            self.graph.add_wire(Wire {
                to: idx,
                input: slot,
                source: WireSource::Constant(value),
            })?;
        }
        Ok(())
    }

    fn resolve(&self, reference: &str, prefix: &str) -> Result<(usize, String), BuildError> {
        let (node_ref, port) = path::split_port(reference).ok_or_else(|| {
            BuildError::Malformed(format!("'{reference}' is not of the form path.port"))
        })?;
        let full = if node_ref.starts_with(path::SEPARATOR) {
            path::normalize(node_ref).to_string()
        } else {
            path::join(prefix, node_ref)
        };
        let &idx = self
            .graph
            .index
            .get(&full)
            .ok_or(BuildError::UnknownNode(full))?;
        Ok((idx, port.to_string()))
    }

    fn connect(
        &mut self,
        conn: &ConnectionDescription,
        prefix: &str,
        voice: Option<usize>,
    ) -> Result<(), BuildError> {
        let (from, out_name) = self.resolve(&conn.from, prefix)?;
        let (to, in_name) = self.resolve(&conn.to, prefix)?;

        let src = &self.graph.nodes[from];
        let output = src
            .output_index(&out_name)
            .ok_or_else(|| BuildError::UnknownPort {
                path: src.path.clone(),
                direction: "output",
                port: out_name.clone(),
            })?;
        let channel = match conn.channel {
            None => 0,
            Some(ChannelSelect::Index(c)) => c,
            Some(ChannelSelect::Keyword(ChannelKeyword::Voice)) => voice.ok_or_else(|| {
                BuildError::Malformed(format!(
                    "connection from '{}' selects the voice channel outside a per-voice container",
                    conn.from
                ))
            })?,
        };
        let channels = src.output_channels(output);
        if channel >= channels {
            return Err(BuildError::ChannelOutOfRange {
                path: src.path.clone(),
                port: out_name,
                channel,
                channels,
            });
        }

        let dst = &self.graph.nodes[to];
        let input = dst
            .input_index(&in_name)
            .ok_or_else(|| BuildError::UnknownPort {
                path: dst.path.clone(),
                direction: "input",
                port: in_name,
            })?;
        self.graph.add_wire(Wire {
            to,
            input,
            source: WireSource::Output {
                node: from,
                output,
                channel,
            },
        })
    }

    fn add_outputs(&mut self, desc: &GraphDescription) -> Result<(), BuildError> {
        for decl in &desc.outputs {
            if decl.channel >= self.options.output_channels {
                return Err(BuildError::Malformed(format!(
                    "output channel {} exceeds the {} host output channel(s)",
                    decl.channel, self.options.output_channels
                )));
            }
            let matches: Vec<NodeId> = self.graph.find(&decl.proc);
            if matches.is_empty() {
                return Err(BuildError::UnknownNode(decl.proc.clone()));
            }
            for id in matches {
                let node = &self.graph.nodes[id.slot()];
                let output =
                    node.output_index(&decl.output)
                        .ok_or_else(|| BuildError::UnknownPort {
                            path: node.path.clone(),
                            direction: "output",
                            port: decl.output.clone(),
                        })?;
                let channels = node.output_channels(output);
                if decl.source_channel >= channels {
                    return Err(BuildError::ChannelOutOfRange {
                        path: node.path.clone(),
                        port: decl.output.clone(),
                        channel: decl.source_channel,
                        channels,
                    });
                }
                self.graph.host_outputs.push(HostOutput {
                    channel: decl.channel,
                    node: id.slot(),
                    output,
                    row: decl.source_channel,
                });
            }
        }
        Ok(())
    }

    fn add_publications(&mut self, desc: &GraphDescription) -> Result<PublishedSignals, BuildError> {
        let mut published = PublishedSignals::new();
        for signal in &desc.signals {
            let length = signal
                .length
                .unwrap_or(self.options.default_signal_length);
            if length == 0 {
                return Err(BuildError::Malformed(format!(
                    "signal '{}' has zero length",
                    signal.alias
                )));
            }
            let taps = self
                .graph
                .publish(&signal.alias, &signal.proc, &signal.output, signal.mode, length)?;
            published.register(signal.alias.clone(), taps);
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::registry;
    use super::*;
    use crate::description::{ContainerDescription, ProcDescription};
    use crate::graph::VectorOutcome;
    use crate::processor::ProcessContext;
    use crate::publish::CaptureMode;

    fn options(voices: usize) -> BuildOptions {
        BuildOptions {
            max_voices: voices,
            input_channels: 1,
            output_channels: 2,
            make_event_input: true,
            default_signal_length: 64,
        }
    }

    fn voice_desc() -> GraphDescription {
        GraphDescription::new()
            .node(
                ContainerDescription::new("voices").node(
                    ContainerDescription::per_voice("voice")
                        .node(ProcDescription::new("amp", "gain").param("gain", 0.5))
                        .node(ProcDescription::new("patcher", "pass"))
                        .connect("/the_midi_inputs.gate", "amp.in")
                        .with_voice_channel()
                        .connect("amp.out", "patcher.in"),
                ),
            )
            .output("voices/voice/patcher", "out", 0)
            .publish_with("voices/voice/amp", "out", "amps", CaptureMode::Fifo, Some(32))
    }

    #[test]
    fn test_singletons_always_present() {
        let built = build_graph(&GraphDescription::new(), &registry(), &options(2)).unwrap();
        let graph = built.graph;
        assert_eq!(
            graph.node_paths_in_order(),
            vec!["the_host_inputs", "the_midi_inputs", "the_host_phasor"]
        );
        assert!(graph.event_input().is_some());
        assert_eq!(graph.host_input_channels(), 1);

        let opts = BuildOptions {
            make_event_input: false,
            input_channels: 0,
            ..options(2)
        };
        let built = build_graph(&GraphDescription::new(), &registry(), &opts).unwrap();
        assert_eq!(built.graph.node_paths_in_order(), vec!["the_host_phasor"]);
    }

    #[test]
    fn test_per_voice_replication() {
        let built = build_graph(&voice_desc(), &registry(), &options(3)).unwrap();
        let graph = &built.graph;
        assert_eq!(graph.find("voices/voice/amp").len(), 3);
        assert!(graph.node_id("voices/voice#2/amp").is_some());
        assert!(graph.node_id("voices/voice#3/amp").is_none());
        assert_eq!(
            graph.node(graph.node_id("voices/voice#1/amp").unwrap()).unwrap().voice,
            Some(1)
        );
        assert_eq!(graph.patchers().len(), 3);
        assert_eq!(graph.host_outputs.len(), 3);
        assert_eq!(built.published.voice_count("amps"), 3);
        assert_eq!(built.published.buffer_length("amps"), 32);
        assert_eq!(
            graph.param("voices/voice#0/amp", "gain"),
            Some(&crate::param::ParamValue::Scalar(0.5))
        );
    }

    #[test]
    fn test_voice_channel_wiring() {
        let built = build_graph(&voice_desc(), &registry(), &options(2)).unwrap();
        let conns = built.graph.connections();
        assert!(conns.contains(&(
            "the_midi_inputs.gate[1]".to_string(),
            "voices/voice#1/amp.in".to_string()
        )));
    }

    #[test]
    fn test_unknown_class_fails_whole_build() {
        let desc = GraphDescription::new()
            .node(ProcDescription::new("ok", "pass"))
            .node(ProcDescription::new("bad", "wobble"));
        let err = build_graph(&desc, &registry(), &options(1)).err().unwrap();
        assert_eq!(
            err,
            BuildError::UnknownClass {
                class: "wobble".into(),
                path: "bad".into()
            }
        );
    }

    #[test]
    fn test_bad_references() {
        let reg = registry();
        let unknown_node = GraphDescription::new()
            .node(ProcDescription::new("a", "pass"))
            .connect("nope.out", "a.in");
        assert!(matches!(
            build_graph(&unknown_node, &reg, &options(1)),
            Err(BuildError::UnknownNode(_))
        ));

        let unknown_port = GraphDescription::new()
            .node(ProcDescription::new("a", "pass"))
            .node(ProcDescription::new("b", "pass"))
            .connect("a.wrong", "b.in");
        assert!(matches!(
            build_graph(&unknown_port, &reg, &options(1)),
            Err(BuildError::UnknownPort { .. })
        ));

        let doubled = GraphDescription::new()
            .node(ProcDescription::new("a", "pass"))
            .node(ProcDescription::new("b", "pass"))
            .connect("a.out", "b.in")
            .connect("/the_host_phasor.out", "b.in");
        assert!(matches!(
            build_graph(&doubled, &reg, &options(1)),
            Err(BuildError::InputAlreadyConnected { .. })
        ));

        let out_of_range = GraphDescription::new()
            .node(ProcDescription::new("a", "pass"))
            .connect_channel("the_midi_inputs.pitch", "a.in", 4);
        assert!(matches!(
            build_graph(&out_of_range, &reg, &options(4)),
            Err(BuildError::ChannelOutOfRange { channel: 4, channels: 4, .. })
        ));

        let unknown_param =
            GraphDescription::new().node(ProcDescription::new("a", "gain").param("drive", 1.0));
        assert!(matches!(
            build_graph(&unknown_param, &reg, &options(1)),
            Err(BuildError::UnknownParam { .. })
        ));

        let voice_outside = GraphDescription::new()
            .node(ProcDescription::new("a", "pass"))
            .node(
                ContainerDescription::new("c")
                    .connect("/the_midi_inputs.gate", "/a.in")
                    .with_voice_channel(),
            );
        assert!(matches!(
            build_graph(&voice_outside, &reg, &options(1)),
            Err(BuildError::Malformed(_))
        ));
    }

    #[test]
    fn test_constants_bind_inputs() {
        let desc = GraphDescription::new()
            .node(ProcDescription::new("g", "gain").constant("in", 2.0).param("gain", 0.5))
            .output("g", "out", 1);
        let mut built = build_graph(&desc, &registry(), &options(1)).unwrap();
        built
            .graph
            .compile(ProcessContext {
                sample_rate: 48000.0,
                vector_size: 8,
            })
            .unwrap();
        assert_eq!(built.graph.process_vector(), VectorOutcome::Done);
        assert_eq!(built.graph.host_mix().row(1), &[1.0; 8]);
        assert_eq!(built.graph.host_mix().row(0), &[0.0; 8]);
    }

    #[test]
    fn test_publish_unknown_node_is_error() {
        let desc = GraphDescription::new().publish("missing", "out", "sig");
        assert!(matches!(
            build_graph(&desc, &registry(), &options(1)),
            Err(BuildError::UnknownNode(_))
        ));
    }
}
