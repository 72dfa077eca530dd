//! Declarative graph descriptions.
//!
//! A [`GraphDescription`] is the tree the builder walks: processor entries,
//! containers (optionally replicated once per voice), connections between
//! named ports, host output declarations and signal publications. It
//! deserializes from patch files and can also be assembled in code:
//!
//! ```rust
//! use vectra_core::description::{ContainerDescription, GraphDescription, ProcDescription};
//!
//! let desc = GraphDescription::new()
//!     .node(
//!         ContainerDescription::per_voice("voices")
//!             .node(ProcDescription::new("osc", "sine"))
//!             .connect("/the_midi_inputs.pitch", "osc.freq")
//!             .with_voice_channel(),
//!     )
//!     .output("voices/osc", "out", 0)
//!     .publish("voices/osc", "out", "oscs");
//! assert_eq!(desc.nodes.len(), 1);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::param::ParamValue;
use crate::publish::CaptureMode;

/// A named attribute on a processor entry.
///
/// Attributes configure construction (as opposed to parameters, which can
/// change at run time). Lookups coerce between forms where lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String or path.
    Text(String),
}

impl AttrValue {
    /// Integer view: integers, integral floats and numeric strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view: any number or numeric string.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// String view. Numbers are not stringified.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Path view: a string with any leading separator removed.
    pub fn as_path(&self) -> Option<&str> {
        self.as_str().map(crate::path::normalize)
    }

    /// Boolean view: booleans, and integers as non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// One processor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcDescription {
    /// Instance name, unique among its siblings.
    pub name: String,
    /// Registry class tag.
    pub class: String,
    /// Construction attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
    /// Initial parameter values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,
    /// Inputs bound to a constant instead of a signal.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, f32>,
}

impl ProcDescription {
    /// Creates an entry with no attributes, parameters or constants.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            attrs: BTreeMap::new(),
            params: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Adds an initial parameter value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Binds an input to a constant.
    pub fn constant(mut self, input: impl Into<String>, value: f32) -> Self {
        self.constants.insert(input.into(), value);
        self
    }
}

/// A named group of nodes with its own local connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDescription {
    /// Container name. Copies are named `name#0`, `name#1`, ...
    pub name: String,
    /// Replicate once per voice.
    #[serde(default)]
    pub per_voice: bool,
    /// Fixed number of copies, for replication not tied to polyphony.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<usize>,
    /// Children in declaration order.
    pub nodes: Vec<NodeDescription>,
    /// Connections resolved relative to each copy of this container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionDescription>,
}

impl ContainerDescription {
    /// A container instantiated once.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            per_voice: false,
            copies: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// A container instantiated once per voice.
    pub fn per_voice(name: impl Into<String>) -> Self {
        Self {
            per_voice: true,
            ..Self::new(name)
        }
    }

    /// Adds a child.
    pub fn node(mut self, node: impl Into<NodeDescription>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Adds a connection between two `path.port` references.
    pub fn connect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(ConnectionDescription::new(from, to));
        self
    }

    /// Makes the most recently added connection read the copy's own voice channel.
    pub fn with_voice_channel(mut self) -> Self {
        if let Some(last) = self.connections.last_mut() {
            last.channel = Some(ChannelSelect::Keyword(ChannelKeyword::Voice));
        }
        self
    }
}

/// A node entry: a processor or a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeDescription {
    /// A processor instance.
    Proc(ProcDescription),
    /// A container of further nodes.
    Container(ContainerDescription),
}

impl NodeDescription {
    /// The entry's own name.
    pub fn name(&self) -> &str {
        match self {
            Self::Proc(p) => &p.name,
            Self::Container(c) => &c.name,
        }
    }
}

impl From<ProcDescription> for NodeDescription {
    fn from(p: ProcDescription) -> Self {
        Self::Proc(p)
    }
}

impl From<ContainerDescription> for NodeDescription {
    fn from(c: ContainerDescription) -> Self {
        Self::Container(c)
    }
}

/// Keyword channel selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKeyword {
    /// The voice index of the enclosing per-voice copy.
    Voice,
}

/// Which channel of a multi-channel source a connection reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelSelect {
    /// A fixed channel.
    Index(usize),
    /// A keyword.
    Keyword(ChannelKeyword),
}

/// A wire from `from` (`path.output`) to `to` (`path.input`).
///
/// Paths are relative to the enclosing container copy unless they start
/// with `/`, in which case they are resolved from the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    /// Source `path.output`.
    pub from: String,
    /// Destination `path.input`.
    pub to: String,
    /// Source channel; channel 0 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelSelect>,
}

impl ConnectionDescription {
    /// Creates a connection reading channel 0.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            channel: None,
        }
    }
}

/// A host output channel fed by every node matching `proc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescription {
    /// Node path pattern.
    pub proc: String,
    /// Output name.
    pub output: String,
    /// Host output channel.
    pub channel: usize,
    /// Row of the source output to route, for multi-channel outputs.
    #[serde(default)]
    pub source_channel: usize,
}

/// A published-signal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescription {
    /// Node path pattern; may match several voice copies.
    pub proc: String,
    /// Output name.
    pub output: String,
    /// External name readers use.
    pub alias: String,
    /// How readers consume the ring.
    #[serde(default)]
    pub mode: CaptureMode,
    /// Ring length in samples; the engine default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

/// The root of a graph description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDescription {
    /// Top-level nodes in declaration order.
    pub nodes: Vec<NodeDescription>,
    /// Top-level connections.
    pub connections: Vec<ConnectionDescription>,
    /// Host output declarations.
    pub outputs: Vec<OutputDescription>,
    /// Signal publications.
    pub signals: Vec<SignalDescription>,
}

impl GraphDescription {
    /// An empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a top-level node.
    pub fn node(mut self, node: impl Into<NodeDescription>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Adds a top-level connection.
    pub fn connect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(ConnectionDescription::new(from, to));
        self
    }

    /// Adds a connection reading a fixed source channel.
    pub fn connect_channel(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        channel: usize,
    ) -> Self {
        let mut conn = ConnectionDescription::new(from, to);
        conn.channel = Some(ChannelSelect::Index(channel));
        self.connections.push(conn);
        self
    }

    /// Routes every node matching `proc` to a host output channel.
    pub fn output(
        mut self,
        proc: impl Into<String>,
        output: impl Into<String>,
        channel: usize,
    ) -> Self {
        self.outputs.push(OutputDescription {
            proc: proc.into(),
            output: output.into(),
            channel,
            source_channel: 0,
        });
        self
    }

    /// Publishes an output with the default capture mode and length.
    pub fn publish(
        self,
        proc: impl Into<String>,
        output: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.publish_with(proc, output, alias, CaptureMode::default(), None)
    }

    /// Publishes an output with an explicit capture mode and ring length.
    pub fn publish_with(
        mut self,
        proc: impl Into<String>,
        output: impl Into<String>,
        alias: impl Into<String>,
        mode: CaptureMode,
        length: Option<usize>,
    ) -> Self {
        self.signals.push(SignalDescription {
            proc: proc.into(),
            output: output.into(),
            alias: alias.into(),
            mode,
            length,
        });
        self
    }

    /// Every processor class named anywhere in the tree, with the path of the
    /// entry that names it (copy suffixes omitted).
    pub fn classes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        collect_classes(&self.nodes, "", &mut out);
        out
    }
}

fn collect_classes(nodes: &[NodeDescription], prefix: &str, out: &mut Vec<(String, String)>) {
    for node in nodes {
        let path = crate::path::join(prefix, node.name());
        match node {
            NodeDescription::Proc(p) => out.push((path, p.class.clone())),
            NodeDescription::Container(c) => collect_classes(&c.nodes, &path, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_coercion() {
        assert_eq!(AttrValue::Int(4).as_int(), Some(4));
        assert_eq!(AttrValue::Float(4.0).as_int(), Some(4));
        assert_eq!(AttrValue::Float(4.5).as_int(), None);
        assert_eq!(AttrValue::Text(" 12 ".into()).as_int(), Some(12));
        assert_eq!(AttrValue::Int(3).as_float(), Some(3.0));
        assert_eq!(AttrValue::Text("/a/b".into()).as_path(), Some("a/b"));
        assert_eq!(AttrValue::Int(1).as_str(), None);
        assert_eq!(AttrValue::Int(0).as_bool(), Some(false));
    }

    #[test]
    fn builder_helpers() {
        let desc = GraphDescription::new()
            .node(
                ContainerDescription::per_voice("voices")
                    .node(ProcDescription::new("osc", "sine").param("gain", 0.5))
                    .connect("/the_midi_inputs.pitch", "osc.freq")
                    .with_voice_channel(),
            )
            .publish("voices/osc", "out", "oscs");
        assert_eq!(
            desc.classes(),
            vec![("voices/osc".to_string(), "sine".to_string())]
        );
        let NodeDescription::Container(c) = &desc.nodes[0] else {
            panic!("expected container");
        };
        assert_eq!(
            c.connections[0].channel,
            Some(ChannelSelect::Keyword(ChannelKeyword::Voice))
        );
        assert_eq!(desc.signals[0].mode, CaptureMode::MostRecent);
    }
}
