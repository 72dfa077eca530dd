//! Patch file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use vectra_core::{DspEngine, EngineConfig, GraphDescription, ProcessorRegistry};

use crate::error::ConfigError;

/// A patch: engine settings plus the graph to build.
///
/// # TOML Format
///
/// ```toml
/// name = "two voices"
///
/// [engine]
/// max_voices = 2
/// output_channels = 1
///
/// [[graph.nodes]]
/// name = "voices"
/// per_voice = true
/// connections = [
///     { from = "/the_midi_inputs.pitch", to = "osc.freq", channel = "voice" },
/// ]
///
/// [[graph.nodes.nodes]]
/// name = "osc"
/// class = "sine"
///
/// [[graph.outputs]]
/// proc = "voices/osc"
/// output = "out"
/// channel = 0
///
/// [[graph.signals]]
/// proc = "the_midi_inputs"
/// output = "pitch"
/// alias = "voicePitch"
/// length = 256
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Engine construction settings; every field has a default.
    #[serde(default)]
    pub engine: EngineConfig,

    /// The graph description.
    #[serde(default)]
    pub graph: GraphDescription,
}

impl Patch {
    /// Create a patch from parts.
    pub fn new(engine: EngineConfig, graph: GraphDescription) -> Self {
        Self {
            name: None,
            engine,
            graph,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Load a patch from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Load a patch from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the patch to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the patch to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the patch against `registry` without building it.
    ///
    /// Catches out-of-range engine settings, unknown classes and output
    /// declarations beyond the configured channel count. Wiring errors are
    /// only found by an actual build.
    pub fn validate(&self, registry: &ProcessorRegistry) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::InvalidEngine(e.to_string()))?;

        if let Some((path, class)) = self
            .graph
            .classes()
            .into_iter()
            .find(|(_, class)| !registry.contains(class))
        {
            return Err(ConfigError::UnknownClass { class, path });
        }

        if let Some(out) = self
            .graph
            .outputs
            .iter()
            .find(|o| o.channel >= self.engine.output_channels)
        {
            return Err(ConfigError::OutputChannel {
                proc: out.proc.clone(),
                channel: out.channel,
                available: self.engine.output_channels,
            });
        }
        Ok(())
    }

    /// Validates the patch, then creates an engine with its graph built and
    /// compiled. The caller still has to `prepare` it.
    pub fn instantiate(&self, registry: ProcessorRegistry) -> Result<DspEngine, ConfigError> {
        self.validate(&registry)?;
        let mut engine = DspEngine::new(self.engine.clone(), registry)?;
        engine.build_graph(&self.graph)?;
        engine.compile()?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectra_core::ProcDescription;
    use vectra_registry::WithBuiltins;

    #[test]
    fn test_defaults_fill_missing_tables() {
        let patch = Patch::from_toml_str("name = \"empty\"").unwrap();
        assert_eq!(patch.name.as_deref(), Some("empty"));
        assert_eq!(patch.engine, EngineConfig::default());
        assert!(patch.graph.nodes.is_empty());
    }

    #[test]
    fn test_engine_table_partial() {
        let patch = Patch::from_toml_str("[engine]\nmax_voices = 3\nvector_size = 32\n").unwrap();
        assert_eq!(patch.engine.max_voices, 3);
        assert_eq!(patch.engine.vector_size, 32);
        assert_eq!(patch.engine.output_channels, 2);
    }

    #[test]
    fn test_validate_unknown_class() {
        let patch = Patch::new(
            EngineConfig::default(),
            GraphDescription::new().node(ProcDescription::new("osc", "saw")),
        );
        let err = patch.validate(&ProcessorRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClass { ref class, .. } if class == "saw"));
    }

    #[test]
    fn test_validate_engine_settings() {
        let engine = EngineConfig {
            vector_size: 48,
            ..EngineConfig::default()
        };
        let patch = Patch::new(engine, GraphDescription::new());
        let err = patch.validate(&ProcessorRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEngine(_)));
    }

    #[test]
    fn test_validate_output_channel() {
        let graph = GraphDescription::new()
            .node(ProcDescription::new("c", "constant"))
            .output("c", "out", 2);
        let patch = Patch::new(EngineConfig::default(), graph);
        let err = patch.validate(&ProcessorRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, ConfigError::OutputChannel { channel: 2, available: 2, .. }));
    }

    #[test]
    fn test_bad_toml() {
        let err = Patch::from_toml_str("[engine\nmax_voices = ").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}
