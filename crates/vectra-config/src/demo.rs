//! A patch bundled with the library, used by the CLI when no file is given.

use crate::Patch;
use crate::error::ConfigError;

/// Four sine voices gated by the event front end, mixed to both host
/// channels, with voice pitch and voice output published.
pub const DEMO_PATCH: &str = r#"
name = "demo"

[engine]
max_voices = 4
output_channels = 2

[[graph.nodes]]
name = "voices"
per_voice = true
connections = [
    { from = "/the_midi_inputs.pitch", to = "osc.freq", channel = "voice" },
    { from = "osc.out", to = "amp.in1" },
    { from = "/the_midi_inputs.gate", to = "amp.in2", channel = "voice" },
    { from = "amp.out", to = "level.in" },
]

[[graph.nodes.nodes]]
name = "osc"
class = "sine"

[[graph.nodes.nodes]]
name = "amp"
class = "multiply"

[[graph.nodes.nodes]]
name = "level"
class = "gain"
attrs = { gain = 0.25 }

[[graph.outputs]]
proc = "voices/level"
output = "out"
channel = 0

[[graph.outputs]]
proc = "voices/level"
output = "out"
channel = 1

[[graph.signals]]
proc = "the_midi_inputs"
output = "pitch"
alias = "voicePitch"
length = 256

[[graph.signals]]
proc = "voices/level"
output = "out"
alias = "voiceOut"
mode = "fifo"
length = 4096
"#;

/// Parses [`DEMO_PATCH`].
pub fn demo_patch() -> Result<Patch, ConfigError> {
    Patch::from_toml_str(DEMO_PATCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectra_core::ProcessorRegistry;
    use vectra_registry::WithBuiltins;

    #[test]
    fn test_demo_patch_parses_and_validates() {
        let patch = demo_patch().unwrap();
        assert_eq!(patch.name.as_deref(), Some("demo"));
        assert_eq!(patch.engine.max_voices, 4);
        assert_eq!(patch.graph.signals.len(), 2);
        patch.validate(&ProcessorRegistry::with_builtins()).unwrap();
    }

    #[test]
    fn test_demo_patch_instantiates() {
        let patch = demo_patch().unwrap();
        let engine = patch.instantiate(ProcessorRegistry::with_builtins()).unwrap();
        assert_eq!(engine.published_voice_count("voicePitch"), 4);
        assert_eq!(engine.published_voice_count("voiceOut"), 4);
        assert_eq!(engine.published_buffer_length("voiceOut"), 4096);
    }
}
