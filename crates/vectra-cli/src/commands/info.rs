//! Display the structure of a compiled patch.

use std::path::PathBuf;

use clap::Args;
use vectra_core::ProcessorRegistry;
use vectra_registry::WithBuiltins;

use super::common::{load_patch, patch_name};

/// Build and compile a patch, then print its nodes, wiring and publications.
#[derive(Args)]
pub struct InfoArgs {
    /// Patch file (TOML). The bundled demo is used when omitted.
    pub patch: Option<PathBuf>,

    /// Also list every connection
    #[arg(long)]
    pub connections: bool,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let patch = load_patch(args.patch.as_deref())?;
    let engine = patch.instantiate(ProcessorRegistry::with_builtins())?;
    let graph = engine
        .graph()
        .ok_or_else(|| anyhow::anyhow!("patch produced no graph"))?;

    let config = engine.config();
    println!("Patch:       {}", patch_name(&patch));
    println!(
        "Engine:      {} voices, vector {}, {} in / {} out",
        config.max_voices, config.vector_size, config.input_channels, config.output_channels
    );
    println!("Nodes:       {}", graph.node_count());
    println!();

    println!("Compiled order:");
    for (step, id) in graph.compiled_order().into_iter().enumerate() {
        if let Some(node) = graph.node(id) {
            let state = if node.enabled { "" } else { "  (disabled)" };
            println!("  {step:3}  {:32}  {}{state}", node.path, node.class);
        }
    }

    if args.connections {
        println!();
        println!("Connections:");
        for (from, to) in graph.connections() {
            println!("  {from:40} -> {to}");
        }
    }

    let patchers = engine.patcher_list();
    if !patchers.is_empty() {
        println!();
        println!("Patchers:");
        for &id in patchers {
            if let Some(node) = graph.node(id) {
                println!("  {}", node.path);
            }
        }
    }

    if !patch.graph.signals.is_empty() {
        println!();
        println!("Published signals:");
        for signal in &patch.graph.signals {
            println!(
                "  {:16}  {}.{}  taps: {}  length: {}",
                signal.alias,
                signal.proc,
                signal.output,
                engine.published_voice_count(&signal.alias),
                engine.published_buffer_length(&signal.alias)
            );
        }
    }

    Ok(())
}
