//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::Context;
use vectra_config::{Patch, demo_patch};

/// Loads `path`, or the bundled demo patch when none is given.
pub fn load_patch(path: Option<&Path>) -> anyhow::Result<Patch> {
    match path {
        Some(path) => {
            Patch::load(path).with_context(|| format!("loading patch {}", path.display()))
        }
        None => {
            tracing::info!("no patch given, using the bundled demo");
            Ok(demo_patch()?)
        }
    }
}

/// Display name of a patch.
pub fn patch_name(patch: &Patch) -> &str {
    patch.name.as_deref().unwrap_or("(unnamed)")
}
