//! Patch files for vectra graphs.
//!
//! A patch is a TOML file with an `[engine]` table ([`EngineConfig`]) and a
//! `[graph]` table ([`GraphDescription`]). This crate loads and saves them,
//! checks them against a processor registry, and turns them into a compiled
//! [`DspEngine`].
//!
//! # Example
//!
//! ```rust,no_run
//! use vectra_config::Patch;
//! use vectra_core::ProcessorRegistry;
//! use vectra_registry::WithBuiltins;
//!
//! let patch = Patch::load("voices.toml").unwrap();
//! let mut engine = patch.instantiate(ProcessorRegistry::with_builtins()).unwrap();
//! engine.prepare(48000.0, 256, 0).unwrap();
//! ```
//!
//! [`EngineConfig`]: vectra_core::EngineConfig
//! [`GraphDescription`]: vectra_core::GraphDescription
//! [`DspEngine`]: vectra_core::DspEngine

mod error;
mod patch;

/// The bundled demo patch.
pub mod demo;

pub use demo::{DEMO_PATCH, demo_patch};
pub use error::ConfigError;
pub use patch::Patch;
