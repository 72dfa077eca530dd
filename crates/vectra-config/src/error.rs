//! Error types for patch loading and validation.

use std::path::PathBuf;
use thiserror::Error;
use vectra_core::EngineError;

/// Errors that can occur while loading, validating or instantiating a patch.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A node names a class the registry does not know
    #[error("unknown processor class '{class}' at '{path}'")]
    UnknownClass {
        /// Class tag as written.
        class: String,
        /// Path of the entry naming it.
        path: String,
    },

    /// The `[engine]` table is out of range
    #[error("invalid [engine] settings: {0}")]
    InvalidEngine(String),

    /// An output declaration targets a host channel the engine does not have
    #[error("output of '{proc}' targets channel {channel}, but the engine has {available}")]
    OutputChannel {
        /// Node pattern of the declaration.
        proc: String,
        /// Requested host channel.
        channel: usize,
        /// Host output channels configured.
        available: usize,
    },

    /// Building, compiling or preparing the engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }
}
