//! Engine construction settings.
//!
//! [`EngineConfig`] is plain data so patch files can carry it as an
//! `[engine]` table; every field has a default.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Upper bound on polyphony accepted by [`EngineConfig::validate`].
pub const MAX_VOICES: usize = 64;

/// Largest vector size the engine accepts.
pub const MAX_VECTOR_SIZE: usize = 4096;

/// Settings fixed for the lifetime of a [`DspEngine`](crate::DspEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of copies made of each per-voice container, and the number of
    /// voices the event front end allocates over.
    pub max_voices: usize,
    /// Default processing vector size used when `prepare` is given zero.
    pub vector_size: usize,
    /// Host input channels fed to `the_host_inputs`. Zero omits the node.
    pub input_channels: usize,
    /// Host output channels.
    pub output_channels: usize,
    /// Create the `the_midi_inputs` event front end.
    pub make_event_input: bool,
    /// Measure processing time and log a summary once per second of audio.
    pub collect_stats: bool,
    /// Ring length for published signals that do not set one.
    pub default_signal_length: usize,
    /// Bounded capacity of the control command queue.
    pub control_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_voices: 8,
            vector_size: 64,
            input_channels: 0,
            output_channels: 2,
            make_event_input: true,
            collect_stats: false,
            default_signal_length: 128,
            control_queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Checks that every setting is in range.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_voices == 0 || self.max_voices > MAX_VOICES {
            return Err(EngineError::InvalidConfig(format!(
                "max_voices must be in 1..={MAX_VOICES}, got {}",
                self.max_voices
            )));
        }
        validate_vector_size(self.vector_size)?;
        if self.default_signal_length == 0 {
            return Err(EngineError::InvalidConfig(
                "default_signal_length must be greater than zero".into(),
            ));
        }
        if self.control_queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "control_queue_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Vector sizes must be non-zero powers of two no larger than [`MAX_VECTOR_SIZE`].
pub fn validate_vector_size(size: usize) -> Result<(), EngineError> {
    if size == 0 || !size.is_power_of_two() || size > MAX_VECTOR_SIZE {
        return Err(EngineError::InvalidConfig(format!(
            "vector size must be a power of two in 1..={MAX_VECTOR_SIZE}, got {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_voices() {
        let config = EngineConfig {
            max_voices: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn vector_size_must_be_power_of_two() {
        assert!(validate_vector_size(64).is_ok());
        assert!(validate_vector_size(1).is_ok());
        assert!(validate_vector_size(48).is_err());
        assert!(validate_vector_size(0).is_err());
        assert!(validate_vector_size(MAX_VECTOR_SIZE * 2).is_err());
    }
}
