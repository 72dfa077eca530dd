use crate::processor::{Inputs, ProcessContext, Processor};
use crate::signal::SignalBuffer;

/// Output names of [`HostInputs`].
pub const HOST_INPUT_OUTPUTS: &[&str] = &["out"];

/// Exposes the host's input channels as one multi-channel output.
///
/// The scheduler fills the output directly from the input rings before each
/// vector step, so `process` leaves it untouched.
#[derive(Debug, Clone)]
pub struct HostInputs {
    channels: usize,
}

impl HostInputs {
    /// A node carrying `channels` host input channels.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Processor for HostInputs {
    fn output_channels(&self, _output: usize) -> usize {
        self.channels
    }

    fn process(&mut self, _: &Inputs<'_>, _: &mut [SignalBuffer], _: &ProcessContext) {}
}
