//! Singleton nodes the builder creates itself.
//!
//! - [`HostInputs`] (`the_host_inputs`): host input channels as a signal.
//! - [`EventsToSignals`] (`the_midi_inputs`): note and controller events as per-voice signals.
//! - [`HostPhasor`] (`the_host_phasor`): a beat-locked ramp driven by the host transport.

mod events;
mod host_input;
mod phasor;

pub use events::{EVENT_OUTPUTS, EventsToSignals, NoteEvent};
pub use host_input::{HOST_INPUT_OUTPUTS, HostInputs};
pub use phasor::{HOST_PHASOR_OUTPUTS, HostPhasor};

/// Path of the host input node.
pub const HOST_INPUTS_NAME: &str = "the_host_inputs";
/// Path of the event front end.
pub const EVENT_INPUT_NAME: &str = "the_midi_inputs";
/// Path of the host phasor.
pub const HOST_PHASOR_NAME: &str = "the_host_phasor";

/// Class tag reported for the host input node.
pub const HOST_INPUTS_CLASS: &str = "host_inputs";
/// Class tag reported for the event front end.
pub const EVENT_INPUT_CLASS: &str = "events_to_signals";
/// Class tag reported for the host phasor.
pub const HOST_PHASOR_CLASS: &str = "host_phasor";
