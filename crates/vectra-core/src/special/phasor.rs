use crate::processor::{Inputs, ProcessContext, Processor};
use crate::signal::SignalBuffer;

/// Output names of [`HostPhasor`].
pub const HOST_PHASOR_OUTPUTS: &[&str] = &["out"];

/// A 0..1 ramp per beat, locked to the host transport.
///
/// The engine calls [`set_time_and_rate`](Self::set_time_and_rate) once per
/// host callback. While the transport runs the phase is resynchronised to the
/// fractional part of the host beat position and then advances at the host
/// tempo for every sample produced. When stopped the output is zero.
#[derive(Debug, Clone, Default)]
pub struct HostPhasor {
    sample_rate: f32,
    phase: f64,
    bpm: f64,
    playing: bool,
    secs: f64,
}

impl HostPhasor {
    /// A stopped phasor.
    pub fn new() -> Self {
        Self {
            sample_rate: 48000.0,
            ..Self::default()
        }
    }

    /// Host transport update: wall-clock position, beat position, tempo and run state.
    pub fn set_time_and_rate(&mut self, secs: f64, ppq_position: f64, bpm: f64, playing: bool) {
        self.secs = secs;
        self.bpm = bpm.max(0.0);
        self.playing = playing && bpm > 0.0;
        if self.playing {
            self.phase = ppq_position.rem_euclid(1.0);
        } else {
            self.phase = 0.0;
        }
    }

    /// Host time in seconds from the last transport update.
    pub fn secs(&self) -> f64 {
        self.secs
    }

    /// Returns true while the host transport runs.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current phase in 0..1.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    fn increment(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.bpm / 60.0 / f64::from(self.sample_rate)
    }
}

impl Processor for HostPhasor {
    fn prepare(&mut self, ctx: &ProcessContext) {
        self.sample_rate = ctx.sample_rate;
    }

    fn process(&mut self, _: &Inputs<'_>, outputs: &mut [SignalBuffer], _: &ProcessContext) {
        let Some(out) = outputs.first_mut() else {
            return;
        };
        let out = out.row_mut(0);
        if !self.playing {
            out.fill(0.0);
            return;
        }
        let inc = self.increment();
        for sample in out.iter_mut() {
            *sample = self.phase as f32;
            self.phase += inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
