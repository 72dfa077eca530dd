//! Processing-time statistics and audio-thread diagnostics.

use std::time::Duration;

/// Counters the audio thread keeps instead of returning errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineDiagnostics {
    /// `process_block` calls.
    pub callbacks: u64,
    /// Vector steps run.
    pub vectors: u64,
    /// Callbacks made before a successful `prepare`; their output was zeroed.
    pub unprepared_callbacks: u64,
    /// Short reads from an input or output staging ring.
    pub starvation_events: u64,
    /// Vectors whose output contained a non-finite sample.
    pub numeric_faults: u64,
    /// Samples dropped by FIFO taps whose readers fell behind.
    pub dropped_tap_samples: u64,
    /// Queued control commands the audio thread could not apply: the
    /// processor refused the value, or the graph was rebuilt after sending.
    pub rejected_commands: u64,
}

/// One statistics flush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStats {
    /// Host samples covered by this report.
    pub samples: u64,
    /// Time spent in vector steps.
    pub busy: Duration,
    /// Average processing time per host sample, in microseconds.
    pub micros_per_sample: f64,
    /// Processing time over real time for the same samples.
    pub cpu_fraction: f64,
}

/// Accumulates per-callback timings and flushes once a second of audio has passed.
#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    samples: u64,
    busy: Duration,
}

impl StatsAccumulator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adds one callback. Returns a report when the accumulated samples
    /// exceed one second at `sample_rate`.
    pub fn record(&mut self, samples: usize, busy: Duration, sample_rate: f32) -> Option<EngineStats> {
        self.samples += samples as u64;
        self.busy += busy;
        if sample_rate <= 0.0 || (self.samples as f64) <= f64::from(sample_rate) {
            return None;
        }
        let secs = self.busy.as_secs_f64();
        let stats = EngineStats {
            samples: self.samples,
            busy: self.busy,
            micros_per_sample: secs * 1e6 / self.samples as f64,
            cpu_fraction: secs / (self.samples as f64 / f64::from(sample_rate)),
        };
        self.reset();
        Some(stats)
    }
}
