//! Published signals: named taps on processor outputs.
//!
//! Publishing attaches one tap per matching node (and per channel of the
//! tapped output) under an alias. The audio thread owns the writing halves
//! ([`TapWriter`], stored in the graph) and pushes every vector into them
//! without locking. The reading halves ([`TapReader`]) live in
//! [`PublishedSignals`], which a UI or control thread reads through a
//! [`SignalReader`].
//!
//! A [`CaptureMode::Fifo`] tap is a bounded ring: samples a slow reader has
//! not collected are dropped and counted. A [`CaptureMode::MostRecent`] tap is
//! a [`window`](crate::window) that overwrites its oldest samples instead, so
//! a reader polling at any rate always gets the newest signal.
//!
//! A read fills one row of the destination per enabled tap, in voice order.
//! Rows are zeroed first and each tap's samples are written left-aligned, so
//! columns past a tap's own sample count stay zero. The returned
//! [`PublishedRead`] carries the row count and the minimum sample count
//! across the rows read.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ResourceError;
use crate::ring::{RingReader, RingWriter, sample_ring};
use crate::signal::SignalBuffer;
use crate::window::{WindowReader, WindowWriter, latest_window};

/// How a reader consumes a tap's ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Discard older samples and return the newest that fit the destination.
    #[default]
    MostRecent,
    /// Return the oldest unread samples in order.
    Fifo,
}

/// Result of a published-signal read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedRead {
    /// Rows filled, one per enabled tap read.
    pub rows: usize,
    /// Fewest samples read into any of those rows.
    pub samples: usize,
}

impl PublishedRead {
    /// Nothing was read: unknown alias or no enabled taps.
    pub const NOTHING: Self = Self {
        rows: 0,
        samples: 0,
    };

    /// Returns true if no rows were read.
    pub fn is_nothing(&self) -> bool {
        self.rows == 0
    }
}

/// Opens one tap of `capacity` samples in `mode`.
pub(crate) fn open_tap(
    mode: CaptureMode,
    capacity: usize,
) -> Result<(TapSink, TapSource), ResourceError> {
    Ok(match mode {
        CaptureMode::MostRecent => {
            let (w, r) = latest_window(capacity)?;
            (TapSink::Latest(w), TapSource::Latest(r))
        }
        CaptureMode::Fifo => {
            let (w, r) = sample_ring(capacity)?;
            (TapSink::Fifo(w), TapSource::Fifo(r))
        }
    })
}

/// Storage written by the audio thread.
pub(crate) enum TapSink {
    Latest(WindowWriter),
    Fifo(RingWriter),
}

/// Storage read by [`PublishedSignals`].
pub(crate) enum TapSource {
    Latest(WindowReader),
    Fifo(RingReader),
}

/// Audio-side half of a tap.
pub(crate) struct TapWriter {
    /// Publication the tap belongs to; republishing an alias retires its writers.
    pub alias: String,
    pub node: usize,
    pub output: usize,
    pub channel: usize,
    pub sink: TapSink,
}

impl TapWriter {
    pub fn write(&mut self, samples: &[f32]) {
        match &mut self.sink {
            TapSink::Latest(w) => w.write(samples),
            TapSink::Fifo(w) => {
                w.write(samples);
            }
        }
    }

    /// Samples a FIFO tap dropped because its reader fell behind.
    pub fn dropped(&self) -> u64 {
        match &self.sink {
            TapSink::Latest(_) => 0,
            TapSink::Fifo(w) => w.dropped(),
        }
    }
}

/// Reader-side half of a tap.
pub struct TapReader {
    source: TapSource,
    enabled: Arc<AtomicBool>,
    name: String,
}

impl TapReader {
    pub(crate) fn new(source: TapSource, enabled: Arc<AtomicBool>, name: String) -> Self {
        Self {
            source,
            enabled,
            name,
        }
    }

    /// Whether the tapped node is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Tap length in samples.
    pub fn capacity(&self) -> usize {
        match &self.source {
            TapSource::Latest(r) => r.capacity(),
            TapSource::Fifo(r) => r.capacity(),
        }
    }

    /// `path.output[channel]` of the tapped signal.
    pub fn source(&self) -> &str {
        &self.name
    }

    /// Capture mode.
    pub fn mode(&self) -> CaptureMode {
        match self.source {
            TapSource::Latest(_) => CaptureMode::MostRecent,
            TapSource::Fifo(_) => CaptureMode::Fifo,
        }
    }

    fn read_into(&mut self, dest: &mut [f32]) -> usize {
        match &mut self.source {
            TapSource::Latest(r) => r.read(dest),
            TapSource::Fifo(r) => r.read(dest),
        }
    }
}

/// All publications of one graph, keyed by alias.
#[derive(Default)]
pub struct PublishedSignals {
    aliases: HashMap<String, Vec<TapReader>>,
}

impl PublishedSignals {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers taps under `alias`, replacing any earlier registration.
    pub fn register(&mut self, alias: impl Into<String>, taps: Vec<TapReader>) {
        self.aliases.insert(alias.into(), taps);
    }

    /// Drops every publication.
    pub fn clear(&mut self) {
        self.aliases.clear();
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.aliases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Taps registered under `alias`, in voice order.
    pub fn taps(&self, alias: &str) -> &[TapReader] {
        self.aliases.get(alias).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total taps under `alias`; zero for unknown aliases.
    pub fn voice_count(&self, alias: &str) -> usize {
        self.taps(alias).len()
    }

    /// Currently enabled taps under `alias`.
    pub fn enabled_voice_count(&self, alias: &str) -> usize {
        self.taps(alias).iter().filter(|t| t.is_enabled()).count()
    }

    /// Ring capacity of the first tap under `alias`; zero for unknown aliases.
    pub fn buffer_length(&self, alias: &str) -> usize {
        self.taps(alias).first().map_or(0, TapReader::capacity)
    }

    /// Reads every enabled tap under `alias` into successive rows of `dest`.
    ///
    /// `dest` is zeroed first. Taps beyond `dest.channels()` are left unread.
    /// Unknown aliases and aliases with no enabled taps return
    /// [`PublishedRead::NOTHING`].
    pub fn read(&mut self, alias: &str, dest: &mut SignalBuffer) -> PublishedRead {
        dest.clear();
        let Some(taps) = self.aliases.get_mut(alias) else {
            return PublishedRead::NOTHING;
        };
        let mut rows = 0;
        let mut min_samples = usize::MAX;
        for tap in taps.iter_mut().filter(|t| t.is_enabled()) {
            if rows >= dest.channels() {
                break;
            }
            let n = tap.read_into(dest.row_mut(rows));
            min_samples = min_samples.min(n);
            rows += 1;
        }
        if rows == 0 {
            return PublishedRead::NOTHING;
        }
        PublishedRead {
            rows,
            samples: min_samples,
        }
    }
}

/// Shareable read access to an engine's published signals.
///
/// Cloning is cheap. The lock is only ever taken by readers and by graph
/// rebuilds, never by the audio thread.
#[derive(Clone, Default)]
pub struct SignalReader {
    inner: Arc<Mutex<PublishedSignals>>,
}

impl SignalReader {
    /// Creates a reader over an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`PublishedSignals::read`].
    pub fn read(&self, alias: &str, dest: &mut SignalBuffer) -> PublishedRead {
        self.inner.lock().read(alias, dest)
    }

    /// See [`PublishedSignals::voice_count`].
    pub fn voice_count(&self, alias: &str) -> usize {
        self.inner.lock().voice_count(alias)
    }

    /// See [`PublishedSignals::enabled_voice_count`].
    pub fn enabled_voice_count(&self, alias: &str) -> usize {
        self.inner.lock().enabled_voice_count(alias)
    }

    /// See [`PublishedSignals::buffer_length`].
    pub fn buffer_length(&self, alias: &str) -> usize {
        self.inner.lock().buffer_length(alias)
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        self.inner
            .lock()
            .aliases()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn replace(&self, signals: PublishedSignals) {
        *self.inner.lock() = signals;
    }

    pub(crate) fn register(&self, alias: &str, taps: Vec<TapReader>) {
        self.inner.lock().register(alias, taps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap(capacity: usize, mode: CaptureMode, enabled: bool) -> (TapWriter, TapReader) {
        let (sink, source) = open_tap(mode, capacity).unwrap();
        let flag = Arc::new(AtomicBool::new(enabled));
        let writer = TapWriter {
            alias: "sig".into(),
            node: 0,
            output: 0,
            channel: 0,
            sink,
        };
        (writer, TapReader::new(source, flag, "n.out[0]".into()))
    }

    #[test]
    fn unknown_alias_reads_nothing() {
        let mut signals = PublishedSignals::new();
        let mut dest = SignalBuffer::new(8, 2);
        dest.fill(5.0);
        assert_eq!(signals.read("missing", &mut dest), PublishedRead::NOTHING);
        assert!(dest.as_slice().iter().all(|&s| s == 0.0));
        assert_eq!(signals.voice_count("missing"), 0);
        assert_eq!(signals.buffer_length("missing"), 0);
    }

    #[test]
    fn rows_follow_enabled_taps_and_zero_fill() {
        let (mut w0, r0) = tap(16, CaptureMode::Fifo, true);
        let (mut w1, r1) = tap(16, CaptureMode::Fifo, false);
        let (mut w2, r2) = tap(16, CaptureMode::Fifo, true);
        w0.write(&[1.0, 1.0, 1.0, 1.0]);
        w1.write(&[2.0; 4]);
        w2.write(&[3.0, 3.0]);

        let mut signals = PublishedSignals::new();
        signals.register("sig", vec![r0, r1, r2]);
        assert_eq!(signals.voice_count("sig"), 3);
        assert_eq!(signals.enabled_voice_count("sig"), 2);
        assert_eq!(signals.buffer_length("sig"), 16);

        let mut dest = SignalBuffer::new(4, 3);
        let read = signals.read("sig", &mut dest);
        assert_eq!(read, PublishedRead { rows: 2, samples: 2 });
        assert_eq!(dest.row(0), &[1.0; 4]);
        assert_eq!(dest.row(1), &[3.0, 3.0, 0.0, 0.0]);
        assert_eq!(dest.row(2), &[0.0; 4]);
    }

    #[test]
    fn most_recent_returns_newest() {
        let (mut w, r) = tap(16, CaptureMode::MostRecent, true);
        w.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut signals = PublishedSignals::new();
        signals.register("sig", vec![r]);
        let mut dest = SignalBuffer::new(2, 1);
        assert_eq!(signals.read("sig", &mut dest).samples, 2);
        assert_eq!(dest.row(0), &[4.0, 5.0]);
    }

    #[test]
    fn most_recent_overwrites_instead_of_dropping() {
        let (mut w, r) = tap(4, CaptureMode::MostRecent, true);
        for block in 0..6 {
            let base = block as f32 * 2.0;
            w.write(&[base, base + 1.0]);
        }
        assert_eq!(w.dropped(), 0);
        let mut signals = PublishedSignals::new();
        signals.register("sig", vec![r]);
        let mut dest = SignalBuffer::new(4, 1);
        assert_eq!(signals.read("sig", &mut dest).samples, 4);
        assert_eq!(dest.row(0), &[8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn fifo_drops_what_does_not_fit() {
        let (mut w, r) = tap(4, CaptureMode::Fifo, true);
        w.write(&[1.0, 2.0, 3.0]);
        w.write(&[4.0, 5.0, 6.0]);
        assert_eq!(w.dropped(), 2);
        assert_eq!(r.mode(), CaptureMode::Fifo);
        let mut signals = PublishedSignals::new();
        signals.register("sig", vec![r]);
        let mut dest = SignalBuffer::new(4, 1);
        signals.read("sig", &mut dest);
        assert_eq!(dest.row(0), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn all_disabled_reads_nothing() {
        let (_w, r) = tap(8, CaptureMode::Fifo, false);
        let reader = SignalReader::new();
        reader.register("sig", vec![r]);
        let mut dest = SignalBuffer::new(4, 1);
        assert!(reader.read("sig", &mut dest).is_nothing());
        assert_eq!(reader.voice_count("sig"), 1);
        assert_eq!(reader.aliases(), vec!["sig".to_string()]);
    }
}
