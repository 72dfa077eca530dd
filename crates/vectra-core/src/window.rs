//! Newest-sample windows for most-recent publication.
//!
//! A window always holds the last `capacity` samples written to it. The
//! writer never waits and never drops: once the window is full each write
//! overwrites the oldest samples. Slots store `f32` bit patterns in
//! `AtomicU32`s, so a reader running alongside the audio thread sees either
//! the old or the new value of a slot, never a torn one.
//!
//! Two counters bracket every write. `claimed` is raised before any slot is
//! touched and `committed` after the last one, so a reader that compares its
//! copy against `claimed` can discard any slot overwritten while it read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};

use crate::error::ResourceError;
use crate::ring::MAX_RING_CAPACITY;

struct Shared {
    slots: Box<[AtomicU32]>,
    /// Stream index one past the last sample a write has started on.
    claimed: AtomicU64,
    /// Stream index one past the last fully written sample.
    committed: AtomicU64,
}

impl Shared {
    #[inline]
    fn slot(&self, index: u64) -> &AtomicU32 {
        &self.slots[(index % self.slots.len() as u64) as usize]
    }
}

/// Creates a window holding up to `capacity` samples.
pub fn latest_window(capacity: usize) -> Result<(WindowWriter, WindowReader), ResourceError> {
    if capacity > MAX_RING_CAPACITY {
        return Err(ResourceError::RingTooLarge {
            requested: capacity,
            max: MAX_RING_CAPACITY,
        });
    }
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        claimed: AtomicU64::new(0),
        committed: AtomicU64::new(0),
    });
    Ok((
        WindowWriter {
            shared: Arc::clone(&shared),
            head: 0,
        },
        WindowReader { shared, seen: 0 },
    ))
}

/// Writing half of a window. Lives on the audio thread.
pub struct WindowWriter {
    shared: Arc<Shared>,
    head: u64,
}

impl WindowWriter {
    /// Appends `samples`, overwriting the oldest ones when the window is full.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let capacity = self.shared.slots.len();
        let end = self.head + samples.len() as u64;
        self.shared.claimed.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        // Only the last `capacity` samples of a long write can survive it.
        let skip = samples.len().saturating_sub(capacity);
        let mut index = self.head + skip as u64;
        for &s in &samples[skip..] {
            self.shared.slot(index).store(s.to_bits(), Ordering::Relaxed);
            index += 1;
        }
        self.shared.committed.store(end, Ordering::Release);
        self.head = end;
    }

    /// Window length in samples.
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}

/// Reading half of a window.
pub struct WindowReader {
    shared: Arc<Shared>,
    /// Stream index one past the newest sample already returned.
    seen: u64,
}

impl WindowReader {
    /// Window length in samples.
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Samples written since the last read that are still in the window.
    pub fn available(&self) -> usize {
        let end = self.shared.committed.load(Ordering::Acquire);
        ((end - self.seen) as usize).min(self.capacity())
    }

    /// Copies the newest unread samples into the front of `dest`, oldest
    /// first, and marks everything written so far as read. Returns the
    /// number copied.
    pub fn read(&mut self, dest: &mut [f32]) -> usize {
        let end = self.shared.committed.load(Ordering::Acquire);
        let unread = ((end - self.seen) as usize).min(self.capacity());
        let n = dest.len().min(unread);
        let start = end - n as u64;
        for (k, d) in dest[..n].iter_mut().enumerate() {
            *d = f32::from_bits(self.shared.slot(start + k as u64).load(Ordering::Relaxed));
        }
        fence(Ordering::Acquire);
        let claimed = self.shared.claimed.load(Ordering::Relaxed);
        self.seen = end;

        // Slots below `claimed - capacity` may hold newer samples by now.
        let oldest_intact = claimed.saturating_sub(self.capacity() as u64);
        let torn = (oldest_intact.saturating_sub(start) as usize).min(n);
        if torn > 0 {
            dest.copy_within(torn..n, 0);
        }
        n - torn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_when_reader_lags() {
        let (mut w, mut r) = latest_window(8).unwrap();
        for block in 0..10 {
            let base = block as f32 * 4.0;
            w.write(&[base, base + 1.0, base + 2.0, base + 3.0]);
        }
        let mut out = [0.0; 4];
        assert_eq!(r.read(&mut out), 4);
        assert_eq!(out, [36.0, 37.0, 38.0, 39.0]);
    }

    #[test]
    fn read_consumes_everything_written() {
        let (mut w, mut r) = latest_window(8).unwrap();
        w.write(&[1.0, 2.0, 3.0]);
        let mut out = [0.0; 2];
        assert_eq!(r.read(&mut out), 2);
        assert_eq!(out, [2.0, 3.0]);
        assert_eq!(r.available(), 0);
        assert_eq!(r.read(&mut out), 0);

        w.write(&[4.0]);
        assert_eq!(r.available(), 1);
        assert_eq!(r.read(&mut out), 1);
        assert_eq!(out[0], 4.0);
    }

    #[test]
    fn read_is_limited_by_capacity() {
        let (mut w, mut r) = latest_window(4).unwrap();
        let samples: Vec<f32> = (0..11).map(|i| i as f32).collect();
        w.write(&samples);
        let mut out = [0.0; 16];
        assert_eq!(r.read(&mut out), 4);
        assert_eq!(&out[..4], &[7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn concurrent_reads_stay_in_order() {
        let (mut w, mut r) = latest_window(64).unwrap();
        let reader = std::thread::spawn(move || {
            let mut out = [0.0; 64];
            for _ in 0..2000 {
                let n = r.read(&mut out);
                for pair in out[..n].windows(2) {
                    assert_eq!(pair[1], pair[0] + 1.0);
                }
            }
        });
        let mut next = 0.0f32;
        for _ in 0..2000 {
            let block: Vec<f32> = (0..16).map(|k| next + k as f32).collect();
            w.write(&block);
            next += 16.0;
        }
        reader.join().unwrap();
    }

    #[test]
    fn rejects_oversized_capacity() {
        assert!(latest_window(MAX_RING_CAPACITY + 1).is_err());
    }
}
