//! Single-producer single-consumer sample rings.
//!
//! Host input/output staging and first-in-first-out published-signal taps are
//! bounded [`rtrb`] queues of `f32`. [`sample_ring`] hands out the two halves
//! separately for taps, whose writer lives with the graph on the audio thread
//! and whose reader lives with whoever inspects the signal. [`SampleRing`]
//! keeps both halves together for the engine's own I/O staging.
//!
//! Writes never block: samples that do not fit are dropped and counted.
//! Reads never block: a short read returns how many samples were actually
//! available so the caller can report starvation.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::ResourceError;

/// Largest ring the engine will allocate, in samples.
pub const MAX_RING_CAPACITY: usize = 1 << 22;

/// Creates a ring and returns its writing and reading halves.
pub fn sample_ring(capacity: usize) -> Result<(RingWriter, RingReader), ResourceError> {
    if capacity > MAX_RING_CAPACITY {
        return Err(ResourceError::RingTooLarge {
            requested: capacity,
            max: MAX_RING_CAPACITY,
        });
    }
    let capacity = capacity.max(1);
    let (producer, consumer) = RingBuffer::<f32>::new(capacity);
    Ok((
        RingWriter {
            producer,
            capacity,
            dropped: 0,
        },
        RingReader { consumer, capacity },
    ))
}

/// Writing half of a sample ring.
pub struct RingWriter {
    producer: Producer<f32>,
    capacity: usize,
    dropped: u64,
}

impl RingWriter {
    /// Appends as many of `samples` as fit. Returns the number accepted; the
    /// rest are dropped and added to [`dropped`](Self::dropped).
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let n = samples.len().min(self.producer.slots());
        if n > 0 {
            match self.producer.write_chunk(n) {
                Ok(mut chunk) => {
                    let (first, second) = chunk.as_mut_slices();
                    let split = first.len();
                    first.copy_from_slice(&samples[..split]);
                    second.copy_from_slice(&samples[split..n]);
                    chunk.commit_all();
                }
                Err(_) => {
                    self.dropped += samples.len() as u64;
                    return 0;
                }
            }
        }
        self.dropped += (samples.len() - n) as u64;
        n
    }

    /// Appends `count` zeros, subject to the same overflow rule as [`write`](Self::write).
    pub fn write_zeros(&mut self, count: usize) -> usize {
        let n = count.min(self.producer.slots());
        if n > 0 {
            match self.producer.write_chunk(n) {
                Ok(mut chunk) => {
                    let (first, second) = chunk.as_mut_slices();
                    first.fill(0.0);
                    second.fill(0.0);
                    chunk.commit_all();
                }
                Err(_) => {
                    self.dropped += count as u64;
                    return 0;
                }
            }
        }
        self.dropped += (count - n) as u64;
        n
    }

    /// Free space in samples.
    pub fn free(&self) -> usize {
        self.producer.slots()
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples dropped because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Reading half of a sample ring.
pub struct RingReader {
    consumer: Consumer<f32>,
    capacity: usize,
}

impl RingReader {
    /// Samples waiting to be read.
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads the oldest samples into the front of `dest`. Returns the number
    /// read, which is less than `dest.len()` when the ring runs short.
    pub fn read(&mut self, dest: &mut [f32]) -> usize {
        let n = dest.len().min(self.consumer.slots());
        if n == 0 {
            return 0;
        }
        match self.consumer.read_chunk(n) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                dest[..first.len()].copy_from_slice(first);
                dest[first.len()..n].copy_from_slice(second);
                chunk.commit_all();
                n
            }
            Err(_) => 0,
        }
    }

    /// Drops up to `count` of the oldest samples. Returns the number dropped.
    pub fn discard(&mut self, count: usize) -> usize {
        let n = count.min(self.consumer.slots());
        if n == 0 {
            return 0;
        }
        match self.consumer.read_chunk(n) {
            Ok(chunk) => {
                chunk.commit_all();
                n
            }
            Err(_) => 0,
        }
    }

    /// Drops everything currently readable.
    pub fn clear(&mut self) {
        self.discard(self.consumer.slots());
    }
}

/// Both halves of one ring, owned together.
pub struct SampleRing {
    writer: RingWriter,
    reader: RingReader,
}

impl SampleRing {
    /// Allocates a ring holding up to `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, ResourceError> {
        let (writer, reader) = sample_ring(capacity)?;
        Ok(Self { writer, reader })
    }

    /// See [`RingWriter::write`].
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.writer.write(samples)
    }

    /// See [`RingWriter::write_zeros`].
    pub fn write_zeros(&mut self, count: usize) -> usize {
        self.writer.write_zeros(count)
    }

    /// See [`RingReader::read`].
    pub fn read(&mut self, dest: &mut [f32]) -> usize {
        self.reader.read(dest)
    }

    /// See [`RingReader::discard`].
    pub fn discard(&mut self, count: usize) -> usize {
        self.reader.discard(count)
    }

    /// Samples waiting to be read.
    pub fn available(&self) -> usize {
        self.reader.available()
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.writer.capacity()
    }

    /// Samples dropped on overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.writer.dropped()
    }

    /// Drops everything currently readable.
    pub fn clear(&mut self) {
        self.reader.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_in_order() {
        let mut ring = SampleRing::new(8).unwrap();
        assert_eq!(ring.write(&[1.0, 2.0, 3.0]), 3);
        let mut out = [0.0; 3];
        assert_eq!(ring.read(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn overflow_drops_excess() {
        let mut ring = SampleRing::new(4).unwrap();
        assert_eq!(ring.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 4);
        assert_eq!(ring.dropped(), 2);
        let mut out = [0.0; 4];
        ring.read(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn short_read_reports_count() {
        let mut ring = SampleRing::new(16).unwrap();
        ring.write(&[5.0, 6.0]);
        let mut out = [9.0; 4];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(&out[..2], &[5.0, 6.0]);
    }

    #[test]
    fn wraps_around_capacity() {
        let mut ring = SampleRing::new(5).unwrap();
        let mut out = [0.0; 3];
        for round in 0..10 {
            let base = round as f32 * 3.0;
            ring.write(&[base, base + 1.0, base + 2.0]);
            assert_eq!(ring.read(&mut out), 3);
            assert_eq!(out, [base, base + 1.0, base + 2.0]);
        }
    }

    #[test]
    fn write_zeros_seeds() {
        let mut ring = SampleRing::new(8).unwrap();
        ring.write(&[1.0]);
        ring.clear();
        assert_eq!(ring.write_zeros(3), 3);
        assert_eq!(ring.available(), 3);
    }

    #[test]
    fn rejects_oversized_capacity() {
        assert!(matches!(
            SampleRing::new(MAX_RING_CAPACITY + 1),
            Err(ResourceError::RingTooLarge { .. })
        ));
    }
}
