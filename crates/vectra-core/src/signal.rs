//! Multi-channel sample buffers.
//!
//! A [`SignalBuffer`] holds `channels` rows of `width` samples, stored
//! row-major in one allocation. Every processor output in a compiled graph is
//! a `SignalBuffer` of the graph's vector width; published-signal reads use
//! the same type as their destination, one row per tap.

use crate::error::ResourceError;

/// A block of samples: `channels` rows of `width` frames each.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SignalBuffer {
    data: Vec<f32>,
    width: usize,
    channels: usize,
    sample_rate: f32,
}

impl SignalBuffer {
    /// Creates a zeroed buffer.
    ///
    /// # Panics
    ///
    /// Panics if `width * channels` overflows. Use [`try_new`](Self::try_new)
    /// where allocation failure must be reported instead.
    pub fn new(width: usize, channels: usize) -> Self {
        Self {
            data: vec![0.0; width * channels],
            width,
            channels,
            sample_rate: 0.0,
        }
    }

    /// Creates a zeroed buffer, reporting allocation failure as an error.
    pub fn try_new(width: usize, channels: usize) -> Result<Self, ResourceError> {
        let samples = width
            .checked_mul(channels)
            .ok_or(ResourceError::Allocation { samples: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(samples)
            .map_err(|_| ResourceError::Allocation { samples })?;
        data.resize(samples, 0.0);
        Ok(Self {
            data,
            width,
            channels,
            sample_rate: 0.0,
        })
    }

    /// Frames per channel.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample rate the contents were produced at, or 0 if unknown.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Tags the buffer with a sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Reshapes the buffer and zeroes it. Reuses the allocation when it is large enough.
    pub fn resize(&mut self, width: usize, channels: usize) {
        self.width = width;
        self.channels = channels;
        self.data.clear();
        self.data.resize(width * channels, 0.0);
    }

    /// Returns one channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= channels()`.
    #[inline]
    pub fn row(&self, channel: usize) -> &[f32] {
        let start = channel * self.width;
        &self.data[start..start + self.width]
    }

    /// Returns one channel mutably.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= channels()`.
    #[inline]
    pub fn row_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.width;
        &mut self.data[start..start + self.width]
    }

    /// All samples, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Fills every sample with zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Fills every sample with `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Returns false if any sample is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|s| s.is_finite())
    }
}
