//! Per-sample outcomes and the batch collected in one update cycle.

use crate::register::MAX_VALID_RANGE_MM;
use crate::status::RangeError;

/// Largest number of samples one update cycle can collect.
pub const MAX_SAMPLES_PER_CYCLE: usize = 32;

/// Outcome of one single-shot acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sample {
    /// Usable distance in millimeters (0-200)
    Valid(u8),
    /// Distance reported by the chip but beyond what it can resolve
    OutOfRange(u8),
    /// The chip flagged the measurement with an error code
    ChipError(RangeError),
    /// The range-ready bit never showed up within the poll bound
    Timeout,
    /// A bus transaction failed while handling this sample
    TransportError,
}

impl Sample {
    /// Classifies a range register value read after an error-free status.
    #[must_use]
    pub fn from_range(range_mm: u8) -> Self {
        if range_mm <= MAX_VALID_RANGE_MM {
            Sample::Valid(range_mm)
        } else {
            Sample::OutOfRange(range_mm)
        }
    }

    /// Distance of a [`Sample::Valid`] outcome.
    #[must_use]
    pub fn valid_distance(&self) -> Option<u8> {
        match *self {
            Sample::Valid(mm) => Some(mm),
            _ => None,
        }
    }
}

/// Ordered samples of one update cycle, in acquisition order.
///
/// Holds at most [`MAX_SAMPLES_PER_CYCLE`] entries; further pushes are
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleBatch {
    samples: [Sample; MAX_SAMPLES_PER_CYCLE],
    len: usize,
}

impl Default for SampleBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [Sample::Timeout; MAX_SAMPLES_PER_CYCLE],
            len: 0,
        }
    }

    /// Appends a sample. Returns `false` if the batch is full.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.len == MAX_SAMPLES_PER_CYCLE {
            return false;
        }
        self.samples[self.len] = sample;
        self.len += 1;
        true
    }

    /// Number of attempted samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no sample was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples in acquisition order.
    #[must_use]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples[..self.len]
    }

    /// Iterates over the samples in acquisition order.
    pub fn iter(&self) -> core::slice::Iter<'_, Sample> {
        self.as_slice().iter()
    }

    /// Number of [`Sample::Valid`] outcomes.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.iter().filter(|s| s.valid_distance().is_some()).count()
    }

    /// Number of samples matching `predicate`.
    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Sample) -> bool,
    {
        self.iter().filter(|s| predicate(*s)).count()
    }

    /// Mean of the valid distances, `None` when there are none.
    #[must_use]
    pub fn average(&self) -> Option<f32> {
        let (sum, count) = self
            .iter()
            .filter_map(Sample::valid_distance)
            .fold((0u32, 0u32), |(sum, count), mm| (sum + u32::from(mm), count + 1));
        if count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let average = sum as f32 / count as f32;
        Some(average)
    }
}

impl<'a> IntoIterator for &'a SampleBatch {
    type Item = &'a Sample;
    type IntoIter = core::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
