//! Driver configuration.

use core::fmt::{Display, Formatter};

use crate::filter::MAX_FILTER_WINDOW;
use crate::register::RangingQuality;
use crate::sample::MAX_SAMPLES_PER_CYCLE;

/// Tunables of the ranging cycle and of the chip's ranging quality.
///
/// ```
/// use vl6180x_ranging::Config;
///
/// let config = Config::default()
///     .with_samples_per_cycle(3)
///     .with_filter_window(1)
///     .with_publish_threshold_mm(2.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Single-shot acquisitions per update cycle (1-32)
    pub samples_per_cycle: u8,
    /// Moving-average window over batch averages (1-16, 1 = no smoothing)
    pub filter_window: u8,
    /// Minimum change in millimeters before a new value is published
    /// (0 = always publish)
    pub publish_threshold_mm: f32,
    /// Time budget for one update cycle in milliseconds
    ///
    /// Only the settle, poll and inter-sample delays the driver requests are charged against
    /// it; time spent in bus transactions is not. On a slow bus a cycle can run past the
    /// budget by roughly the transaction time of its samples.
    pub cycle_budget_ms: u32,
    /// Chip-side ranging quality, applied by `initialize`
    pub quality: RangingQuality,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            samples_per_cycle: 1,
            filter_window: 5,
            publish_threshold_mm: 0.0,
            cycle_budget_ms: 500,
            quality: RangingQuality::default(),
        }
    }
}

/// The first field [`Config::validate`] rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `samples_per_cycle` is 0 or above the batch capacity
    SamplesPerCycle,
    /// `filter_window` is 0 or above the filter capacity
    FilterWindow,
    /// `publish_threshold_mm` is negative or not finite
    PublishThreshold,
    /// `cycle_budget_ms` is 0
    CycleBudget,
    /// A ranging-quality register value is out of its range
    Quality,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.pad(match *self {
            ConfigError::SamplesPerCycle => "samples per cycle out of range",
            ConfigError::FilterWindow => "filter window out of range",
            ConfigError::PublishThreshold => "publish threshold must be finite and >= 0",
            ConfigError::CycleBudget => "cycle budget must be > 0",
            ConfigError::Quality => "invalid ranging quality setting",
        })
    }
}

impl Config {
    /// Sets the number of samples averaged per update cycle.
    #[must_use]
    pub fn with_samples_per_cycle(mut self, samples: u8) -> Self {
        self.samples_per_cycle = samples;
        self
    }

    /// Sets the moving-average window.
    #[must_use]
    pub fn with_filter_window(mut self, window: u8) -> Self {
        self.filter_window = window;
        self
    }

    /// Sets the publish change threshold in millimeters.
    #[must_use]
    pub fn with_publish_threshold_mm(mut self, threshold_mm: f32) -> Self {
        self.publish_threshold_mm = threshold_mm;
        self
    }

    /// Sets the per-cycle time budget in milliseconds.
    #[must_use]
    pub fn with_cycle_budget_ms(mut self, budget_ms: u32) -> Self {
        self.cycle_budget_ms = budget_ms;
        self
    }

    /// Sets the chip-side ranging quality.
    #[must_use]
    pub fn with_quality(mut self, quality: RangingQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Checks every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SAMPLES_PER_CYCLE).contains(&usize::from(self.samples_per_cycle)) {
            return Err(ConfigError::SamplesPerCycle);
        }
        if !(1..=MAX_FILTER_WINDOW).contains(&usize::from(self.filter_window)) {
            return Err(ConfigError::FilterWindow);
        }
        if !self.publish_threshold_mm.is_finite() || self.publish_threshold_mm < 0.0 {
            return Err(ConfigError::PublishThreshold);
        }
        if self.cycle_budget_ms == 0 {
            return Err(ConfigError::CycleBudget);
        }
        if !self.quality.is_valid() {
            return Err(ConfigError::Quality);
        }
        Ok(())
    }
}
