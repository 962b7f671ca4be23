//! Single-shot ranging cycle: acquire a batch, aggregate, filter, gate.

#[cfg(not(feature = "async"))]
use embedded_hal::{delay::DelayNs, i2c::I2c};
#[cfg(feature = "async")]
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

use crate::register::{Register, CLEAR_ALL_INTERRUPTS, RANGE_READY, START_SINGLE_SHOT};
use crate::sample::{Sample, SampleBatch};
use crate::status::RangeError;
use crate::{DeviceState, Error, VL6180x};

const INTERRUPT_CLEAR_SETTLE_MS: u32 = 1;
// 50 status reads 2 ms apart, ~100 ms before a sample times out
const MAX_READY_POLLS: u16 = 50;
const POLL_INTERVAL_MS: u32 = 2;
const INTER_SAMPLE_DELAY_MS: u32 = 30;

/// Result of one successful update cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Filtered distance in millimeters (0-200)
    pub distance_mm: f32,
    /// Unfiltered average of this cycle's valid samples
    pub batch_average_mm: f32,
    /// Samples that contributed to the average
    pub valid_samples: usize,
    /// Samples attempted this cycle, at most `samples_per_cycle`
    pub attempted_samples: usize,
    /// False when the change gate held the value back; the published baseline is unchanged
    pub published: bool,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL6180x<I2C, D>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Runs one update cycle and returns the filtered distance.
    ///
    /// Takes up to `samples_per_cycle` single-shot measurements, stopping early once the
    /// configured cycle budget is used up. Samples with a chip error code, a poll timeout, a
    /// bus failure or a range above 200 mm are excluded from the average but do not abort the
    /// batch; [`last_batch`](Self::last_batch) records why each one was rejected.
    ///
    /// The batch average is pushed through the moving-average filter. The filtered value is
    /// then offered to the change gate: if it differs from the last published value by less
    /// than the publish threshold it comes back with `published == false` and the baseline is
    /// left alone.
    ///
    /// # Returns
    ///
    /// * `Ok(Measurement)` - The filtered distance and the batch statistics
    ///
    /// # Errors
    ///
    /// * `Err(Error::NotInitialized)` - If [`initialize`](Self::initialize) has not succeeded;
    ///   no bus traffic happens
    /// * `Err(Error::NoValidSamples)` - If no sample was usable; filter and published value
    ///   are untouched and the device stays ready for the next cycle
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vl6180x_ranging::{Config, VL6180x};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let config = Config::default()
    ///     .with_samples_per_cycle(5)
    ///     .with_publish_threshold_mm(2.0);
    /// let mut sensor = VL6180x::with_config(i2c, delay, config).unwrap();
    ///
    /// sensor.initialize().unwrap();
    /// let measurement = sensor.acquire_distance().unwrap();
    /// if measurement.published {
    ///     println!("Distance: {} mm", measurement.distance_mm);
    /// }
    /// ```
    pub async fn acquire_distance(&mut self) -> Result<Measurement, Error<E>> {
        self.ensure_ready()?;
        self.cycle_elapsed_ms = 0;

        let samples = usize::from(self.config.samples_per_cycle);
        let mut batch = SampleBatch::new();
        for index in 0..samples {
            let sample = self.acquire_sample(index + 1).await;
            batch.push(sample);

            if index + 1 == samples {
                break;
            }
            if self.cycle_elapsed_ms >= self.config.cycle_budget_ms {
                warn!(
                    "Cycle budget of {} ms used up after {} of {} samples",
                    self.config.cycle_budget_ms,
                    index + 1,
                    samples
                );
                break;
            }
            self.pause(INTER_SAMPLE_DELAY_MS).await;
        }
        self.last_batch = batch;

        let Some(average) = batch.average() else {
            warn!(
                "No valid measurements obtained ({} samples attempted)",
                batch.len()
            );
            return Err(Error::NoValidSamples);
        };

        let distance_mm = self.filter.push(average);
        let published = self.gate.offer(distance_mm);
        if published {
            debug!(
                "Distance: {} mm (batch {} mm from {}/{} samples)",
                distance_mm,
                average,
                batch.valid_count(),
                batch.len()
            );
        } else {
            debug!(
                "Distance {} mm within {} mm of last published value, not published",
                distance_mm,
                self.gate.threshold()
            );
        }

        Ok(Measurement {
            distance_mm,
            batch_average_mm: average,
            valid_samples: batch.valid_count(),
            attempted_samples: batch.len(),
            published,
        })
    }

    /// Runs the single-shot protocol once and returns the raw outcome.
    ///
    /// Bypasses aggregation, filtering and the change gate.
    ///
    /// # Errors
    ///
    /// * `Err(Error::NotInitialized)` - If [`initialize`](Self::initialize) has not succeeded
    pub async fn range_single_shot(&mut self) -> Result<Sample, Error<E>> {
        self.ensure_ready()?;
        Ok(self.acquire_sample(1).await)
    }

    fn ensure_ready(&self) -> Result<(), Error<E>> {
        if self.state == DeviceState::Ready {
            Ok(())
        } else {
            warn!("Sensor not initialized");
            Err(Error::NotInitialized)
        }
    }

    /// One start/poll/read/clear round. `number` is 1-based, for logs.
    async fn acquire_sample(&mut self, number: usize) -> Sample {
        if self
            .write_register(Register::SystemInterruptClear, CLEAR_ALL_INTERRUPTS)
            .await
            .is_err()
        {
            warn!(
                "Sample {}: failed to clear interrupts at {:#x}",
                number,
                u16::from(Register::SystemInterruptClear)
            );
            return Sample::TransportError;
        }
        self.pause(INTERRUPT_CLEAR_SETTLE_MS).await;

        if self
            .write_register(Register::SysrangeStart, START_SINGLE_SHOT)
            .await
            .is_err()
        {
            warn!(
                "Sample {}: failed to start measurement at {:#x}",
                number,
                u16::from(Register::SysrangeStart)
            );
            return Sample::TransportError;
        }

        let mut status = 0;
        let mut ready = false;
        for poll in 1..=MAX_READY_POLLS {
            status = match self.read_register(Register::ResultInterruptStatusGpio).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(
                        "Sample {}: failed to read interrupt status at {:#x}",
                        number,
                        u16::from(Register::ResultInterruptStatusGpio)
                    );
                    return Sample::TransportError;
                }
            };
            if status & RANGE_READY != 0 {
                ready = true;
                break;
            }
            if poll < MAX_READY_POLLS {
                self.pause(POLL_INTERVAL_MS).await;
            }
        }
        if !ready {
            warn!(
                "Sample {}: measurement timeout (status: {:#x})",
                number, status
            );
            return Sample::Timeout;
        }

        let sample = self.read_result(number).await;

        // A stale ready bit would pass for the next sample's result.
        if self
            .write_register(Register::SystemInterruptClear, CLEAR_ALL_INTERRUPTS)
            .await
            .is_err()
        {
            warn!(
                "Sample {}: failed to clear interrupts at {:#x}",
                number,
                u16::from(Register::SystemInterruptClear)
            );
        }
        sample
    }

    async fn read_result(&mut self, number: usize) -> Sample {
        let range_status = match self.read_register(Register::ResultRangeStatus).await {
            Ok(range_status) => range_status,
            Err(_) => {
                warn!(
                    "Sample {}: failed to read range status at {:#x}",
                    number,
                    u16::from(Register::ResultRangeStatus)
                );
                return Sample::TransportError;
            }
        };

        if let Some(error) = RangeError::from_status(range_status) {
            if error.is_hardware_fault() {
                warn!("Sample {}: error {:#x} ({})", number, error.code(), error);
            } else {
                debug!("Sample {}: error {:#x} ({})", number, error.code(), error);
            }
            return Sample::ChipError(error);
        }

        let range_mm = match self.read_register(Register::ResultRangeVal).await {
            Ok(range_mm) => range_mm,
            Err(_) => {
                warn!(
                    "Sample {}: failed to read range at {:#x}",
                    number,
                    u16::from(Register::ResultRangeVal)
                );
                return Sample::TransportError;
            }
        };

        let sample = Sample::from_range(range_mm);
        match sample {
            Sample::Valid(mm) => trace!("Sample {}: {} mm (valid)", number, mm),
            _ => debug!("Sample {}: {} mm (out of range)", number, range_mm),
        }
        sample
    }
}
