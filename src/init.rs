//! Initialization sequence: identify the chip, load the mandatory private
//! settings, apply the ranging-quality tunables and drain stale results.

#[cfg(not(feature = "async"))]
use embedded_hal::{delay::DelayNs, i2c::I2c};
#[cfg(feature = "async")]
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

use crate::register::{
    Register, CLEAR_ALL_INTERRUPTS, MANDATORY_SETTINGS, MODEL_ID, RANGE_READY,
};
use crate::{DeviceState, Error, InitFailure, VL6180x};

// Settle times after power-up and after each register block.
const POWER_UP_SETTLE_MS: u32 = 100;
const TABLE_SETTLE_MS: u32 = 10;
const QUALITY_SETTLE_MS: u32 = 10;

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
    /// Initializes the VL6180X for single-shot ranging.
    ///
    /// Checks the model id, loads the mandatory private register table from ST AN4545,
    /// clears the fresh-out-of-reset flag, applies the configured [`RangingQuality`] and
    /// discards any measurement latched before the call. The table is loaded whether or not
    /// the chip reports being fresh out of reset, so a host reset without a chip power cycle
    /// still ends in a known state. Running it twice leaves the chip configured the same way.
    ///
    /// Failed writes inside the mandatory table are logged and skipped; everything else is
    /// fatal and marks the device [`DeviceState::Failed`] until the next successful call.
    ///
    /// **Important**: [`acquire_distance`](Self::acquire_distance) refuses to run until this
    /// has succeeded.
    ///
    /// # Errors
    ///
    /// * `Err(Error::IdentityMismatch(id))` - If the chip is not a VL6180X; nothing is written
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vl6180x_ranging::VL6180x;
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let mut sensor = VL6180x::new(i2c, delay);
    ///
    /// sensor.initialize().unwrap();
    /// assert!(sensor.is_initialized());
    /// ```
    ///
    /// [`RangingQuality`]: crate::RangingQuality
    pub async fn initialize(&mut self) -> Result<(), Error<E>> {
        info!("Setting up VL6180X");
        self.state = DeviceState::Uninitialized;
        self.skipped_settings = 0;

        match self.run_init_sequence().await {
            Ok(()) => {
                self.state = DeviceState::Ready;
                info!("VL6180X setup complete");
                Ok(())
            }
            Err(e) => {
                let failure = match e {
                    Error::IdentityMismatch(id) => InitFailure::IdentityMismatch(id),
                    _ => InitFailure::Transport,
                };
                self.state = DeviceState::Failed(failure);
                error!("VL6180X setup failed, device marked failed");
                Err(e)
            }
        }
    }

    async fn run_init_sequence(&mut self) -> Result<(), Error<E>> {
        self.delay.delay_ms(POWER_UP_SETTLE_MS).await;

        let model_id = match self.model_id().await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    "Failed to read model ID at {:#x}, check wiring",
                    u16::from(Register::IdentificationModelId)
                );
                return Err(e);
            }
        };
        info!("Model ID: {:#x}", model_id);
        if model_id != MODEL_ID {
            error!("Wrong model ID, expected {:#x}, got {:#x}", MODEL_ID, model_id);
            return Err(Error::IdentityMismatch(model_id));
        }

        let fresh = self.read_register(Register::SystemFreshOutOfReset).await?;
        info!("Fresh out of reset: {:#x}", fresh);

        self.skipped_settings = self.load_mandatory_settings().await;
        if self
            .write_register(Register::SystemFreshOutOfReset, 0x00)
            .await
            .is_err()
        {
            warn!(
                "Failed to clear fresh-out-of-reset flag at {:#x}",
                u16::from(Register::SystemFreshOutOfReset)
            );
        }
        self.delay.delay_ms(TABLE_SETTLE_MS).await;

        self.apply_quality().await?;
        self.delay.delay_ms(QUALITY_SETTLE_MS).await;

        self.drain_stale_result().await
    }

    /// Writes the AN4545 table, returning how many writes failed.
    async fn load_mandatory_settings(&mut self) -> usize {
        info!("Loading mandatory settings");
        let mut failed = 0;
        for &(reg, value) in &MANDATORY_SETTINGS {
            if self.write_register(reg, value).await.is_err() {
                warn!("Mandatory setting write failed for reg {:#x}", reg);
                failed += 1;
            }
        }
        if failed == 0 {
            info!("Mandatory settings loaded");
        } else {
            warn!(
                "Mandatory settings loaded with {} of {} writes failed",
                failed,
                MANDATORY_SETTINGS.len()
            );
        }
        failed
    }

    async fn apply_quality(&mut self) -> Result<(), Error<E>> {
        for (reg, value) in self.config.quality.register_writes() {
            if let Err(e) = self.write_register(reg, value).await {
                error!("Failed to apply ranging setting at {:#x}", u16::from(reg));
                return Err(e);
            }
        }
        Ok(())
    }

    /// Discards a result latched before initialization.
    async fn drain_stale_result(&mut self) -> Result<(), Error<E>> {
        let status = self
            .read_register(Register::ResultInterruptStatusGpio)
            .await?;
        if status & RANGE_READY != 0 {
            let stale = self.read_register(Register::ResultRangeVal).await?;
            debug!("Discarding stale range result: {} mm", stale);
            self.write_register(Register::SystemInterruptClear, CLEAR_ALL_INTERRUPTS)
                .await?;
        }
        Ok(())
    }
}

#[cfg(all(test, not(feature = "async")))]
mod tests {
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;
    use crate::sim::SimChip;
    use crate::{Config, RangingQuality, DEFAULT_ADDRESS};

    const ADDR: u8 = DEFAULT_ADDRESS;

    fn read(reg: u16, value: u8) -> I2cTransaction {
        I2cTransaction::write_read(ADDR, reg.to_be_bytes().to_vec(), vec![value])
    }

    fn write(reg: u16, value: u8) -> I2cTransaction {
        let [hi, lo] = reg.to_be_bytes();
        I2cTransaction::write(ADDR, vec![hi, lo, value])
    }

    fn full_sequence(fresh: u8, quality: &RangingQuality) -> Vec<I2cTransaction> {
        let mut expected = vec![
            read(Register::IdentificationModelId.into(), MODEL_ID),
            read(Register::SystemFreshOutOfReset.into(), fresh),
        ];
        expected.extend(MANDATORY_SETTINGS.iter().map(|&(reg, value)| write(reg, value)));
        expected.push(write(Register::SystemFreshOutOfReset.into(), 0x00));
        expected.extend(
            quality
                .register_writes()
                .iter()
                .map(|&(reg, value)| write(reg.into(), value)),
        );
        expected.push(read(Register::ResultInterruptStatusGpio.into(), 0x00));
        expected
    }

    #[test]
    fn wrong_model_id_stops_after_identity_check() {
        let expectations = [read(Register::IdentificationModelId.into(), 0x00)];
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Err(Error::IdentityMismatch(0x00)));
        assert_eq!(
            sensor.state(),
            DeviceState::Failed(InitFailure::IdentityMismatch(0x00))
        );

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn identity_read_failure_is_fatal() {
        let expectations =
            [read(Register::IdentificationModelId.into(), 0x00).with_error(ErrorKind::Other)];
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Err(Error::I2cError(ErrorKind::Other)));
        assert_eq!(
            sensor.state(),
            DeviceState::Failed(InitFailure::Transport)
        );

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn full_register_sequence() {
        let expectations = full_sequence(0x01, &RangingQuality::default());
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Ok(()));
        assert!(sensor.is_initialized());
        assert_eq!(sensor.diagnostics().skipped_settings, 0);

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn table_loaded_even_when_not_fresh() {
        let expectations = full_sequence(0x00, &RangingQuality::default());
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Ok(()));

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn configured_quality_is_applied() {
        let quality = RangingQuality {
            max_convergence_time_ms: 0x20,
            range_check_enables: 0x10,
            ..RangingQuality::default()
        };
        let expectations = full_sequence(0x01, &quality);
        let config = Config::default().with_quality(quality);
        let mut sensor =
            VL6180x::with_config(I2cMock::new(&expectations), NoopDelay, config).unwrap();

        assert_eq!(sensor.initialize(), Ok(()));

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn failed_table_write_does_not_abort() {
        let mut expectations = full_sequence(0x01, &RangingQuality::default());
        // first table entry follows the two identity/fresh reads
        expectations[2] = write(MANDATORY_SETTINGS[0].0, MANDATORY_SETTINGS[0].1)
            .with_error(ErrorKind::Other);
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Ok(()));
        assert!(sensor.is_initialized());
        let diagnostics = sensor.diagnostics();
        assert_eq!(diagnostics.skipped_settings, 1);
        assert!(diagnostics
            .to_string()
            .contains("Skipped mandatory settings: 1"));

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn stale_result_is_drained() {
        let mut expectations = full_sequence(0x01, &RangingQuality::default());
        expectations.pop();
        expectations.push(read(Register::ResultInterruptStatusGpio.into(), RANGE_READY));
        expectations.push(read(Register::ResultRangeVal.into(), 87));
        expectations.push(write(
            Register::SystemInterruptClear.into(),
            CLEAR_ALL_INTERRUPTS,
        ));
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Ok(()));

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn quality_write_failure_marks_device_failed() {
        let mut expectations = full_sequence(0x01, &RangingQuality::default());
        let first_quality = 2 + MANDATORY_SETTINGS.len() + 1;
        expectations.truncate(first_quality + 1);
        let (reg, value) = RangingQuality::default().register_writes()[0];
        expectations[first_quality] = write(reg.into(), value).with_error(ErrorKind::Other);
        let mut sensor = VL6180x::new(I2cMock::new(&expectations), NoopDelay);

        assert_eq!(sensor.initialize(), Err(Error::I2cError(ErrorKind::Other)));
        assert_eq!(sensor.state(), DeviceState::Failed(InitFailure::Transport));

        let (mut i2c, _) = sensor.release();
        i2c.done();
    }

    #[test]
    fn second_initialization_is_idempotent() {
        let mut sensor = VL6180x::new(SimChip::new(), NoopDelay);
        sensor.initialize().unwrap();
        let (chip, delay) = sensor.release();
        let after_first = chip.registers;
        assert_eq!(chip.reg(Register::SystemFreshOutOfReset), 0x00);

        let mut sensor = VL6180x::new(chip, delay);
        sensor.initialize().unwrap();
        let (chip, _) = sensor.release();
        assert_eq!(chip.registers, after_first);
    }

    #[test]
    fn reinitialization_recovers_failed_device() {
        let mut chip = SimChip::new();
        chip.set_reg(Register::IdentificationModelId, 0x00);
        let mut sensor = VL6180x::new(chip, NoopDelay);
        assert!(sensor.initialize().is_err());
        assert!(!sensor.is_initialized());

        let (mut chip, delay) = sensor.release();
        assert!(chip.writes.is_empty());
        chip.set_reg(Register::IdentificationModelId, MODEL_ID);
        let mut sensor = VL6180x::new(chip, delay);
        assert_eq!(sensor.initialize(), Ok(()));
        assert_eq!(sensor.state(), DeviceState::Ready);
    }
}
