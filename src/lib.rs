//! # VL6180X Time-of-Flight Distance Sensor Driver
//!
//! This crate provides a `no_std` single-shot ranging driver for ST-Microelectronics' VL6180X
//! proximity and distance sensor. It brings the chip from reset into a calibrated state,
//! triggers single-shot measurements on demand, classifies the chip's error codes and
//! turns the raw millimeter readings into a filtered, change-gated distance.
//!
//! Blocking by default; enable the `async` feature for an `embedded-hal-async` flavour of the
//! same API.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use vl6180x_ranging::{Config, VL6180x};
//!
//! let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! let delay = embedded_hal_mock::eh1::delay::NoopDelay;
//! let config = Config::default().with_samples_per_cycle(3);
//! let mut sensor = VL6180x::with_config(i2c, delay, config).unwrap();
//!
//! sensor.initialize().unwrap();
//!
//! // Call once per update interval
//! match sensor.acquire_distance() {
//!     Ok(m) if m.published => println!("Distance: {} mm", m.distance_mm),
//!     Ok(_) => {} // change below the publish threshold
//!     Err(e) => println!("No reading this cycle: {e}"),
//! }
//! ```
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod fmt; // <-- must be first module!

mod config;
mod filter;
mod init;
mod ranging;
mod register;
mod sample;
mod status;

#[cfg(test)]
mod sim;

use core::fmt::{Display, Formatter};

#[cfg(not(feature = "async"))]
use embedded_hal::{delay::DelayNs, i2c::I2c};
#[cfg(feature = "async")]
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

pub use config::{Config, ConfigError};
pub use filter::{ChangeGate, MovingAverage, MAX_FILTER_WINDOW};
pub use ranging::Measurement;
pub use register::{Register, RangingQuality, DEFAULT_ADDRESS, MAX_VALID_RANGE_MM, MODEL_ID};
pub use sample::{Sample, SampleBatch, MAX_SAMPLES_PER_CYCLE};
pub use status::RangeError;

/// Why the last initialization attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitFailure {
    /// The identification register held the wrong value
    IdentityMismatch(u8),
    /// A bus transaction the sequence depends on failed
    Transport,
}

/// Lifecycle state of the driver's view of the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// `initialize` has not completed yet
    Uninitialized,
    /// Initialized and ready for ranging
    Ready,
    /// The last `initialize` failed; ranging is refused until it succeeds
    Failed(InitFailure),
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match *self {
            DeviceState::Uninitialized => f.pad("uninitialized"),
            DeviceState::Ready => f.pad("ready"),
            DeviceState::Failed(InitFailure::IdentityMismatch(id)) => {
                write!(f, "failed (wrong model id {id:#04x})")
            }
            DeviceState::Failed(InitFailure::Transport) => f.pad("failed (communication)"),
        }
    }
}

/// VL6180X time-of-flight distance sensor driver.
///
/// Owns the bus handle, the delay provider and the state that lives on the host side: the
/// initialized flag, the moving-average filter and the last published distance. Everything
/// else lives in the chip's registers and is re-read on every access.
pub struct VL6180x<I2C, D> {
    /// I2C interface for communication with the sensor
    i2c: I2C,
    /// Current I2C slave address of the sensor
    address: u8,
    /// Delay implementation for settle and poll timing
    delay: D,
    config: Config,
    state: DeviceState,
    filter: MovingAverage,
    gate: ChangeGate,
    last_batch: SampleBatch,
    /// Mandatory-table writes that failed during the last `initialize`
    skipped_settings: usize,
    /// Delay time spent in the current update cycle
    cycle_elapsed_ms: u32,
}

impl<I2C, D> VL6180x<I2C, D> {
    /// Creates a new driver with the default I2C address (0x29) and [`Config::default`].
    ///
    /// The sensor is not touched until [`initialize`](Self::initialize) is called.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vl6180x_ranging::VL6180x;
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    ///
    /// let mut sensor = VL6180x::new(i2c, delay);
    /// ```
    pub fn new(i2c: I2C, delay: D) -> Self {
        let config = Config::default();
        Self {
            i2c,
            address: register::DEFAULT_ADDRESS,
            delay,
            config,
            state: DeviceState::Uninitialized,
            filter: MovingAverage::new(usize::from(config.filter_window)),
            gate: ChangeGate::new(config.publish_threshold_mm),
            last_batch: SampleBatch::new(),
            skipped_settings: 0,
            cycle_elapsed_ms: 0,
        }
    }

    /// Creates a new driver with a validated configuration.
    ///
    /// # Errors
    ///
    /// * `Err(ConfigError)` - If a configuration field is out of range
    pub fn with_config(i2c: I2C, delay: D, config: Config) -> Result<Self, ConfigError> {
        let mut sensor = Self::new(i2c, delay);
        sensor.set_config(config)?;
        Ok(sensor)
    }

    /// Uses `address` instead of the default for all further bus traffic.
    ///
    /// This does not reprogram the chip; see [`set_i2c_address`](Self::set_i2c_address).
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Replaces the configuration.
    ///
    /// Changing the filter window discards the filter contents; the published baseline is
    /// kept. Ranging-quality changes take effect on the next [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// * `Err(ConfigError)` - If a field is out of range; the old configuration stays active
    pub fn set_config(&mut self, config: Config) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            error!("Invalid configuration: {}", e);
            return Err(e);
        }
        if config.filter_window != self.config.filter_window {
            self.filter = MovingAverage::new(usize::from(config.filter_window));
        }
        self.gate.set_threshold(config.publish_threshold_mm);
        self.config = config;
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current device state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// True once [`initialize`](Self::initialize) has completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.state == DeviceState::Ready
    }

    /// The last distance surfaced to the caller, the baseline of the change gate.
    pub fn last_published(&self) -> Option<f32> {
        self.gate.last_published()
    }

    /// Samples of the most recent update cycle, including the rejected ones.
    pub fn last_batch(&self) -> &SampleBatch {
        &self.last_batch
    }

    /// The moving-average filter state.
    pub fn filter(&self) -> &MovingAverage {
        &self.filter
    }

    /// Snapshot of configuration and failure state for diagnostics.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            address: self.address,
            state: self.state,
            config: self.config,
            last_published_mm: self.gate.last_published(),
            filter_len: self.filter.len(),
            last_batch_attempted: self.last_batch.len(),
            last_batch_valid: self.last_batch.valid_count(),
            skipped_settings: self.skipped_settings,
        }
    }

    /// Releases the bus and the delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
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
    /// Reads the identification register, `0xB4` for a VL6180X.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn model_id(&mut self) -> Result<u8, Error<E>> {
        self.read_register(Register::IdentificationModelId).await
    }

    /// Programs a new 7-bit I2C address into the sensor and switches to it.
    ///
    /// The chip forgets the address on power loss, so this has to be repeated after every
    /// power cycle, typically while the other sensors on the bus are held in reset.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If the address does not fit in 7 bits
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn set_i2c_address(&mut self, address: u8) -> Result<(), Error<E>> {
        if address > 0x7F {
            error!("Invalid I2C address: {:#x}", address);
            return Err(Error::InvalidArgument);
        }
        self.write_register(Register::I2cSlaveDeviceAddress, address)
            .await?;
        self.address = address;
        Ok(())
    }

    /// Writes one byte to a 16-bit register address.
    ///
    /// Exactly one bus transaction, no retry; settling delays are up to the caller.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn write_register<R>(&mut self, register_address: R, value: u8) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let reg: u16 = register_address.into();
        let [hi, lo] = reg.to_be_bytes();
        trace!("write {:#x} <- {:#x}", reg, value);
        self.i2c.write(self.address, &[hi, lo, value]).await?;
        Ok(())
    }

    /// Reads one byte from a 16-bit register address.
    ///
    /// Exactly one bus transaction, no retry, nothing cached.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_register<R>(&mut self, register_address: R) -> Result<u8, Error<E>>
    where
        R: Into<u16>,
    {
        let reg: u16 = register_address.into();
        let mut read_buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &reg.to_be_bytes(), &mut read_buffer)
            .await?;
        trace!("read {:#x} -> {:#x}", reg, read_buffer[0]);
        Ok(read_buffer[0])
    }

    /// Delays and charges the time to the current cycle's budget.
    ///
    /// Bus transaction time is not measured and never charged.
    async fn pause(&mut self, ms: u32) {
        self.delay.delay_ms(ms).await;
        self.cycle_elapsed_ms = self.cycle_elapsed_ms.saturating_add(ms);
    }
}

/// Human-readable dump of the driver's configuration and failure state.
///
/// Advisory only; render it with `Display`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    /// I2C address in use
    pub address: u8,
    /// Device state
    pub state: DeviceState,
    /// Active configuration
    pub config: Config,
    /// Last published distance
    pub last_published_mm: Option<f32>,
    /// Batch averages held by the filter
    pub filter_len: usize,
    /// Samples attempted in the last cycle
    pub last_batch_attempted: usize,
    /// Valid samples in the last cycle
    pub last_batch_valid: usize,
    /// Mandatory settings that could not be written during the last initialization
    pub skipped_settings: usize,
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "VL6180X Time-of-Flight Distance Sensor:")?;
        writeln!(f, "  Address: {:#04x}", self.address)?;
        writeln!(f, "  State: {}", self.state)?;
        writeln!(f, "  Samples: {}", self.config.samples_per_cycle)?;
        writeln!(
            f,
            "  Filter window: {} ({} held)",
            self.config.filter_window, self.filter_len
        )?;
        writeln!(
            f,
            "  Publish threshold: {:.1} mm",
            self.config.publish_threshold_mm
        )?;
        writeln!(f, "  Cycle budget: {} ms", self.config.cycle_budget_ms)?;
        if self.skipped_settings > 0 {
            writeln!(f, "  Skipped mandatory settings: {}", self.skipped_settings)?;
        }
        match self.last_published_mm {
            Some(mm) => writeln!(f, "  Last published: {mm:.1} mm")?,
            None => writeln!(f, "  Last published: none")?,
        }
        write!(
            f,
            "  Last batch: {}/{} valid",
            self.last_batch_valid, self.last_batch_attempted
        )?;
        if let DeviceState::Failed(_) = self.state {
            write!(f, "\n  Communication with VL6180X failed!")?;
        }
        Ok(())
    }
}

/// Error type for VL6180X sensor operations.
///
/// Per-sample faults (chip error codes, poll timeouts, out-of-range readings) are not errors;
/// they are recorded as [`Sample`] outcomes and only shorten the batch.
///
/// # Examples
///
/// ```rust,no_run
/// use vl6180x_ranging::Error;
///
/// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
/// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
/// let mut sensor = vl6180x_ranging::VL6180x::new(i2c, delay);
///
/// match sensor.initialize() {
///     Ok(()) => println!("Sensor initialized successfully"),
///     Err(Error::IdentityMismatch(id)) => println!("Not a VL6180X: 0x{:02X}", id),
///     Err(Error::I2cError(e)) => println!("I2C communication error: {:?}", e),
///     Err(e) => println!("Unexpected error: {e}"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: core::fmt::Debug> {
    /// I2C communication error from the underlying hardware
    I2cError(E),
    /// The identification register did not hold [`MODEL_ID`]
    IdentityMismatch(u8),
    /// Ranging attempted before a successful initialization
    NotInitialized,
    /// The update cycle produced no usable reading
    NoValidSamples,
    /// Invalid parameter value provided
    InvalidArgument,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2cError(e) => write!(f, "I2C error: {e:?}"),
            Error::IdentityMismatch(id) => {
                write!(f, "wrong model id: expected {MODEL_ID:#04x}, got {id:#04x}")
            }
            Error::NotInitialized => f.pad("sensor not initialized"),
            Error::NoValidSamples => f.pad("no valid samples"),
            Error::InvalidArgument => f.pad("invalid argument"),
        }
    }
}

impl<E: core::fmt::Debug> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::I2cError(error)
    }
}
