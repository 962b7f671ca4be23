//! Register map and the static configuration tables.

/// Expected value of the identification register.
pub const MODEL_ID: u8 = 0xB4;

/// Default 7-bit bus address of the sensor.
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Range-ready bit in [`Register::ResultInterruptStatusGpio`].
pub const RANGE_READY: u8 = 0x04;

/// Clears the range, ALS and error interrupts in one write.
pub const CLEAR_ALL_INTERRUPTS: u8 = 0x07;

/// Value written to [`Register::SysrangeStart`] for a single-shot measurement.
pub const START_SINGLE_SHOT: u8 = 0x01;

/// Largest distance the chip can physically resolve, in millimeters.
pub const MAX_VALID_RANGE_MM: u8 = 200;

/// Register addresses of the VL6180X used by this driver.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Model identification, reads [`MODEL_ID`] (0x000)
    IdentificationModelId = 0x000,
    /// GPIO1 pin function (0x011)
    SystemModeGpio1 = 0x011,
    /// Interrupt source configuration (0x014)
    SystemInterruptConfigGpio = 0x014,
    /// Interrupt clear (0x015)
    SystemInterruptClear = 0x015,
    /// Fresh-out-of-reset flag (0x016)
    SystemFreshOutOfReset = 0x016,
    /// Grouped parameter hold (0x017)
    SystemGroupedParameterHold = 0x017,
    /// Range start command (0x018)
    SysrangeStart = 0x018,
    /// Continuous-mode intermeasurement period (0x01B)
    SysrangeIntermeasurementPeriod = 0x01B,
    /// Maximum convergence time in ms (0x01C)
    SysrangeMaxConvergenceTime = 0x01C,
    /// Ambient light tolerance multiplier (0x02C)
    SysrangeMaxAmbientLevelMult = 0x02C,
    /// Range check enable mask (0x02D)
    SysrangeRangeCheckEnables = 0x02D,
    /// Range status, error code in bits 7:4 (0x04D)
    ResultRangeStatus = 0x04D,
    /// Interrupt status, range bits 2:0 (0x04F)
    ResultInterruptStatusGpio = 0x04F,
    /// Range result in millimeters (0x062)
    ResultRangeVal = 0x062,
    /// Readout averaging sample period (0x10A)
    ReadoutAveragingSamplePeriod = 0x10A,
    /// Bus slave address (0x212)
    I2cSlaveDeviceAddress = 0x212,
}

impl From<Register> for u16 {
    fn from(r: Register) -> Self {
        r as u16
    }
}

// Mandatory private register settings, ST application note AN4545 ("SR03
// settings"). Order matters.
pub(crate) const MANDATORY_SETTINGS: [(u16, u8); 30] = [
    (0x0207, 0x01),
    (0x0208, 0x01),
    (0x0096, 0x00),
    (0x0097, 0xFD),
    (0x00E3, 0x00),
    (0x00E4, 0x04),
    (0x00E5, 0x02),
    (0x00E6, 0x01),
    (0x00E7, 0x03),
    (0x00F5, 0x02),
    (0x00D9, 0x05),
    (0x00DB, 0xCE),
    (0x00DC, 0x03),
    (0x00DD, 0xF8),
    (0x009F, 0x00),
    (0x00A3, 0x3C),
    (0x00B7, 0x00),
    (0x00BB, 0x3C),
    (0x00B2, 0x09),
    (0x00CA, 0x09),
    (0x0198, 0x01),
    (0x01B0, 0x17),
    (0x01AD, 0x00),
    (0x00FF, 0x05),
    (0x0100, 0x05),
    (0x0199, 0x05),
    (0x01A6, 0x1B),
    (0x01AC, 0x3E),
    (0x01A7, 0x1F),
    (0x0030, 0x00),
];

/// Operator-tunable ranging-quality settings applied during initialization.
///
/// The defaults favour accuracy over speed: 48 averaged readout samples, a
/// 49 ms convergence limit and full ambient-light tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangingQuality {
    /// Readout averaging sample period
    pub averaging_sample_period: u8,
    /// Maximum convergence time in milliseconds (1-63)
    pub max_convergence_time_ms: u8,
    /// Ambient light tolerance multiplier
    pub max_ambient_level_mult: u8,
    /// Range check enable mask (early convergence estimate, SNR, ...)
    pub range_check_enables: u8,
    /// Intermeasurement period in 10 ms steps, unused in single-shot mode
    pub intermeasurement_period: u8,
}

impl Default for RangingQuality {
    fn default() -> Self {
        Self {
            averaging_sample_period: 0x30,
            max_convergence_time_ms: 0x31,
            max_ambient_level_mult: 0xFF,
            range_check_enables: 0x11,
            intermeasurement_period: 0x09,
        }
    }
}

impl RangingQuality {
    /// Ordered register writes that apply these settings.
    ///
    /// Besides the tunables this disables the GPIO1 pin, routes "new sample
    /// ready" to the interrupt status register and turns off grouped
    /// parameter hold.
    #[must_use]
    pub fn register_writes(&self) -> [(Register, u8); 8] {
        [
            (
                Register::ReadoutAveragingSamplePeriod,
                self.averaging_sample_period,
            ),
            (
                Register::SysrangeMaxConvergenceTime,
                self.max_convergence_time_ms,
            ),
            (
                Register::SysrangeMaxAmbientLevelMult,
                self.max_ambient_level_mult,
            ),
            (Register::SysrangeRangeCheckEnables, self.range_check_enables),
            (
                Register::SysrangeIntermeasurementPeriod,
                self.intermeasurement_period,
            ),
            (Register::SystemModeGpio1, 0x00),
            (Register::SystemInterruptConfigGpio, RANGE_READY),
            (Register::SystemGroupedParameterHold, 0x00),
        ]
    }

    /// Checks the values the chip would silently misinterpret.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (1..=63).contains(&self.max_convergence_time_ms)
    }
}
