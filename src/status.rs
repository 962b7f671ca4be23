//! Chip-reported ranging error codes.

use core::fmt::{Display, Formatter};

/// Fault reported by the chip in bits 7:4 of the range status register.
///
/// Code `0` means "no error" and has no variant; see
/// [`RangeError::from_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeError {
    /// VCSEL continuity test failed (1)
    VcselContinuityTest,
    /// VCSEL watchdog test failed (2)
    VcselWatchdogTest,
    /// VCSEL watchdog tripped (3)
    VcselWatchdog,
    /// PLL1 lock lost (4)
    Pll1Lock,
    /// PLL2 lock lost (5)
    Pll2Lock,
    /// Early convergence estimate check failed (6)
    EarlyConvergenceEstimate,
    /// Maximum convergence time reached without a result (7)
    MaxConvergence,
    /// Range ignore threshold check failed (8)
    NoTargetIgnore,
    /// Ambient conditions too high for the signal (11)
    MaxSignalToNoiseRatio,
    /// Raw ranging algorithm underflow (12)
    RawRangingAlgoUnderflow,
    /// Raw ranging algorithm overflow (13)
    RawRangingAlgoOverflow,
    /// Ranging algorithm underflow (14)
    RangingAlgoUnderflow,
    /// Ranging algorithm overflow (15)
    RangingAlgoOverflow,
    /// Code not documented in the datasheet (9, 10)
    Undocumented(u8),
}

impl RangeError {
    /// Decodes the raw range status register.
    ///
    /// Returns `None` when the error code is zero, i.e. the range register
    /// holds a usable result.
    #[must_use]
    pub fn from_status(status: u8) -> Option<Self> {
        Some(match (status >> 4) & 0x0F {
            0x0 => return None,
            0x1 => RangeError::VcselContinuityTest,
            0x2 => RangeError::VcselWatchdogTest,
            0x3 => RangeError::VcselWatchdog,
            0x4 => RangeError::Pll1Lock,
            0x5 => RangeError::Pll2Lock,
            0x6 => RangeError::EarlyConvergenceEstimate,
            0x7 => RangeError::MaxConvergence,
            0x8 => RangeError::NoTargetIgnore,
            0xB => RangeError::MaxSignalToNoiseRatio,
            0xC => RangeError::RawRangingAlgoUnderflow,
            0xD => RangeError::RawRangingAlgoOverflow,
            0xE => RangeError::RangingAlgoUnderflow,
            0xF => RangeError::RangingAlgoOverflow,
            code => RangeError::Undocumented(code),
        })
    }

    /// The 4-bit code as reported by the chip.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            RangeError::VcselContinuityTest => 0x1,
            RangeError::VcselWatchdogTest => 0x2,
            RangeError::VcselWatchdog => 0x3,
            RangeError::Pll1Lock => 0x4,
            RangeError::Pll2Lock => 0x5,
            RangeError::EarlyConvergenceEstimate => 0x6,
            RangeError::MaxConvergence => 0x7,
            RangeError::NoTargetIgnore => 0x8,
            RangeError::MaxSignalToNoiseRatio => 0xB,
            RangeError::RawRangingAlgoUnderflow => 0xC,
            RangeError::RawRangingAlgoOverflow => 0xD,
            RangeError::RangingAlgoUnderflow => 0xE,
            RangeError::RangingAlgoOverflow => 0xF,
            RangeError::Undocumented(code) => code,
        }
    }

    /// Whether the fault points at the emitter or clocking hardware rather
    /// than at the scene being measured.
    #[must_use]
    pub fn is_hardware_fault(self) -> bool {
        matches!(
            self,
            RangeError::VcselContinuityTest
                | RangeError::VcselWatchdogTest
                | RangeError::VcselWatchdog
                | RangeError::Pll1Lock
                | RangeError::Pll2Lock
        )
    }
}

impl Display for RangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match *self {
            RangeError::VcselContinuityTest => f.pad("VCSEL continuity test"),
            RangeError::VcselWatchdogTest => f.pad("VCSEL watchdog test"),
            RangeError::VcselWatchdog => f.pad("VCSEL watchdog"),
            RangeError::Pll1Lock => f.pad("PLL1 lock"),
            RangeError::Pll2Lock => f.pad("PLL2 lock"),
            RangeError::EarlyConvergenceEstimate => f.pad("early convergence estimate"),
            RangeError::MaxConvergence => f.pad("max convergence"),
            RangeError::NoTargetIgnore => f.pad("no target ignore"),
            RangeError::MaxSignalToNoiseRatio => f.pad("max signal to noise ratio"),
            RangeError::RawRangingAlgoUnderflow => f.pad("raw ranging algo underflow"),
            RangeError::RawRangingAlgoOverflow => f.pad("raw ranging algo overflow"),
            RangeError::RangingAlgoUnderflow => f.pad("ranging algo underflow"),
            RangeError::RangingAlgoOverflow => f.pad("ranging algo overflow"),
            RangeError::Undocumented(code) => write!(f, "undocumented({code})"),
        }
    }
}
