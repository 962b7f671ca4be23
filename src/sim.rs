//! Simulated VL6180X for protocol tests.
//!
//! A flat register file plus a queue of scripted ranging outcomes, one per
//! single-shot start command.

use std::collections::VecDeque;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::register::{Register, CLEAR_ALL_INTERRUPTS, MODEL_ID, RANGE_READY, START_SINGLE_SHOT};

/// What the chip does after one start command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shot {
    /// Ready after `polls` status reads with the given error code and range
    Ready { polls: u16, error_code: u8, range_mm: u8 },
    /// The ready bit never shows up
    NeverReady,
    /// The start command is NACKed
    BusFault,
}

impl Shot {
    pub fn range(range_mm: u8) -> Self {
        Shot::Ready {
            polls: 2,
            error_code: 0,
            range_mm,
        }
    }

    pub fn error(error_code: u8) -> Self {
        Shot::Ready {
            polls: 1,
            error_code,
            range_mm: 0,
        }
    }
}

pub struct SimChip {
    pub registers: [u8; 0x300],
    pub shots: VecDeque<Shot>,
    pub writes: Vec<(u16, u8)>,
    pub starts: usize,
    /// Reads of the status register left before the pending shot is ready
    pending: Option<(u16, u8, u8)>,
    /// Any write fails while set
    pub nack_writes: bool,
}

impl SimChip {
    pub fn new() -> Self {
        let mut registers = [0u8; 0x300];
        registers[usize::from(u16::from(Register::IdentificationModelId))] = MODEL_ID;
        registers[usize::from(u16::from(Register::SystemFreshOutOfReset))] = 0x01;
        Self {
            registers,
            shots: VecDeque::new(),
            writes: Vec::new(),
            starts: 0,
            pending: None,
            nack_writes: false,
        }
    }

    pub fn with_shots<I: IntoIterator<Item = Shot>>(mut self, shots: I) -> Self {
        self.shots.extend(shots);
        self
    }

    pub fn reg(&self, register: Register) -> u8 {
        self.registers[usize::from(u16::from(register))]
    }

    pub fn set_reg(&mut self, register: Register, value: u8) {
        self.registers[usize::from(u16::from(register))] = value;
    }

    fn write_reg(&mut self, reg: u16, value: u8) -> Result<(), ErrorKind> {
        if self.nack_writes {
            return Err(ErrorKind::Other);
        }
        if reg == u16::from(Register::SysrangeStart) && value == START_SINGLE_SHOT {
            self.starts += 1;
            match self.shots.pop_front().unwrap_or(Shot::NeverReady) {
                Shot::Ready {
                    polls,
                    error_code,
                    range_mm,
                } => self.pending = Some((polls, error_code, range_mm)),
                Shot::NeverReady => self.pending = None,
                Shot::BusFault => return Err(ErrorKind::Other),
            }
        }
        if reg == u16::from(Register::SystemInterruptClear) && value & CLEAR_ALL_INTERRUPTS != 0 {
            self.set_reg(Register::ResultInterruptStatusGpio, 0x00);
        }
        self.writes.push((reg, value));
        // Command and clear registers are self-clearing
        if reg != u16::from(Register::SysrangeStart) && reg != u16::from(Register::SystemInterruptClear) {
            self.registers[usize::from(reg)] = value;
        }
        Ok(())
    }

    fn read_reg(&mut self, reg: u16) -> u8 {
        if reg == u16::from(Register::ResultInterruptStatusGpio) {
            if let Some((polls, error_code, range_mm)) = self.pending {
                if polls <= 1 {
                    self.pending = None;
                    self.set_reg(Register::ResultRangeStatus, (error_code << 4) | 0x01);
                    self.set_reg(Register::ResultRangeVal, range_mm);
                    self.set_reg(Register::ResultInterruptStatusGpio, RANGE_READY);
                } else {
                    self.pending = Some((polls - 1, error_code, range_mm));
                }
            }
        }
        self.registers[usize::from(reg)]
    }
}

impl ErrorType for SimChip {
    type Error = ErrorKind;
}

impl I2c for SimChip {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut pointer: Option<u16> = None;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if bytes.len() < 2 {
                        return Err(ErrorKind::Other);
                    }
                    let reg = u16::from_be_bytes([bytes[0], bytes[1]]);
                    if let Some(&value) = bytes.get(2) {
                        self.write_reg(reg, value)?;
                    }
                    pointer = Some(reg);
                }
                Operation::Read(buffer) => {
                    let reg = pointer.ok_or(ErrorKind::Other)?;
                    for (offset, byte) in buffer.iter_mut().enumerate() {
                        #[allow(clippy::cast_possible_truncation)]
                        let addr = reg + offset as u16;
                        *byte = self.read_reg(addr);
                    }
                }
            }
        }
        Ok(())
    }
}
