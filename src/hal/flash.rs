//! Flash controller register port
//!
//! Models the program-store control register as typed fields instead of raw
//! masks. Bits only appear where a port keeps the raw register image, via
//! [`FlashControl::bits`] / [`FlashControl::from_bits`].

use crate::config::Bank;

/// Key sequence the flash controller accepts
pub const FLASH_KEY: [u8; 2] = [0xA5, 0xF1];

const PSWE: u8 = 1 << 0;
const PSEE: u8 = 1 << 1;
const SFLE: u8 = 1 << 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteEnable {
    Disabled,
    Enabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseEnable {
    Disabled,
    Enabled,
}

/// Program-store control register value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashControl {
    pub write: WriteEnable,
    pub erase: EraseEnable,
    pub bank: Bank,
}

impl FlashControl {
    pub const IDLE: Self = Self {
        write: WriteEnable::Disabled,
        erase: EraseEnable::Disabled,
        bank: Bank::Primary,
    };

    pub const fn idle(bank: Bank) -> Self {
        Self { write: WriteEnable::Disabled, erase: EraseEnable::Disabled, bank }
    }

    pub const fn with_write(self) -> Self {
        Self { write: WriteEnable::Enabled, ..self }
    }

    pub const fn with_erase(self) -> Self {
        Self { erase: EraseEnable::Enabled, ..self }
    }

    pub const fn write_enabled(&self) -> bool {
        matches!(self.write, WriteEnable::Enabled)
    }

    pub const fn erase_enabled(&self) -> bool {
        matches!(self.erase, EraseEnable::Enabled)
    }

    pub const fn bits(&self) -> u8 {
        let mut bits = 0;
        if let WriteEnable::Enabled = self.write {
            bits |= PSWE;
        }
        if let EraseEnable::Enabled = self.erase {
            bits |= PSEE;
        }
        if let Bank::Scratchpad = self.bank {
            bits |= SFLE;
        }
        bits
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self {
            write: if bits & PSWE != 0 { WriteEnable::Enabled } else { WriteEnable::Disabled },
            erase: if bits & PSEE != 0 { EraseEnable::Enabled } else { EraseEnable::Disabled },
            bank: if bits & SFLE != 0 { Bank::Scratchpad } else { Bank::Primary },
        }
    }
}

impl Default for FlashControl {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Register group of the flash controller.
///
/// A programming cycle is: two [`write_key`](Self::write_key) calls, a
/// control write enabling write (and erase), one [`program`](Self::program)
/// store, then a control write disabling both again.
pub trait FlashRegisters {
    /// Write one byte to the unlock key register
    fn write_key(&mut self, key: u8);

    fn control(&self) -> FlashControl;

    fn set_control(&mut self, control: FlashControl);

    /// Store through the program-store window. Erases the page holding
    /// `addr` when erase is enabled, programs `value` otherwise.
    fn program(&mut self, addr: u16, value: u8);

    /// Read a byte of code space from the selected bank
    fn read(&self, addr: u16) -> u8;
}
