//! CRC unit register port and the software CRC-16 engine behind it

/// CRC-16/XMODEM polynomial used by the hardware unit in 16-bit mode
pub const CRC16_POLY: u16 = 0x1021;

/// Accumulator value after a reset
pub const CRC16_INIT: u16 = 0x0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrcInit {
    /// Leave the accumulator as is
    Retain,
    /// Load the accumulator with [`CRC16_INIT`]
    Reset,
}

/// Result byte selected for the next data register read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrcPointer {
    MostSignificant,
    LeastSignificant,
}

/// CRC control register value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrcControl {
    pub init: CrcInit,
    pub pointer: CrcPointer,
}

impl CrcControl {
    pub const RESET: Self = Self { init: CrcInit::Reset, pointer: CrcPointer::MostSignificant };
    pub const READ_MSB: Self = Self { init: CrcInit::Retain, pointer: CrcPointer::MostSignificant };
}

/// Register group of the CRC unit.
///
/// Reading the data register returns the byte under the result pointer and
/// advances the pointer towards the least significant byte.
pub trait CrcUnit {
    fn set_control(&mut self, control: CrcControl);

    /// Feed one byte into the accumulator
    fn write_input(&mut self, byte: u8);

    fn read_data(&mut self) -> u8;
}

/// Bitwise CRC-16 matching the hardware unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Self { value: CRC16_INIT }
    }

    pub fn reset(&mut self) {
        self.value = CRC16_INIT;
    }

    pub fn update(&mut self, byte: u8) {
        let mut crc = self.value ^ ((byte as u16) << 8);
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
        }
        self.value = crc;
    }

    pub fn update_slice(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    pub const fn value(&self) -> u16 {
        self.value
    }

    pub fn checksum(data: &[u8]) -> u16 {
        let mut crc = Self::new();
        crc.update_slice(data);
        crc.value()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// [`CrcUnit`] backed by [`Crc16`], for parts without a hardware CRC block
#[derive(Debug, Default)]
pub struct SoftCrc {
    crc: Crc16,
    pointer: Option<CrcPointer>,
}

impl SoftCrc {
    pub const fn new() -> Self {
        Self { crc: Crc16::new(), pointer: None }
    }
}

impl CrcUnit for SoftCrc {
    fn set_control(&mut self, control: CrcControl) {
        if control.init == CrcInit::Reset {
            self.crc.reset();
        }
        self.pointer = Some(control.pointer);
    }

    fn write_input(&mut self, byte: u8) {
        self.crc.update(byte);
    }

    fn read_data(&mut self) -> u8 {
        let [msb, lsb] = self.crc.value().to_be_bytes();
        match self.pointer.take().unwrap_or(CrcPointer::MostSignificant) {
            CrcPointer::MostSignificant => {
                self.pointer = Some(CrcPointer::LeastSignificant);
                msb
            }
            CrcPointer::LeastSignificant => {
                self.pointer = Some(CrcPointer::MostSignificant);
                lsb
            }
        }
    }
}
