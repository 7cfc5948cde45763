//! Flash access layer
//!
//! Range validation, keyed erase/write cycles and CRC readback on top of the
//! [`FlashRegisters`] and [`CrcUnit`] ports. Nothing here touches memory
//! before the whole requested range has been validated.

use log::{debug, trace, warn};

use crate::config::{Bank, FlashGeometry, LockPolicy, ERASED_BYTE};
use crate::hal::crc::{CrcControl, CrcUnit};
use crate::hal::flash::{FlashControl, FlashRegisters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Range touches the loader, the lock page or lies past the bank
    OutOfRange,
    /// Scratchpad requested on a part without one
    UnsupportedBank,
    /// Lock byte programmed and the policy refuses writes
    Locked,
    CrcMismatch { expected: u16, actual: u16 },
}

pub type Result<T> = core::result::Result<T, FlashError>;

pub struct FlashAccess<R, C> {
    regs: R,
    crc: C,
    geometry: FlashGeometry,
    keys: [u8; 2],
    bank: Bank,
}

impl<R: FlashRegisters, C: CrcUnit> FlashAccess<R, C> {
    pub fn new(mut regs: R, crc: C, geometry: FlashGeometry) -> Self {
        regs.set_control(FlashControl::idle(Bank::Primary));
        Self {
            regs,
            crc,
            geometry,
            keys: [0; 2],
            bank: Bank::Primary,
        }
    }

    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn release(self) -> (R, C) {
        (self.regs, self.crc)
    }

    /// Store the unlock pair used before every following cycle
    pub fn set_keys(&mut self, first: u8, second: u8) {
        self.keys = [first, second];
    }

    pub fn keys(&self) -> [u8; 2] {
        self.keys
    }

    pub fn bank(&self) -> Bank {
        self.bank
    }

    pub fn select_bank(&mut self, bank: Bank) -> Result<()> {
        if bank == Bank::Scratchpad && !self.geometry.has_scratchpad() {
            return Err(FlashError::UnsupportedBank);
        }
        self.bank = bank;
        self.regs.set_control(FlashControl::idle(bank));
        debug!("flash bank {:?} selected", bank);
        Ok(())
    }

    /// True when `[addr, addr + size)` may be erased or written in the
    /// selected bank
    pub fn is_valid_range(&self, addr: u16, size: u16) -> bool {
        let limit = self.geometry.write_limit(self.bank);
        let start = addr as u32;
        start < limit && start + size as u32 <= limit
    }

    fn is_readable_range(&self, addr: u16, size: u32) -> bool {
        let limit = self.geometry.read_limit(self.bank);
        let start = addr as u32;
        start + size <= limit
    }

    pub fn is_locked(&mut self) -> bool {
        match self.geometry.lock_policy {
            LockPolicy::Ignore => false,
            LockPolicy::RefuseWrites => self.read_primary(self.geometry.lock_address) != ERASED_BYTE,
        }
    }

    /// Range and lock check shared by erase and write
    pub fn check_writable(&mut self, addr: u16, size: u16) -> Result<()> {
        if !self.is_valid_range(addr, size) {
            warn!("range {:#06x}+{} rejected in {:?}", addr, size, self.bank);
            return Err(FlashError::OutOfRange);
        }
        if self.is_locked() {
            warn!("flash locked, refusing modification");
            return Err(FlashError::Locked);
        }
        Ok(())
    }

    pub fn erase_page(&mut self, addr: u16) -> Result<()> {
        self.check_writable(addr, 1)?;
        trace!("erase page {:#06x}", self.geometry.page_base(addr));
        self.cycle(addr, 0, true);
        Ok(())
    }

    /// Program one byte. The erased value needs no cycle and is skipped.
    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<()> {
        self.check_writable(addr, 1)?;
        self.program_byte(addr, value);
        Ok(())
    }

    /// Program `data` at `addr`, all or nothing
    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        let size = u16::try_from(data.len()).map_err(|_| FlashError::OutOfRange)?;
        self.check_writable(addr, size)?;
        for (offset, &value) in data.iter().enumerate() {
            self.program_byte(addr + offset as u16, value);
        }
        Ok(())
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        self.regs.read(addr)
    }

    pub fn init_crc(&mut self) {
        self.crc.set_control(CrcControl::RESET);
    }

    /// Feed `len` bytes of the selected bank into the accumulator
    pub fn update_crc(&mut self, addr: u16, len: u16) -> Result<()> {
        if !self.is_readable_range(addr, len as u32) {
            return Err(FlashError::OutOfRange);
        }
        for offset in 0..len {
            let byte = self.regs.read(addr + offset);
            self.crc.write_input(byte);
        }
        Ok(())
    }

    /// Accumulator value, most significant byte read first
    pub fn read_crc(&mut self) -> u16 {
        self.crc.set_control(CrcControl::READ_MSB);
        let msb = self.crc.read_data();
        let lsb = self.crc.read_data();
        u16::from_be_bytes([msb, lsb])
    }

    /// CRC of `[start, end]` (inclusive) compared against `expected`
    pub fn verify(&mut self, start: u16, end: u16, expected: u16) -> Result<()> {
        if end < start || !self.is_readable_range(start, (end - start) as u32 + 1) {
            return Err(FlashError::OutOfRange);
        }
        self.init_crc();
        let mut addr = start;
        loop {
            let byte = self.regs.read(addr);
            self.crc.write_input(byte);
            if addr == end {
                break;
            }
            addr += 1;
        }
        let actual = self.read_crc();
        if actual != expected {
            debug!("verify {:#06x}..={:#06x}: {:#06x} != {:#06x}", start, end, actual, expected);
            return Err(FlashError::CrcMismatch { expected, actual });
        }
        Ok(())
    }

    /// Program the flash signature and lock bytes. These sit in the loader's
    /// reserved page, so they bypass the write window.
    pub fn program_lock(&mut self, signature: u8, lock: u8) -> Result<()> {
        let previous = self.bank;
        if previous != Bank::Primary {
            self.regs.set_control(FlashControl::idle(Bank::Primary));
            self.bank = Bank::Primary;
        }
        self.program_byte(self.geometry.signature_address, signature);
        self.program_byte(self.geometry.lock_address, lock);
        if previous != Bank::Primary {
            self.bank = previous;
            self.regs.set_control(FlashControl::idle(previous));
        }
        Ok(())
    }

    fn program_byte(&mut self, addr: u16, value: u8) {
        if value != ERASED_BYTE {
            self.cycle(addr, value, false);
        }
    }

    fn read_primary(&mut self, addr: u16) -> u8 {
        if self.bank == Bank::Primary {
            return self.regs.read(addr);
        }
        self.regs.set_control(FlashControl::idle(Bank::Primary));
        let value = self.regs.read(addr);
        self.regs.set_control(FlashControl::idle(self.bank));
        value
    }

    /// One keyed programming cycle
    fn cycle(&mut self, addr: u16, value: u8, erase: bool) {
        let idle = FlashControl::idle(self.bank);
        let control = if erase { idle.with_write().with_erase() } else { idle.with_write() };

        self.regs.write_key(self.keys[0]);
        self.regs.write_key(self.keys[1]);
        self.regs.set_control(control);
        self.regs.program(addr, value);
        self.regs.set_control(idle);
    }
}
