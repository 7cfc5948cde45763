//! In-memory device model
//!
//! Binds the register ports to plain memory so the loader can run on a host:
//! flash behaves like NOR (erase to 0xFF, programming only clears bits) and
//! the controller enforces the unlock key sequence the way the silicon does.

use super::flash::{EraseEnable, FlashControl, FlashRegisters, WriteEnable, FLASH_KEY};
use super::system::{BootSignature, WatchdogControl};
use crate::config::{Bank, FlashGeometry, ERASED_BYTE};

/// Largest scratchpad the model carries
pub const SCRATCHPAD_CAPACITY: usize = 0x400;

const CYCLE_LOG: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleKind {
    Write,
    Erase,
}

/// One hardware programming cycle as seen by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub kind: CycleKind,
    pub bank: Bank,
    pub addr: u16,
    pub value: u8,
    /// Key bytes written right before the cycle
    pub keys: [u8; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyState {
    Idle,
    First,
    Armed,
}

/// Flash array plus controller
pub struct SimFlash<const N: usize> {
    primary: [u8; N],
    scratchpad: [u8; SCRATCHPAD_CAPACITY],
    page_size: u16,
    scratchpad_page: u16,
    control: FlashControl,
    key_state: KeyState,
    keys: [u8; 2],
    faulted: bool,
    log: [Option<Cycle>; CYCLE_LOG],
    cycles: usize,
}

impl<const N: usize> SimFlash<N> {
    pub fn new(geometry: &FlashGeometry) -> Self {
        let scratchpad_page = geometry
            .scratchpad_size
            .map(|size| size.min(SCRATCHPAD_CAPACITY as u32) as u16)
            .unwrap_or(SCRATCHPAD_CAPACITY as u16);
        Self {
            primary: [ERASED_BYTE; N],
            scratchpad: [ERASED_BYTE; SCRATCHPAD_CAPACITY],
            page_size: geometry.page_size,
            scratchpad_page,
            control: FlashControl::IDLE,
            key_state: KeyState::Idle,
            keys: [0; 2],
            faulted: false,
            log: [None; CYCLE_LOG],
            cycles: 0,
        }
    }

    /// Preload an image without going through the controller
    pub fn load(&mut self, bank: Bank, addr: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let index = addr as usize + offset;
            if let Some(cell) = self.cell_mut(bank, index) {
                *cell = byte;
            }
        }
    }

    pub fn peek(&self, bank: Bank, addr: u16) -> u8 {
        let index = addr as usize;
        let cell = match bank {
            Bank::Primary => self.primary.get(index),
            Bank::Scratchpad => self.scratchpad.get(index),
        };
        cell.copied().unwrap_or(ERASED_BYTE)
    }

    pub fn is_erased(&self, bank: Bank, addr: u16, len: usize) -> bool {
        (0..len).all(|offset| self.peek(bank, addr.wrapping_add(offset as u16)) == ERASED_BYTE)
    }

    /// Total programming cycles performed
    pub fn cycle_count(&self) -> usize {
        self.cycles
    }

    pub fn last_cycle(&self) -> Option<Cycle> {
        if self.cycles == 0 {
            return None;
        }
        self.log[(self.cycles - 1) % CYCLE_LOG]
    }

    /// Cycle `n` (0-based) if it is still in the log window
    pub fn cycle(&self, n: usize) -> Option<Cycle> {
        if n >= self.cycles || self.cycles - n > CYCLE_LOG {
            return None;
        }
        self.log[n % CYCLE_LOG]
    }

    /// Set once a bad key sequence or an unkeyed store locked the controller
    pub fn faulted(&self) -> bool {
        self.faulted
    }

    fn cell_mut(&mut self, bank: Bank, index: usize) -> Option<&mut u8> {
        match bank {
            Bank::Primary => self.primary.get_mut(index),
            Bank::Scratchpad => self.scratchpad.get_mut(index),
        }
    }

    fn record(&mut self, cycle: Cycle) {
        self.log[self.cycles % CYCLE_LOG] = Some(cycle);
        self.cycles += 1;
    }

    fn erase(&mut self, bank: Bank, addr: u16) {
        let page = match bank {
            Bank::Primary => self.page_size,
            Bank::Scratchpad => self.scratchpad_page,
        } as usize;
        let base = (addr as usize / page) * page;
        for index in base..base + page {
            if let Some(cell) = self.cell_mut(bank, index) {
                *cell = ERASED_BYTE;
            }
        }
    }
}

impl<const N: usize> FlashRegisters for SimFlash<N> {
    fn write_key(&mut self, key: u8) {
        if self.faulted {
            return;
        }
        self.key_state = match (self.key_state, key) {
            (KeyState::Idle, k) if k == FLASH_KEY[0] => KeyState::First,
            (KeyState::First, k) if k == FLASH_KEY[1] => KeyState::Armed,
            _ => {
                self.faulted = true;
                KeyState::Idle
            }
        };
        self.keys = [self.keys[1], key];
    }

    fn control(&self) -> FlashControl {
        self.control
    }

    fn set_control(&mut self, control: FlashControl) {
        self.control = control;
    }

    fn program(&mut self, addr: u16, value: u8) {
        if self.control.write == WriteEnable::Disabled {
            // Plain data-space store, flash untouched
            return;
        }
        if self.faulted || self.key_state != KeyState::Armed {
            self.faulted = true;
            self.key_state = KeyState::Idle;
            return;
        }
        self.key_state = KeyState::Idle;

        let bank = self.control.bank;
        let kind = if self.control.erase == EraseEnable::Enabled {
            self.erase(bank, addr);
            CycleKind::Erase
        } else {
            if let Some(cell) = self.cell_mut(bank, addr as usize) {
                *cell &= value;
            }
            CycleKind::Write
        };
        let keys = self.keys;
        self.record(Cycle { kind, bank, addr, value, keys });
    }

    fn read(&self, addr: u16) -> u8 {
        self.peek(self.control.bank, addr)
    }
}

/// RAM signature cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimSignature {
    pub value: u8,
}

impl SimSignature {
    pub const fn new(value: u8) -> Self {
        Self { value }
    }
}

impl BootSignature for SimSignature {
    fn read(&self) -> u8 {
        self.value
    }

    fn write(&mut self, value: u8) {
        self.value = value;
    }
}

/// Watchdog that records whether it was switched off
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimWatchdog {
    pub disabled: bool,
}

impl WatchdogControl for SimWatchdog {
    fn disable(&mut self) {
        self.disabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn flash() -> SimFlash<0x2000> {
        SimFlash::new(&DeviceConfig::efm8bb1(0x01, 0x2000).flash)
    }

    fn keyed_store<const N: usize>(flash: &mut SimFlash<N>, control: FlashControl, addr: u16, value: u8) {
        flash.write_key(FLASH_KEY[0]);
        flash.write_key(FLASH_KEY[1]);
        flash.set_control(control);
        flash.program(addr, value);
        flash.set_control(FlashControl::IDLE);
    }

    #[test]
    fn keyed_write_programs_and_logs() {
        let mut flash = flash();
        keyed_store(&mut flash, FlashControl::IDLE.with_write(), 0x0010, 0x5A);

        assert_eq!(flash.peek(Bank::Primary, 0x0010), 0x5A);
        assert_eq!(flash.cycle_count(), 1);
        let cycle = flash.last_cycle().unwrap();
        assert_eq!(cycle.kind, CycleKind::Write);
        assert_eq!(cycle.keys, FLASH_KEY);
        assert!(!flash.faulted());
    }

    #[test]
    fn programming_only_clears_bits() {
        let mut flash = flash();
        flash.load(Bank::Primary, 0x0000, &[0xF0]);
        keyed_store(&mut flash, FlashControl::IDLE.with_write(), 0x0000, 0x0F);
        assert_eq!(flash.peek(Bank::Primary, 0x0000), 0x00);
    }

    #[test]
    fn erase_clears_whole_page() {
        let mut flash = flash();
        flash.load(Bank::Primary, 0x0200, &[0u8; 0x200]);
        keyed_store(&mut flash, FlashControl::IDLE.with_write().with_erase(), 0x0234, 0);

        assert!(flash.is_erased(Bank::Primary, 0x0200, 0x200));
        assert_eq!(flash.last_cycle().unwrap().kind, CycleKind::Erase);
    }

    #[test]
    fn wrong_key_locks_controller() {
        let mut flash = flash();
        flash.write_key(0x00);
        flash.write_key(0x00);
        flash.set_control(FlashControl::IDLE.with_write());
        flash.program(0x0000, 0x12);

        assert!(flash.faulted());
        assert_eq!(flash.peek(Bank::Primary, 0x0000), 0xFF);
        assert_eq!(flash.cycle_count(), 0);

        // Stays locked even with the right keys afterwards
        keyed_store(&mut flash, FlashControl::IDLE.with_write(), 0x0000, 0x12);
        assert_eq!(flash.peek(Bank::Primary, 0x0000), 0xFF);
    }

    #[test]
    fn keys_cover_a_single_cycle() {
        let mut flash = flash();
        keyed_store(&mut flash, FlashControl::IDLE.with_write(), 0x0000, 0x11);
        flash.set_control(FlashControl::IDLE.with_write());
        flash.program(0x0001, 0x22);

        assert!(flash.faulted());
        assert_eq!(flash.peek(Bank::Primary, 0x0001), 0xFF);
    }

    #[test]
    fn store_without_write_enable_is_ignored() {
        let mut flash = flash();
        flash.program(0x0000, 0x00);
        assert_eq!(flash.peek(Bank::Primary, 0x0000), 0xFF);
        assert!(!flash.faulted());
    }

    #[test]
    fn scratchpad_is_separate() {
        let mut flash: SimFlash<0x1_0000> = SimFlash::new(&DeviceConfig::efm8sb2(0x01, 0x1_0000).flash);
        keyed_store(&mut flash, FlashControl::idle(Bank::Scratchpad).with_write(), 0x0004, 0x44);

        assert_eq!(flash.peek(Bank::Scratchpad, 0x0004), 0x44);
        assert_eq!(flash.peek(Bank::Primary, 0x0004), 0xFF);
    }
}
