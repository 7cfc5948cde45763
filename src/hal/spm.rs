//! Self-programming port for the ATmega128
//!
//! The AVR has no keyed byte-write controller, so [`SpmFlash`] emulates one
//! on top of SPM: keys are latched by [`FlashRegisters::write_key`] and a
//! store only reaches the array when both matched. The control register is
//! kept as its raw image, the way the silicon holds it. Byte writes go through
//! the page buffer with every other byte left at 0xFF, which programs one
//! byte and leaves its neighbours unchanged.

use core::arch::asm;
use core::ptr::{read_volatile, write_volatile};

use super::flash::{FlashControl, FlashRegisters, FLASH_KEY};
use super::system::{BootSignature, Jumper, SoftwareReset};
use super::watchdog::Watchdog;
use crate::config::ERASED_BYTE;

/// SPMCSR lives in extended I/O
const SPMCSR: u8 = 0x68;

const SPMEN: u8 = 1 << 0;
const PGERS: u8 = 1 << 1;
const PGWRT: u8 = 1 << 2;
const RWWSRE: u8 = 1 << 4;
const RWWSB: u8 = 1 << 6;

const PAGE_SIZE: u16 = 256;

fn spm_busy() -> bool {
    unsafe { read_volatile(SPMCSR as usize as *const u8) & SPMEN != 0 }
}

/// Issue one SPM with `command` at byte address `addr`. R1:R0 carry `word`
/// for buffer loads.
unsafe fn spm(addr: u16, command: u8, word: u16) {
    while spm_busy() {}
    asm!(
        "movw r0, {word}",
        "sts 0x68, {cmd}",
        "spm",
        "clr r1",
        word = in(reg_pair) word,
        cmd = in(reg) command,
        in("Z") addr,
    );
    while spm_busy() {}
}

unsafe fn lpm(addr: u16) -> u8 {
    let value: u8;
    asm!(
        "lpm {value}, Z",
        value = out(reg) value,
        in("Z") addr,
    );
    value
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keys {
    Locked,
    Idle,
    First,
    Armed,
}

pub struct SpmFlash {
    /// PSCTL image
    psctl: u8,
    keys: Keys,
}

impl SpmFlash {
    pub fn new() -> Self {
        Self { psctl: FlashControl::IDLE.bits(), keys: Keys::Idle }
    }

    fn erase_page(&mut self, addr: u16) {
        let base = addr & !(PAGE_SIZE - 1);
        unsafe {
            spm(base, PGERS | SPMEN, 0);
            self.enable_rww();
        }
    }

    fn program_byte(&mut self, addr: u16, value: u8) {
        let base = addr & !(PAGE_SIZE - 1);
        let word_addr = addr & !1;
        let word = if addr & 1 == 0 {
            u16::from_le_bytes([value, ERASED_BYTE])
        } else {
            u16::from_le_bytes([ERASED_BYTE, value])
        };
        unsafe {
            spm(word_addr, SPMEN, word);
            spm(base, PGWRT | SPMEN, 0);
            self.enable_rww();
        }
    }

    unsafe fn enable_rww(&mut self) {
        while read_volatile(SPMCSR as usize as *const u8) & RWWSB != 0 {
            spm(0, RWWSRE | SPMEN, 0);
        }
    }
}

impl Default for SpmFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashRegisters for SpmFlash {
    fn write_key(&mut self, key: u8) {
        self.keys = match (self.keys, key) {
            (Keys::Locked, _) => Keys::Locked,
            (Keys::Idle, k) if k == FLASH_KEY[0] => Keys::First,
            (Keys::First, k) if k == FLASH_KEY[1] => Keys::Armed,
            _ => Keys::Locked,
        };
    }

    fn control(&self) -> FlashControl {
        FlashControl::from_bits(self.psctl)
    }

    fn set_control(&mut self, control: FlashControl) {
        self.psctl = control.bits();
    }

    fn program(&mut self, addr: u16, value: u8) {
        let control = self.control();
        if !control.write_enabled() {
            return;
        }
        if self.keys != Keys::Armed {
            self.keys = Keys::Locked;
            return;
        }
        self.keys = Keys::Idle;

        if control.erase_enabled() {
            self.erase_page(addr);
        } else {
            self.program_byte(addr, value);
        }
    }

    fn read(&self, addr: u16) -> u8 {
        unsafe { lpm(addr) }
    }
}

#[link_section = ".noinit"]
static mut SIGNATURE: u8 = 0;

/// The `.noinit` byte the application sets before resetting into the loader
pub struct NoinitSignature {
    _private: (),
}

impl NoinitSignature {
    /// Only one handle may exist; `main` creates it once.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl BootSignature for NoinitSignature {
    fn read(&self) -> u8 {
        unsafe { read_volatile(core::ptr::addr_of!(SIGNATURE)) }
    }

    fn write(&mut self, value: u8) {
        unsafe { write_volatile(core::ptr::addr_of_mut!(SIGNATURE), value) }
    }
}

/// Direct jump into application space
pub struct AppJumper;

impl Jumper for AppJumper {
    fn jump(&mut self, address: u16) -> ! {
        let word = address >> 1;
        unsafe {
            asm!(
                "ijmp",
                in("Z") word,
                options(noreturn),
            )
        }
    }
}

/// Reset through a watchdog timeout
pub struct WatchdogReset {
    watchdog: Watchdog,
}

impl WatchdogReset {
    pub fn new(watchdog: Watchdog) -> Self {
        Self { watchdog }
    }
}

impl SoftwareReset for WatchdogReset {
    #[allow(clippy::empty_loop)]
    fn reset(&mut self) -> ! {
        avr_device::interrupt::disable();
        self.watchdog.start_shortest();
        loop {}
    }
}
