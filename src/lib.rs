//! Resident boot-record loader
//!
//! Portable core (protocol state machine, flash access layer, entry
//! decision) written against port traits. The ATmega128 binding and the
//! firmware binary live behind the `atmega128` feature.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch))]

pub mod bootloader;
pub mod config;
pub mod drivers;
pub mod hal;
pub mod protocol;

pub use bootloader::{Bootloader, Outcome};
pub use config::DeviceConfig;
pub use protocol::{Status, Transport};
