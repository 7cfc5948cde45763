//! Device configuration for the boot-record loader
//!
//! Every per-target difference (flash geometry, boot pin, transport, identity)
//! lives in a [`DeviceConfig`] value. The protocol and flash layers only ever
//! read these fields.

/// CPU frequency in Hz (ATmega128 board)
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// Bootloader firmware revision reported by `Identify`
pub const BL_REVISION: u8 = 0x90;

/// RAM signature value requesting bootloader entry after a software reset
pub const BOOT_SIGNATURE: u8 = 0xA5;

/// Value flash reads back as once erased
pub const ERASED_BYTE: u8 = 0xFF;

/// Silicon Labs USB vendor id used by the HID variant
pub const HID_VENDOR_ID: u16 = 0x10C4;

/// HID product ids for the boot-record loader
pub const HID_PRODUCT_IDS: [u16; 2] = [0xEAC9, 0xEACA];

/// Flash bank addressed by erase, write and CRC commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    /// Main code flash
    Primary,
    /// Secondary, non-executable flash page(s)
    Scratchpad,
}

impl Bank {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Bank::Primary),
            1 => Some(Bank::Scratchpad),
            _ => None,
        }
    }
}

/// Whether a programmed lock byte stops the loader from modifying flash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockPolicy {
    /// Lock byte only protects against debugger reads
    Ignore,
    /// Any erase or write is refused once the lock byte is programmed
    RefuseWrites,
}

/// Flash region descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Physical size of the primary bank in bytes
    pub flash_size: u32,
    /// Erase granularity in bytes
    pub page_size: u16,
    /// First address occupied by the loader itself
    pub bootloader_start: u32,
    /// Size of the scratchpad bank, if the device has one
    pub scratchpad_size: Option<u32>,
    /// Address of the flash lock byte
    pub lock_address: u16,
    /// Address of the flash signature byte programmed by `Lock`
    pub signature_address: u16,
    /// Reset vector of the application
    pub app_entry: u16,
    pub lock_policy: LockPolicy,
}

impl FlashGeometry {
    /// Upper bound (exclusive) for erase and write in `bank`
    pub const fn write_limit(&self, bank: Bank) -> u32 {
        match bank {
            Bank::Primary => {
                if self.bootloader_start < self.flash_size {
                    self.bootloader_start
                } else {
                    self.flash_size
                }
            }
            Bank::Scratchpad => match self.scratchpad_size {
                Some(size) => size,
                None => 0,
            },
        }
    }

    /// Upper bound (exclusive) for CRC reads in `bank`
    pub const fn read_limit(&self, bank: Bank) -> u32 {
        match bank {
            Bank::Primary => self.flash_size,
            Bank::Scratchpad => match self.scratchpad_size {
                Some(size) => size,
                None => 0,
            },
        }
    }

    pub const fn has_scratchpad(&self) -> bool {
        self.scratchpad_size.is_some()
    }

    /// First address of the page holding `addr`
    pub const fn page_base(&self, addr: u16) -> u16 {
        let size = self.page_size as u32;
        ((addr as u32 / size) * size) as u16
    }
}

/// Identity reported to host tooling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Family code in the high byte, variant code in the low byte
    pub derivative_id: u16,
    pub revision: u8,
}

/// Port/pin of the "hold to flash" input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootPin {
    pub port: u8,
    pub pin: u8,
}

/// Transport the loader listens on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Autobaud serial line
    Uart,
    /// SMBus/I2C slave at a 7-bit address
    Smbus { address: u8 },
    /// USB HID device, replies padded to one IN report
    UsbHid { vendor_id: u16, product_id: u16, in_report_size: u8 },
}

/// Complete per-target description
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: &'static str,
    pub identity: Identity,
    pub flash: FlashGeometry,
    pub boot_pin: BootPin,
    /// Consecutive low samples required on the boot pin
    pub pin_low_cycles: u16,
    pub transport: TransportKind,
}

impl DeviceConfig {
    /// EFM8BB1 with the UART loader (one 512 byte loader page)
    pub const fn efm8bb1(variant: u8, flash_size: u32) -> Self {
        let bootloader_start = flash_size - 512;
        Self {
            name: "EFM8BB1",
            identity: Identity { derivative_id: 0x3000 | variant as u16, revision: BL_REVISION },
            flash: FlashGeometry {
                flash_size,
                page_size: 512,
                bootloader_start,
                scratchpad_size: None,
                lock_address: (flash_size - 1) as u16,
                signature_address: (flash_size - 2) as u16,
                app_entry: 0x0000,
                lock_policy: LockPolicy::Ignore,
            },
            boot_pin: BootPin { port: 2, pin: 0 },
            pin_low_cycles: 50 * 25 / 8,
            transport: TransportKind::Uart,
        }
    }

    /// EFM8SB2 with the UART loader and a 1 KiB scratchpad
    pub const fn efm8sb2(variant: u8, flash_size: u32) -> Self {
        let bootloader_start = flash_size - 1024;
        Self {
            name: "EFM8SB2",
            identity: Identity { derivative_id: 0x1600 | variant as u16, revision: BL_REVISION },
            flash: FlashGeometry {
                flash_size,
                page_size: 1024,
                bootloader_start,
                scratchpad_size: Some(0x400),
                lock_address: (flash_size - 1) as u16,
                signature_address: (flash_size - 2) as u16,
                app_entry: 0x0000,
                lock_policy: LockPolicy::Ignore,
            },
            boot_pin: BootPin { port: 2, pin: 7 },
            pin_low_cycles: 50 * 20 / 8,
            transport: TransportKind::Uart,
        }
    }

    /// EFM8LB1 with the SMBus loader living in the 0xFA00 flash block
    pub const fn efm8lb1(variant: u8, flash_size: u32) -> Self {
        Self {
            name: "EFM8LB1",
            identity: Identity { derivative_id: 0x3400 | variant as u16, revision: BL_REVISION },
            flash: FlashGeometry {
                flash_size,
                page_size: 512,
                bootloader_start: 0xFA00,
                scratchpad_size: None,
                lock_address: 0xFBFF,
                signature_address: 0xFBFE,
                app_entry: 0x0000,
                lock_policy: LockPolicy::Ignore,
            },
            boot_pin: BootPin { port: 3, pin: 7 },
            pin_low_cycles: 50 * 25 / 8,
            // 0xF0 in the byte-aligned SMB0ADR layout
            transport: TransportKind::Smbus { address: 0x78 },
        }
    }

    /// EFM8UB2 with the USB HID loader (three 512 byte loader pages)
    pub const fn efm8ub2(variant: u8, flash_size: u32) -> Self {
        let bootloader_start = flash_size - 3 * 512;
        Self {
            name: "EFM8UB2",
            identity: Identity { derivative_id: 0x2800 | variant as u16, revision: BL_REVISION },
            flash: FlashGeometry {
                flash_size,
                page_size: 512,
                bootloader_start,
                scratchpad_size: None,
                lock_address: (flash_size - 1) as u16,
                signature_address: (flash_size - 2) as u16,
                app_entry: 0x0000,
                lock_policy: LockPolicy::Ignore,
            },
            boot_pin: BootPin { port: 3, pin: 0 },
            pin_low_cycles: 50 * 48 / 8,
            transport: TransportKind::UsbHid {
                vendor_id: HID_VENDOR_ID,
                product_id: HID_PRODUCT_IDS[0],
                in_report_size: 64,
            },
        }
    }

    /// ATmega128 board: lower 64 KiB window, loader section at the top
    pub const fn atmega128() -> Self {
        Self {
            name: "ATmega128",
            identity: Identity { derivative_id: 0x9702, revision: BL_REVISION },
            flash: FlashGeometry {
                flash_size: 0x1_0000,
                page_size: 256,
                // Loader section sits at 0x1E000, outside the 16-bit window
                bootloader_start: 0x1_E000,
                scratchpad_size: None,
                lock_address: 0xFFFF,
                signature_address: 0xFFFE,
                app_entry: 0x0000,
                lock_policy: LockPolicy::Ignore,
            },
            boot_pin: BootPin { port: 1, pin: 0 },
            pin_low_cycles: 2000,
            transport: TransportKind::Uart,
        }
    }

    pub fn bank_supported(&self, bank: Bank) -> bool {
        match bank {
            Bank::Primary => true,
            Bank::Scratchpad => self.flash.has_scratchpad(),
        }
    }
}
