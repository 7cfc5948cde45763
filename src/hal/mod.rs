pub mod autobaud;
pub mod crc;
pub mod flash;
pub mod sim;
pub mod system;
pub mod usart;

#[cfg(feature = "atmega128")]
pub mod gpio;
#[cfg(feature = "atmega128")]
pub mod spm;
#[cfg(feature = "atmega128")]
pub mod uart;
#[cfg(feature = "atmega128")]
pub mod watchdog;

// Re-export commonly used types
pub use crc::{Crc16, CrcControl, CrcUnit, SoftCrc};
pub use flash::{FlashControl, FlashRegisters, FLASH_KEY};
pub use system::{BootSignature, Jumper, SoftwareReset, WatchdogControl};

#[cfg(feature = "atmega128")]
pub use gpio::BootButton;
#[cfg(feature = "atmega128")]
pub use spm::{AppJumper, NoinitSignature, SpmFlash, WatchdogReset};
#[cfg(feature = "atmega128")]
pub use uart::Uart;
#[cfg(feature = "atmega128")]
pub use watchdog::Watchdog;
