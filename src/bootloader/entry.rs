//! Reset-time entry decision and the hand-over to the application

use embedded_hal::digital::v2::InputPin;
use log::{debug, info};

use crate::config::{DeviceConfig, BOOT_SIGNATURE, ERASED_BYTE};
use crate::hal::flash::FlashRegisters;
use crate::hal::system::{BootSignature, Jumper, SoftwareReset, WatchdogControl};
use crate::protocol::Transport;

/// Why the loader stays resident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootReason {
    /// Application asked for it through the RAM signature
    Signature,
    /// Nothing programmed at the application entry
    NoApplication,
    /// Boot pin held low through the whole sampling window
    BootPin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    StayInBootloader(BootReason),
    RunApplication,
}

/// Pick between the loader and the application. Conditions are checked
/// cheapest first; the pin is sampled `pin_low_cycles` times and must read
/// low on every sample.
pub fn decide<S, R, P>(config: &DeviceConfig, signature: &S, flash: &R, pin: &P) -> BootDecision
where
    S: BootSignature,
    R: FlashRegisters,
    P: InputPin,
{
    if signature.read() == BOOT_SIGNATURE {
        return BootDecision::StayInBootloader(BootReason::Signature);
    }
    if flash.read(config.flash.app_entry) == ERASED_BYTE {
        return BootDecision::StayInBootloader(BootReason::NoApplication);
    }
    let samples = config.pin_low_cycles.max(1);
    if (0..samples).all(|_| matches!(pin.is_low(), Ok(true))) {
        return BootDecision::StayInBootloader(BootReason::BootPin);
    }
    BootDecision::RunApplication
}

/// Prepare a resident session: the loader runs with the watchdog off
pub fn begin_session<W: WatchdogControl>(reason: BootReason, watchdog: &mut W) {
    watchdog.disable();
    info!("bootloader resident: {:?}", reason);
}

/// Leave a finished session: clear the request so the next reset goes
/// straight to the application, then let the transport wind down.
pub fn end_session<S: BootSignature, T: Transport>(signature: &mut S, transport: &mut T) {
    signature.write(0);
    transport.finish();
    debug!("session closed");
}

/// Hand control to the application
pub fn launch<J: Jumper>(config: &DeviceConfig, jumper: &mut J) -> ! {
    debug!("jumping to {:#06x}", config.flash.app_entry);
    jumper.jump(config.flash.app_entry)
}

/// Application side: ask the loader to stay resident, then reset into it
pub fn request_bootloader<S: BootSignature, R: SoftwareReset>(signature: &mut S, reset: &mut R) -> ! {
    signature.write(BOOT_SIGNATURE);
    reset.reset()
}
