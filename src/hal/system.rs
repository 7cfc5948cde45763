//! Reset-survivable state and control transfer

/// The RAM byte shared between the application and the loader across a
/// software reset.
pub trait BootSignature {
    fn read(&self) -> u8;

    fn write(&mut self, value: u8);
}

/// Transfers control to code at a fixed address. Never returns.
pub trait Jumper {
    fn jump(&mut self, address: u16) -> !;
}

/// Core reset issued by firmware
pub trait SoftwareReset {
    fn reset(&mut self) -> !;
}

/// Watchdog control needed by the loader: it runs with the watchdog off
pub trait WatchdogControl {
    fn disable(&mut self);
}
