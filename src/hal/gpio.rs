//! Boot request input
//!
//! Only the one pin the loader samples at reset. It is an input with the
//! pull-up on, so an open button reads high.

use avr_device::atmega128a::PORTB;
use core::convert::Infallible;
use embedded_hal::digital::v2::InputPin;

use crate::config::BootPin;

pub struct BootButton {
    port: PORTB,
    mask: u8,
}

impl BootButton {
    /// Pulled-up input on bit `pin.pin` of PORTB
    pub fn new(port: PORTB, pin: BootPin) -> Self {
        let mask = 1 << (pin.pin & 0x07);
        port.ddrb.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
        port.portb.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
        Self { port, mask }
    }

    /// Restore the reset state before handing the port to the application
    pub fn release(self) -> PORTB {
        self.port.portb.modify(|r, w| unsafe { w.bits(r.bits() & !self.mask) });
        self.port
    }
}

impl InputPin for BootButton {
    type Error = Infallible;

    #[inline]
    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.port.pinb.read().bits() & self.mask != 0)
    }

    #[inline]
    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}
