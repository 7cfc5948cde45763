//! USART0 status decoding
//!
//! The register layout of UCSR0A and the transmit bookkeeping the polled
//! driver needs, kept free of the PAC so it runs on the host.

// UCSR0A
pub const RXC: u8 = 1 << 7;
pub const TXC: u8 = 1 << 6;
pub const UDRE: u8 = 1 << 5;
pub const FE: u8 = 1 << 4;
pub const DOR: u8 = 1 << 3;
pub const U2X: u8 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    Framing,
    Overrun,
}

/// Snapshot of UCSR0A
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsartStatus(pub u8);

impl UsartStatus {
    pub const fn rx_ready(self) -> bool {
        self.0 & RXC != 0
    }

    /// UDR0 can take another byte
    pub const fn tx_ready(self) -> bool {
        self.0 & UDRE != 0
    }

    /// Shift register empty too
    pub const fn tx_complete(self) -> bool {
        self.0 & TXC != 0
    }

    /// Error latched with the byte currently in UDR0
    pub const fn rx_error(self) -> Option<UartError> {
        if self.0 & FE != 0 {
            Some(UartError::Framing)
        } else if self.0 & DOR != 0 {
            Some(UartError::Overrun)
        } else {
            None
        }
    }
}

/// Tracks whether a byte is still on its way out.
///
/// TXC only sets after a transmission, so a flush with nothing sent must not
/// wait for it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transmitter {
    pending: bool,
}

impl Transmitter {
    /// UCSR0A value to write right before loading UDR0. Writing one to TXC
    /// clears it; U2X stays set.
    pub fn on_send(&mut self) -> u8 {
        self.pending = true;
        TXC | U2X
    }

    pub fn poll_flush(&mut self, status: UsartStatus) -> nb::Result<(), UartError> {
        if self.pending && !status.tx_complete() {
            return Err(nb::Error::WouldBlock);
        }
        self.pending = false;
        Ok(())
    }
}
