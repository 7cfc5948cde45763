//! SMBus/I2C slave transport
//!
//! Every bus transaction carries one byte. A master read is answered with
//! the byte staged in `tx`, which holds FrameError until a reply is ready,
//! so a host polling too early learns the frame was not complete. Once the
//! last byte of a frame is in, the slave is switched off and the host's
//! address is NAKed until the reply is staged.

use core::fmt::Debug;

use log::trace;
use nb::block;

use super::transport::Transport;
use super::{Status, FRAME_START};

/// Slave events, decoded from the peripheral's status vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbusEvent {
    /// Own address matched, master writes
    AddressWrite,
    /// Own address matched, master reads
    AddressRead,
    DataReceived(u8),
    DataSent,
    /// Stop condition or bus error
    Stop,
}

/// Register-level slave peripheral
pub trait SmbusSlave {
    type Error: Debug;

    /// Next bus event, clearing the interrupt flag
    fn poll(&mut self) -> nb::Result<SmbusEvent, Self::Error>;

    /// ACK the bytes of a master write
    fn ack(&mut self);

    /// Load the data register for a master read
    fn load(&mut self, byte: u8);

    /// Enable or disable address matching
    fn set_enabled(&mut self, enabled: bool);
}

pub struct SmbusTransport<B> {
    bus: B,
    tx: u8,
}

impl<B: SmbusSlave> SmbusTransport<B> {
    pub fn new(mut bus: B) -> Self {
        bus.set_enabled(true);
        Self { bus, tx: Status::FrameError.as_byte() }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }

    fn next_event(&mut self) -> Result<SmbusEvent, B::Error> {
        let event = block!(self.bus.poll())?;
        match event {
            SmbusEvent::AddressWrite => self.bus.ack(),
            SmbusEvent::AddressRead => self.bus.load(self.tx),
            SmbusEvent::DataReceived(_) | SmbusEvent::DataSent | SmbusEvent::Stop => {}
        }
        Ok(event)
    }
}

impl<B: SmbusSlave> Transport for SmbusTransport<B> {
    type Error = B::Error;

    fn read_byte(&mut self) -> Result<u8, B::Error> {
        loop {
            if let SmbusEvent::DataReceived(byte) = self.next_event()? {
                return Ok(byte);
            }
        }
    }

    fn send_reply(&mut self, reply: &[u8]) -> Result<(), B::Error> {
        self.bus.set_enabled(true);
        for &byte in reply {
            self.tx = byte;
            while self.next_event()? != SmbusEvent::DataSent {}
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), B::Error> {
        self.tx = Status::FrameError.as_byte();
        while self.read_byte()? != FRAME_START {}
        Ok(())
    }

    fn end_frame(&mut self) {
        trace!("smbus: frame complete, slave off");
        self.bus.set_enabled(false);
    }
}
