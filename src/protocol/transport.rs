//! Byte channel the protocol loop runs over

use core::fmt::Debug;

use embedded_hal::serial;
use nb::block;

use super::FRAME_START;

/// Blocking one-byte-at-a-time channel with frame-start detection.
///
/// Only [`read_byte`](Self::read_byte) and [`send_reply`](Self::send_reply)
/// are required. The hooks default to what a plain serial line needs.
pub trait Transport {
    type Error: Debug;

    /// Next byte from the host, waiting as long as it takes
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    fn send_reply(&mut self, reply: &[u8]) -> Result<(), Self::Error>;

    /// Discard input up to and including the next frame start
    fn sync(&mut self) -> Result<(), Self::Error> {
        while self.read_byte()? != FRAME_START {}
        Ok(())
    }

    /// Called once the last byte of a frame has been read
    fn end_frame(&mut self) {}

    /// Called after the RunApp reply, before control leaves the loader
    fn finish(&mut self) {}
}

/// UART transport over any `embedded-hal` serial port
pub struct SerialTransport<S> {
    serial: S,
}

impl<S> SerialTransport<S> {
    pub fn new(serial: S) -> Self {
        Self { serial }
    }

    pub fn release(self) -> S {
        self.serial
    }
}

impl<S, E> Transport for SerialTransport<S>
where
    S: serial::Read<u8, Error = E> + serial::Write<u8, Error = E>,
    E: Debug,
{
    type Error = E;

    fn read_byte(&mut self) -> Result<u8, E> {
        block!(self.serial.read())
    }

    fn send_reply(&mut self, reply: &[u8]) -> Result<(), E> {
        for &byte in reply {
            block!(self.serial.write(byte))?;
        }
        block!(self.serial.flush())
    }
}
