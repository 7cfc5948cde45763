//! Frame reader bounded by LENGTH

use super::transport::Transport;
use super::{ProtocolError, Result};

/// Reads the body of one frame. Never consumes past the frame: asking for
/// more than is left yields [`ProtocolError::ShortFrame`].
pub struct Frame<'a, T: Transport> {
    transport: &'a mut T,
    remaining: u8,
}

impl<'a, T: Transport> Frame<'a, T> {
    /// Start a frame body of `length` bytes
    pub fn begin(transport: &'a mut T, length: u8) -> Self {
        if length == 0 {
            transport.end_frame();
        }
        Self { transport, remaining: length }
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn byte(&mut self) -> Result<u8, T::Error> {
        if self.remaining == 0 {
            return Err(ProtocolError::ShortFrame);
        }
        let byte = self.transport.read_byte().map_err(ProtocolError::Transport)?;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.transport.end_frame();
        }
        Ok(byte)
    }

    /// Big-endian 16-bit field
    pub fn word(&mut self) -> Result<u16, T::Error> {
        if self.remaining < 2 {
            return Err(ProtocolError::ShortFrame);
        }
        let high = self.byte()?;
        let low = self.byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    /// Consume whatever is left of the frame
    pub fn drain(&mut self) -> Result<(), T::Error> {
        while self.remaining > 0 {
            self.byte()?;
        }
        Ok(())
    }
}
