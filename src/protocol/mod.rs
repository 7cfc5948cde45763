//! Boot-record wire protocol
//!
//! A frame is `[START][LENGTH][COMMAND][ARGS...]` where LENGTH counts the
//! command byte and its arguments. Multi-byte fields are big-endian. Every
//! frame is answered by one status byte, optionally followed by a payload.

pub mod frame;
pub mod hid;
pub mod smbus;
pub mod transport;

use core::fmt;

use crate::drivers::flash::FlashError;

pub use frame::Frame;
pub use transport::{SerialTransport, Transport};

/// Frame start sentinel
pub const FRAME_START: u8 = b'$';

/// Longest reply: status plus three payload bytes
pub const MAX_REPLY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = b'@',
    RangeError = b'A',
    BadId = b'B',
    CrcError = b'C',
    FrameError = b'?',
}

impl Status {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'@' => Some(Status::Ok),
            b'A' => Some(Status::RangeError),
            b'B' => Some(Status::BadId),
            b'C' => Some(Status::CrcError),
            b'?' => Some(Status::FrameError),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::RangeError => "range error",
            Status::BadId => "bad id",
            Status::CrcError => "crc error",
            Status::FrameError => "frame error",
        }
    }
}

impl From<FlashError> for Status {
    fn from(err: FlashError) -> Self {
        match err {
            FlashError::OutOfRange | FlashError::UnsupportedBank | FlashError::Locked => Status::RangeError,
            FlashError::CrcMismatch { .. } => Status::CrcError,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ufmt::uDisplay for Status {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        f.write_str(self.name())
    }
}

impl ufmt::uDebug for Status {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        f.write_str("Status(")?;
        ufmt::uDisplay::fmt(&self.as_byte(), f)?;
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Identify = 0x30,
    SetFlashKey = 0x31,
    Erase = 0x32,
    Write = 0x33,
    Verify = 0x34,
    Lock = 0x35,
    RunApp = 0x36,
    SelectBank = 0x37,
    InitCrc = 0x38,
    ReadCrc = 0x39,
    CheckId = 0x3A,
}

impl Command {
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        let command = match opcode {
            0x30 => Command::Identify,
            0x31 => Command::SetFlashKey,
            0x32 => Command::Erase,
            0x33 => Command::Write,
            0x34 => Command::Verify,
            0x35 => Command::Lock,
            0x36 => Command::RunApp,
            0x37 => Command::SelectBank,
            0x38 => Command::InitCrc,
            0x39 => Command::ReadCrc,
            0x3A => Command::CheckId,
            _ => return None,
        };
        Some(command)
    }

    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// Fixed argument bytes following the opcode. Write carries its data
    /// after these.
    pub const fn arity(self) -> u8 {
        match self {
            Command::Identify | Command::RunApp | Command::InitCrc => 0,
            Command::SelectBank => 1,
            Command::SetFlashKey | Command::Erase | Command::Write | Command::Lock | Command::CheckId => 2,
            Command::ReadCrc => 4,
            Command::Verify => 6,
        }
    }
}

/// Status byte plus optional payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    buf: [u8; MAX_REPLY],
    len: usize,
}

impl Reply {
    pub const fn status(status: Status) -> Self {
        Self { buf: [status.as_byte(), 0, 0, 0], len: 1 }
    }

    /// `payload` is truncated to what fits after the status byte
    pub fn with_payload(status: Status, payload: &[u8]) -> Self {
        let mut reply = Self::status(status);
        let n = payload.len().min(MAX_REPLY - 1);
        reply.buf[1..1 + n].copy_from_slice(&payload[..n]);
        reply.len = 1 + n;
        reply
    }

    pub fn status_code(&self) -> Option<Status> {
        Status::from_byte(self.buf[0])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl From<Status> for Reply {
    fn from(status: Status) -> Self {
        Reply::status(status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError<E> {
    /// Byte channel failed; the loop resynchronises on the next START
    Transport(E),
    /// Frame ended before the command's fixed arguments
    ShortFrame,
}

impl<E: fmt::Debug> fmt::Display for ProtocolError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Transport(err) => write!(f, "transport error: {:?}", err),
            ProtocolError::ShortFrame => f.write_str("frame shorter than command arguments"),
        }
    }
}

impl<E> ufmt::uDebug for ProtocolError<E> {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            ProtocolError::Transport(_) => f.write_str("Transport(..)"),
            ProtocolError::ShortFrame => f.write_str("ShortFrame"),
        }
    }
}

pub type Result<T, E> = core::result::Result<T, ProtocolError<E>>;
