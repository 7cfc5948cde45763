//! Boot-record state machine
//!
//! `sync → length → dispatch → reply`, forever, until a RunApp frame has
//! been acknowledged. Errors in a command are reported in the status byte
//! and never stop the loop; a failing transport is logged and the loop
//! resynchronises on the next frame start.

pub mod entry;

use log::{debug, trace, warn};

use crate::config::{Bank, DeviceConfig, Identity};
use crate::drivers::flash::FlashAccess;
use crate::hal::crc::CrcUnit;
use crate::hal::flash::FlashRegisters;
use crate::protocol::{Command, Frame, ProtocolError, Reply, Result, Status, Transport};

pub use entry::{decide, BootDecision, BootReason};

/// What one frame led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replied(Status),
    /// RunApp was acknowledged
    RunApplication,
}

pub struct Bootloader<T, R, C> {
    transport: T,
    flash: FlashAccess<R, C>,
    identity: Identity,
}

impl<T, R, C> Bootloader<T, R, C>
where
    T: Transport,
    R: FlashRegisters,
    C: CrcUnit,
{
    pub fn new(transport: T, regs: R, crc: C, config: &DeviceConfig) -> Self {
        Self {
            transport,
            flash: FlashAccess::new(regs, crc, config.flash),
            identity: config.identity,
        }
    }

    pub fn flash(&self) -> &FlashAccess<R, C> {
        &self.flash
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn release(self) -> (T, FlashAccess<R, C>) {
        (self.transport, self.flash)
    }

    /// Serve frames until the host asks to run the application
    pub fn run(&mut self) {
        loop {
            match self.step() {
                Ok(Outcome::RunApplication) => return,
                Ok(Outcome::Replied(status)) => trace!("replied {}", status),
                Err(err) => warn!("{}, resynchronising", err),
            }
        }
    }

    /// Receive, execute and answer one frame
    pub fn step(&mut self) -> Result<Outcome, T::Error> {
        self.transport.sync().map_err(ProtocolError::Transport)?;
        let length = self.transport.read_byte().map_err(ProtocolError::Transport)?;

        let mut frame = Frame::begin(&mut self.transport, length);
        let (reply, outcome) = if length == 0 {
            debug!("empty frame");
            (Reply::status(Status::FrameError), None)
        } else {
            let opcode = frame.byte()?;
            match Command::from_opcode(opcode) {
                None => {
                    debug!("unknown command {:#04x}", opcode);
                    (Reply::status(Status::RangeError), None)
                }
                Some(command) if frame.remaining() < command.arity() => {
                    debug!("{:?} frame too short", command);
                    (Reply::status(Status::FrameError), None)
                }
                Some(command) => match Self::execute(&mut self.flash, &self.identity, command, &mut frame) {
                    Ok(reply) => {
                        let outcome = (command == Command::RunApp).then_some(Outcome::RunApplication);
                        (reply, outcome)
                    }
                    Err(ProtocolError::ShortFrame) => {
                        debug!("{:?} frame too short", command);
                        (Reply::status(Status::FrameError), None)
                    }
                    Err(err) => return Err(err),
                },
            }
        };
        frame.drain()?;

        self.transport.send_reply(reply.as_bytes()).map_err(ProtocolError::Transport)?;
        let status = reply.status_code().unwrap_or(Status::FrameError);
        Ok(outcome.unwrap_or(Outcome::Replied(status)))
    }

    /// Run one command. All fixed arguments are read before anything is
    /// touched, so a short frame has no side effects.
    fn execute(
        flash: &mut FlashAccess<R, C>,
        identity: &Identity,
        command: Command,
        frame: &mut Frame<'_, T>,
    ) -> Result<Reply, T::Error> {
        let status = match command {
            Command::Identify => {
                let [high, low] = identity.derivative_id.to_be_bytes();
                return Ok(Reply::with_payload(Status::Ok, &[high, low, identity.revision]));
            }
            Command::SetFlashKey => {
                let first = frame.byte()?;
                let second = frame.byte()?;
                flash.set_keys(first, second);
                Status::Ok
            }
            Command::Erase => {
                let addr = frame.word()?;
                trace!("erase {:#06x}", addr);
                status_of(flash.erase_page(addr))
            }
            Command::Write => {
                let addr = frame.word()?;
                let size = frame.remaining() as u16;
                trace!("write {:#06x}+{}", addr, size);
                match flash.check_writable(addr, size) {
                    Ok(()) => {
                        for offset in 0..size {
                            let byte = frame.byte()?;
                            if let Err(err) = flash.write_byte(addr + offset, byte) {
                                return Ok(Reply::status(err.into()));
                            }
                        }
                        Status::Ok
                    }
                    Err(err) => err.into(),
                }
            }
            Command::Verify => {
                let start = frame.word()?;
                let end = frame.word()?;
                let crc = frame.word()?;
                status_of(flash.verify(start, end, crc))
            }
            Command::Lock => {
                let signature = frame.byte()?;
                let lock = frame.byte()?;
                status_of(flash.program_lock(signature, lock))
            }
            Command::RunApp => Status::Ok,
            Command::SelectBank => {
                let index = frame.byte()?;
                match Bank::from_index(index) {
                    Some(bank) => status_of(flash.select_bank(bank)),
                    None => Status::RangeError,
                }
            }
            Command::InitCrc => {
                flash.init_crc();
                Status::Ok
            }
            Command::ReadCrc => {
                let addr = frame.word()?;
                let len = frame.word()?;
                return Ok(match flash.update_crc(addr, len) {
                    Ok(()) => Reply::with_payload(Status::Ok, &flash.read_crc().to_be_bytes()),
                    Err(err) => Reply::status(err.into()),
                });
            }
            Command::CheckId => {
                let id = frame.word()?;
                if id == identity.derivative_id {
                    Status::Ok
                } else {
                    Status::BadId
                }
            }
        };
        Ok(Reply::status(status))
    }
}

fn status_of<E: Into<Status>>(result: core::result::Result<(), E>) -> Status {
    match result {
        Ok(()) => Status::Ok,
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::crc::SoftCrc;
    use crate::hal::flash::FLASH_KEY;
    use crate::hal::sim::SimFlash;
    use crate::protocol::{SerialTransport, FRAME_START};
    use embedded_hal_mock::serial::{Mock as SerialMock, Transaction};

    type Loader = Bootloader<SerialTransport<SerialMock<u8>>, SimFlash<0x2000>, SoftCrc>;

    fn loader(serial: &SerialMock<u8>) -> Loader {
        let config = DeviceConfig::efm8bb1(0x01, 0x2000);
        Bootloader::new(SerialTransport::new(serial.clone()), SimFlash::new(&config.flash), SoftCrc::new(), &config)
    }

    fn exchange(frame: &[u8], reply: &[u8]) -> [Transaction<u8>; 3] {
        [Transaction::read_many(frame), Transaction::write_many(reply), Transaction::flush()]
    }

    #[test]
    fn identify_reports_derivative_and_revision() {
        let expectations = exchange(&[FRAME_START, 0x01, 0x30], &[0x40, 0x30, 0x01, 0x90]);
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::Ok));
        serial.done();
    }

    #[test]
    fn empty_frame_is_a_frame_error() {
        let expectations = exchange(&[FRAME_START, 0x00], b"?");
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::FrameError));
        serial.done();
    }

    #[test]
    fn unknown_command_drains_and_rejects() {
        let expectations = exchange(&[FRAME_START, 0x04, 0x7E, 0x01, 0x02, 0x03], b"A");
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::RangeError));
        serial.done();
    }

    #[test]
    fn short_key_frame_leaves_keys_alone() {
        let expectations = exchange(&[FRAME_START, 0x02, 0x31, 0xA5], b"?");
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::FrameError));
        assert_eq!(loader.flash().keys(), [0, 0]);
        serial.done();
    }

    #[test]
    fn key_frame_with_trailing_bytes() {
        let expectations = exchange(&[FRAME_START, 0x05, 0x31, 0xA5, 0xF1, 0xEE, 0xEE], b"@");
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        loader.step().unwrap();
        assert_eq!(loader.flash().keys(), FLASH_KEY);
        serial.done();
    }

    #[test]
    fn check_id() {
        let expectations: Vec<_> = exchange(&[FRAME_START, 0x03, 0x3A, 0x30, 0x01], b"@")
            .into_iter()
            .chain(exchange(&[FRAME_START, 0x03, 0x3A, 0x30, 0x02], b"B"))
            .collect();
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::Ok));
        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::BadId));
        serial.done();
    }

    #[test]
    fn select_missing_scratchpad() {
        let expectations = exchange(&[FRAME_START, 0x02, 0x37, 0x01], b"A");
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::Replied(Status::RangeError));
        assert_eq!(loader.flash().bank(), Bank::Primary);
        serial.done();
    }

    #[test]
    fn run_app_is_acknowledged() {
        let expectations = exchange(&[FRAME_START, 0x01, 0x36], b"@");
        let mut serial = SerialMock::new(&expectations);
        let mut loader = loader(&serial);

        assert_eq!(loader.step().unwrap(), Outcome::RunApplication);
        serial.done();
    }
}
