//! USB HID transport
//!
//! Frames ride in OUT reports, one frame per report. Replies go back in a
//! single IN report padded with zeros.

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use log::trace;
use nb::block;

use super::transport::Transport;
use super::FRAME_START;

/// Largest full-speed interrupt report
pub const MAX_REPORT: usize = 64;

/// Time the host gets to read the last reply before the device leaves the bus
pub const DETACH_DELAY_MS: u16 = 100;

/// Report pipe of the HID class driver
pub trait HidReports {
    type Error: Debug;

    /// Copy the next OUT report into `buf` and return its length
    fn read_report(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    fn write_report(&mut self, report: &[u8]) -> nb::Result<(), Self::Error>;
}

pub struct HidTransport<H, D> {
    hid: H,
    delay: D,
    report: [u8; MAX_REPORT],
    len: usize,
    pos: usize,
    in_report_size: usize,
}

impl<H: HidReports, D: DelayMs<u16>> HidTransport<H, D> {
    pub fn new(hid: H, delay: D, in_report_size: u8) -> Self {
        Self {
            hid,
            delay,
            report: [0; MAX_REPORT],
            len: 0,
            pos: 0,
            in_report_size: (in_report_size as usize).clamp(1, MAX_REPORT),
        }
    }

    pub fn release(self) -> (H, D) {
        (self.hid, self.delay)
    }

    fn next_report(&mut self) -> Result<(), H::Error> {
        let len = block!(self.hid.read_report(&mut self.report))?;
        self.len = len.min(MAX_REPORT);
        self.pos = 0;
        Ok(())
    }
}

impl<H: HidReports, D: DelayMs<u16>> Transport for HidTransport<H, D> {
    type Error = H::Error;

    fn read_byte(&mut self) -> Result<u8, H::Error> {
        while self.pos >= self.len {
            self.next_report()?;
        }
        let byte = self.report[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn send_reply(&mut self, reply: &[u8]) -> Result<(), H::Error> {
        let mut report = [0u8; MAX_REPORT];
        let n = reply.len().min(self.in_report_size);
        report[..n].copy_from_slice(&reply[..n]);
        block!(self.hid.write_report(&report[..self.in_report_size]))
    }

    /// Drop whole reports until one opens with a frame start
    fn sync(&mut self) -> Result<(), H::Error> {
        loop {
            self.next_report()?;
            if self.len > 0 && self.report[0] == FRAME_START {
                self.pos = 1;
                return Ok(());
            }
            trace!("hid: dropped report of {} bytes", self.len);
        }
    }

    fn finish(&mut self) {
        self.delay.delay_ms(DETACH_DELAY_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reports<'a> {
        incoming: &'a [&'a [u8]],
        next: usize,
        sent: [[u8; MAX_REPORT]; 2],
        sent_len: [usize; 2],
        sent_count: usize,
    }

    impl<'a> Reports<'a> {
        fn new(incoming: &'a [&'a [u8]]) -> Self {
            Self { incoming, next: 0, sent: [[0; MAX_REPORT]; 2], sent_len: [0; 2], sent_count: 0 }
        }
    }

    impl HidReports for Reports<'_> {
        type Error = ();

        fn read_report(&mut self, buf: &mut [u8]) -> nb::Result<usize, ()> {
            let report = self.incoming.get(self.next).ok_or(nb::Error::Other(()))?;
            self.next += 1;
            buf[..report.len()].copy_from_slice(report);
            Ok(report.len())
        }

        fn write_report(&mut self, report: &[u8]) -> nb::Result<(), ()> {
            self.sent[self.sent_count][..report.len()].copy_from_slice(report);
            self.sent_len[self.sent_count] = report.len();
            self.sent_count += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay {
        total_ms: u32,
    }

    impl DelayMs<u16> for Delay {
        fn delay_ms(&mut self, ms: u16) {
            self.total_ms += ms as u32;
        }
    }

    #[test]
    fn reports_without_start_are_dropped_whole() {
        let incoming: [&[u8]; 3] = [&[0x00, FRAME_START, 0x01], &[0x11, 0x22], &[FRAME_START, 0x01, 0x30]];
        let mut transport = HidTransport::new(Reports::new(&incoming), Delay::default(), 64);

        transport.sync().unwrap();
        assert_eq!(transport.read_byte().unwrap(), 0x01);
        assert_eq!(transport.read_byte().unwrap(), 0x30);
    }

    #[test]
    fn reply_padded_to_in_report() {
        let incoming: [&[u8]; 0] = [];
        let mut transport = HidTransport::new(Reports::new(&incoming), Delay::default(), 64);

        transport.send_reply(&[0x40]).unwrap();
        let (reports, _) = transport.release();
        assert_eq!(reports.sent_count, 1);
        assert_eq!(reports.sent_len[0], 64);
        assert_eq!(reports.sent[0][0], 0x40);
        assert!(reports.sent[0][1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn finish_waits_for_host() {
        let incoming: [&[u8]; 0] = [];
        let mut transport = HidTransport::new(Reports::new(&incoming), Delay::default(), 64);
        transport.finish();
        let (_, delay) = transport.release();
        assert_eq!(delay.total_ms, 100);
    }

    #[test]
    fn frame_may_continue_in_next_report() {
        let incoming: [&[u8]; 2] = [&[FRAME_START, 0x03, 0x32], &[0x12, 0x34]];
        let mut transport = HidTransport::new(Reports::new(&incoming), Delay::default(), 64);

        transport.sync().unwrap();
        let mut body = [0u8; 4];
        for slot in body.iter_mut() {
            *slot = transport.read_byte().unwrap();
        }
        assert_eq!(body, [0x03, 0x32, 0x12, 0x34]);
    }
}
