#![allow(clippy::missing_safety_doc)]

//! Polled USART0 for the loader
//!
//! The loader runs with interrupts off, so unlike an application UART there
//! are no ring buffers: every call checks the status flags once and reports
//! `WouldBlock` when the hardware is not ready.

use avr_device::atmega128a::{PORTE, TC1, USART0};
use embedded_hal::serial;

use super::autobaud::{baud_from_bit_ticks, ubrr_double_speed};
use super::usart::{Transmitter, UsartStatus, U2X};
use crate::config::CPU_FREQ_HZ;

pub use super::usart::UartError;

// UCSR0B
const RXEN: u8 = 1 << 4;
const TXEN: u8 = 1 << 3;
// UCSR0C: async, 8N1
const UCSZ_8BIT: u8 = 0b0000_0110;
// TC1 clk/1
const CS10: u8 = 1 << 0;
// RXD0 is PE0
const RXD: u8 = 1 << 0;

pub struct Uart {
    usart: USART0,
    tx: Transmitter,
}

impl Uart {
    /// Time the start bit of the host's training byte and configure the
    /// USART to match.
    pub fn autobaud(usart: USART0, porte: &PORTE, tc1: &TC1) -> Self {
        // Receiver off while measuring so the pin reads raw
        usart.ucsr0b.write(|w| unsafe { w.bits(0) });

        tc1.tccr1a.write(|w| unsafe { w.bits(0) });
        tc1.tccr1b.write(|w| unsafe { w.bits(0) });

        while porte.pine.read().bits() & RXD != 0 {}
        tc1.tcnt1.write(|w| unsafe { w.bits(0) });
        tc1.tccr1b.write(|w| unsafe { w.bits(CS10) });
        while porte.pine.read().bits() & RXD == 0 {}
        let bit_ticks = tc1.tcnt1.read().bits();
        tc1.tccr1b.write(|w| unsafe { w.bits(0) });

        log::debug!("autobaud: {} ticks, ~{} baud", bit_ticks, baud_from_bit_ticks(CPU_FREQ_HZ, bit_ticks));

        let mut uart = Self { usart, tx: Transmitter::default() };
        uart.configure(ubrr_double_speed(bit_ticks));
        uart
    }

    fn configure(&mut self, ubrr: u16) {
        let [high, low] = ubrr.to_be_bytes();
        self.usart.ubrr0h.write(|w| unsafe { w.bits(high) });
        self.usart.ubrr0l.write(|w| unsafe { w.bits(low) });
        self.usart.ucsr0a.write(|w| unsafe { w.bits(U2X) });
        self.usart.ucsr0c.write(|w| unsafe { w.bits(UCSZ_8BIT) });
        self.usart.ucsr0b.write(|w| unsafe { w.bits(RXEN | TXEN) });
    }

    fn status(&self) -> UsartStatus {
        UsartStatus(self.usart.ucsr0a.read().bits())
    }

    pub fn release(self) -> USART0 {
        self.usart.ucsr0b.write(|w| unsafe { w.bits(0) });
        self.usart
    }
}

impl serial::Read<u8> for Uart {
    type Error = UartError;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let status = self.status();
        if !status.rx_ready() {
            return Err(nb::Error::WouldBlock);
        }
        // UDR read clears the error flags, so sample them first
        let byte = self.usart.udr0.read().bits();
        match status.rx_error() {
            Some(err) => Err(nb::Error::Other(err)),
            None => Ok(byte),
        }
    }
}

impl serial::Write<u8> for Uart {
    type Error = UartError;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if !self.status().tx_ready() {
            return Err(nb::Error::WouldBlock);
        }
        let ucsr0a = self.tx.on_send();
        self.usart.ucsr0a.write(|w| unsafe { w.bits(ucsr0a) });
        self.usart.udr0.write(|w| unsafe { w.bits(byte) });
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        let status = self.status();
        self.tx.poll_flush(status)
    }
}
