//! Baud-rate derivation from a measured training byte
//!
//! The host opens the session with `0xFF`: only the start bit is low, so the
//! low pulse on RX is exactly one bit time. The loader times that pulse with
//! a free-running counter and programs the UART from the measurement.

/// UBRR value for an AVR USART in double-speed mode (8 samples per bit),
/// from a bit time measured in CPU clocks. Rounds to nearest.
pub fn ubrr_double_speed(bit_ticks: u16) -> u16 {
    let ticks = bit_ticks as u32;
    let divisor = (ticks + 4) / 8;
    divisor.saturating_sub(1) as u16
}

/// Baud rate implied by a measured bit time
pub fn baud_from_bit_ticks(cpu_hz: u32, bit_ticks: u16) -> u32 {
    if bit_ticks == 0 {
        return 0;
    }
    cpu_hz / bit_ticks as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CPU_FREQ_HZ;

    #[test]
    fn ubrr_for_common_rates_at_16mhz() {
        // 16 MHz / 115200 = 138.9 clocks per bit -> UBRR 16 with U2X
        assert_eq!(ubrr_double_speed(139), 16);
        // 16 MHz / 9600 = 1666.7 clocks per bit -> UBRR 207 with U2X
        assert_eq!(ubrr_double_speed(1667), 207);
    }

    #[test]
    fn tiny_measurement_does_not_underflow() {
        assert_eq!(ubrr_double_speed(0), 0);
        assert_eq!(ubrr_double_speed(3), 0);
    }

    #[test]
    fn baud_estimate() {
        assert_eq!(baud_from_bit_ticks(CPU_FREQ_HZ, 139), 115_107);
        assert_eq!(baud_from_bit_ticks(CPU_FREQ_HZ, 0), 0);
    }
}
