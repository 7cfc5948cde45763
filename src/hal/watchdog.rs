use avr_device::atmega128a::WDT;

use super::system::WatchdogControl;

// WDTCR
const WDCE: u8 = 1 << 4;
const WDE: u8 = 1 << 3;

pub struct Watchdog {
    wdt: WDT,
}

impl Watchdog {
    #[inline]
    pub fn new(wdt: WDT) -> Self {
        Self { wdt }
    }

    /// Shortest timeout (16 ms), used to force a reset
    #[inline]
    pub fn start_shortest(&mut self) {
        self.wdt.wdtcr.write(|w| unsafe { w.bits(WDCE | WDE) });
        self.wdt.wdtcr.write(|w| unsafe { w.bits(WDE) });
    }
}

impl WatchdogControl for Watchdog {
    #[inline]
    fn disable(&mut self) {
        avr_device::asm::wdr();
        // Timed sequence: WDCE|WDE then clear within four cycles
        avr_device::interrupt::free(|_| {
            self.wdt.wdtcr.write(|w| unsafe { w.bits(WDCE | WDE) });
            self.wdt.wdtcr.write(|w| unsafe { w.bits(0x00) });
        });
    }
}
