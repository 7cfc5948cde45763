#![no_std]
#![no_main]

use panic_halt as _;
use avr_device::atmega128a::Peripherals;

use bootrec_firmware::bootloader::{entry, BootDecision, Bootloader};
use bootrec_firmware::config::DeviceConfig;
use bootrec_firmware::hal::{AppJumper, BootButton, NoinitSignature, SoftCrc, SpmFlash, Uart, Watchdog};
use bootrec_firmware::protocol::SerialTransport;

#[avr_device::entry]
fn main() -> ! {
    let config = DeviceConfig::atmega128();
    let mut jumper = AppJumper;

    let dp = match Peripherals::take() {
        Some(dp) => dp,
        None => entry::launch(&config, &mut jumper),
    };

    let mut signature = unsafe { NoinitSignature::steal() };
    let flash = SpmFlash::new();
    let pin = BootButton::new(dp.PORTB, config.boot_pin);

    let reason = match entry::decide(&config, &signature, &flash, &pin) {
        BootDecision::RunApplication => {
            pin.release();
            entry::launch(&config, &mut jumper)
        }
        BootDecision::StayInBootloader(reason) => reason,
    };
    pin.release();

    let mut watchdog = Watchdog::new(dp.WDT);
    entry::begin_session(reason, &mut watchdog);

    // First byte from the host is the autobaud training byte
    let uart = Uart::autobaud(dp.USART0, &dp.PORTE, &dp.TC1);
    let mut bootloader = Bootloader::new(SerialTransport::new(uart), flash, SoftCrc::new(), &config);
    bootloader.run();

    let (mut transport, _) = bootloader.release();
    entry::end_session(&mut signature, &mut transport);
    transport.release().release();
    entry::launch(&config, &mut jumper)
}
