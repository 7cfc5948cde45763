use std::panic::{self, AssertUnwindSafe};

use bootrec_firmware::bootloader::entry::{begin_session, decide, end_session, request_bootloader};
use bootrec_firmware::bootloader::{BootDecision, BootReason, Bootloader};
use bootrec_firmware::config::{Bank, DeviceConfig, BOOT_SIGNATURE};
use bootrec_firmware::hal::crc::SoftCrc;
use bootrec_firmware::hal::sim::{SimFlash, SimSignature, SimWatchdog};
use bootrec_firmware::hal::system::SoftwareReset;
use bootrec_firmware::protocol::{SerialTransport, FRAME_START};
use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction as PinTransaction};
use embedded_hal_mock::serial::{Mock as SerialMock, Transaction};

fn config() -> DeviceConfig {
    let mut config = DeviceConfig::atmega128();
    config.pin_low_cycles = 4;
    config
}

fn application(config: &DeviceConfig) -> SimFlash<0x1_0000> {
    let mut flash = SimFlash::new(&config.flash);
    // jmp 0x0046
    flash.load(Bank::Primary, 0x0000, &[0x0C, 0x94, 0x23, 0x00]);
    flash
}

#[test]
fn requested_session_round_trip() {
    let config = config();
    let mut signature = SimSignature::new(BOOT_SIGNATURE);
    let mut watchdog = SimWatchdog::default();
    let mut pin = PinMock::new(&[]);
    let flash = application(&config);

    let decision = decide(&config, &signature, &flash, &pin);
    let BootDecision::StayInBootloader(reason) = decision else {
        panic!("signature must keep the loader resident");
    };
    assert_eq!(reason, BootReason::Signature);
    begin_session(reason, &mut watchdog);
    assert!(watchdog.disabled);

    let expectations = [
        Transaction::read_many([FRAME_START, 0x01, 0x36]),
        Transaction::write(b'@'),
        Transaction::flush(),
    ];
    let mut serial = SerialMock::new(&expectations);
    let mut bootloader = Bootloader::new(SerialTransport::new(serial.clone()), flash, SoftCrc::new(), &config);
    bootloader.run();

    let (mut transport, flash) = bootloader.release();
    end_session(&mut signature, &mut transport);
    serial.done();
    pin.done();

    // Next reset goes to the application
    let mut pin = PinMock::new(&[PinTransaction::get(State::High)]);
    assert_eq!(decide(&config, &signature, flash.registers(), &pin), BootDecision::RunApplication);
    pin.done();
}

#[test]
fn button_held_through_reset() {
    let config = config();
    let expectations: Vec<_> = (0..4).map(|_| PinTransaction::get(State::Low)).collect();
    let mut pin = PinMock::new(&expectations);

    let decision = decide(&config, &SimSignature::default(), &application(&config), &pin);
    assert_eq!(decision, BootDecision::StayInBootloader(BootReason::BootPin));
    pin.done();
}

#[test]
fn bounce_on_last_sample_runs_application() {
    let config = config();
    let expectations = [
        PinTransaction::get(State::Low),
        PinTransaction::get(State::Low),
        PinTransaction::get(State::Low),
        PinTransaction::get(State::High),
    ];
    let mut pin = PinMock::new(&expectations);

    let decision = decide(&config, &SimSignature::default(), &application(&config), &pin);
    assert_eq!(decision, BootDecision::RunApplication);
    pin.done();
}

/// Reset line that unwinds instead of restarting the core
struct UnwindingReset;

const RESET_FIRED: &str = "software reset";

impl SoftwareReset for UnwindingReset {
    fn reset(&mut self) -> ! {
        panic::panic_any(RESET_FIRED)
    }
}

#[test]
fn application_request_lands_in_loader() {
    let config = config();
    let mut signature = SimSignature::default();
    let mut reset = UnwindingReset;

    let fired = panic::catch_unwind(AssertUnwindSafe(|| {
        request_bootloader(&mut signature, &mut reset);
    }));
    let payload = fired.expect_err("request must end in a reset");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&RESET_FIRED));
    assert_eq!(signature.value, BOOT_SIGNATURE);

    // Programmed application and a released button: only the request counts
    let mut pin = PinMock::new(&[]);
    let decision = decide(&config, &signature, &application(&config), &pin);
    assert_eq!(decision, BootDecision::StayInBootloader(BootReason::Signature));
    pin.done();
}
