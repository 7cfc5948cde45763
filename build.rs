use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Host builds (unit tests, simulation) need no link setup
    let target = env::var("TARGET").unwrap_or_default();
    if !target.contains("avr") {
        return;
    }

    // Configure for ATmega128
    println!("cargo:rustc-link-arg=-mmcu=atmega128");
    // SPM only executes from the boot section (BOOTSZ = 4096 words)
    println!("cargo:rustc-link-arg=-Wl,--section-start=.text=0x1E000");

    println!("cargo:warning=Building boot-record loader for ATmega128 at 16MHz");
}
