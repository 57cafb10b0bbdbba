#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

#[macro_use]
pub mod macros;

/// Boot sequence and hand-off to the shell
#[cfg(all(not(test), target_arch = "x86"))]
pub mod boot;

/// Surface exposed to the shell
pub mod console;

/// PIC, interrupt dispatch and the keyboard driver
pub mod exceptions;

/// x86 descriptor tables
pub mod structures;

/// Port I/O, serial logging and processor primitives
pub mod utils;

/// VGA text mode driver
pub mod vga;

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
	exceptions::panic::handle_panic(info)
}
