//! Boot sequence: brings the interrupt core up in dependency order and hands
//! the machine to the shell.

use crate::exceptions::interrupts::{self, without_interrupts};
use crate::exceptions::keyboard;
use crate::structures::idt;
use crate::utils::debug::{init_serial_port, LogLevel};
use crate::vga::video_graphics_array::{self, ColorCode, VGA_COLUMNS, WRITER};

/// Busy-wait iterations the boot screen stays up before the shell starts.
const SPLASH_SPINS: usize = 50_000_000;

extern "C" {
	/// Entry point of the shell, linked in from outside this crate.
	fn shell_main() -> !;
}

/// Remaps the PIC, loads the IDT, registers the keyboard, then enables
/// interrupts. The display must already be initialized.
pub fn init() -> Result<(), &'static str> {
	interrupts::disable();

	boot_step("Remapping PIC", || {
		interrupts::init();
		Ok(())
	})?;
	boot_step("Loading IDT", || {
		idt::init();
		Ok(())
	})?;
	boot_step("Initializing keyboard", keyboard::init)?;

	interrupts::enable();
	log!(LogLevel::Info, "Interrupts enabled");
	Ok(())
}

fn set_color(foreground: ColorCode) {
	without_interrupts(|| WRITER.lock().set_color(foreground, ColorCode::Black));
}

fn boot_step<F>(label: &str, step: F) -> Result<(), &'static str>
where
	F: FnOnce() -> Result<(), &'static str>,
{
	step()?;
	ok_line(label);
	Ok(())
}

fn ok_line(label: &str) {
	set_color(ColorCode::Green);
	print!("[OK] ");
	set_color(ColorCode::White);
	println!("{}", label);
}

fn print_banner() {
	set_color(ColorCode::LightCyan);
	print!("{:=<1$}", "", VGA_COLUMNS);
	set_color(ColorCode::LightRed);
	print!("{:^1$}", "KFS CORE", VGA_COLUMNS);
	set_color(ColorCode::LightCyan);
	print!("{:=<1$}", "", VGA_COLUMNS);
	set_color(ColorCode::White);
	println!();
	ok_line("Protected mode enabled");
	ok_line("VGA text mode initialized");
}

/// Called by the boot stub once protected mode is set up.
#[no_mangle]
pub extern "C" fn kernel_main() -> ! {
	init_serial_port();
	video_graphics_array::init();
	print_banner();

	if let Err(error) = init() {
		panic!("boot failed: {}", error);
	}

	println!();
	set_color(ColorCode::LightGreen);
	println!(">>> BOOT SUCCESSFUL <<<");
	set_color(ColorCode::White);

	for _ in 0..SPLASH_SPINS {
		core::hint::spin_loop();
	}
	without_interrupts(|| WRITER.lock().clear_screen());

	unsafe { shell_main() }
}
