//! # Macros and Printing Utilities
//!
//! `print!`/`println!` write formatted text to the VGA text buffer and
//! `log!` writes a level-prefixed line to COM1.

use crate::exceptions::interrupts::without_interrupts;
use crate::vga::video_graphics_array::WRITER;
use core::fmt;

/// Macro for printing formatted text to the VGA buffer.
#[macro_export]
macro_rules! print {
	($($arg:tt)*) => ($crate::macros::print(format_args!($($arg)*)));
}

/// Macro for printing formatted text with a newline to the VGA buffer.
#[macro_export]
macro_rules! println {
	() => ($crate::print!("\n"));
	($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! log {
	($level:expr, $($arg:tt)*) => {
		$crate::macros::print_serial(format_args!(
			"{}: {}\n",
			$level.as_str(),
			format_args!($($arg)*)
		))
	};
}

/// Prints formatted text to the VGA buffer.
///
/// Interrupts are masked while the writer is locked so the fault path is
/// the only thing that can ever find it held.
pub fn print(args: fmt::Arguments) {
	use core::fmt::Write;
	without_interrupts(|| {
		let _ = WRITER.lock().write_fmt(args);
	});
}

/// Prints formatted text to the serial port.
#[cfg(not(test))]
pub fn print_serial(args: fmt::Arguments) {
	use crate::utils::debug::DEBUG;
	use core::fmt::Write;
	without_interrupts(|| {
		let _ = DEBUG.lock().write_fmt(args);
	});
}

/// Host tests have no UART; diagnostics are dropped.
#[cfg(test)]
pub fn print_serial(args: fmt::Arguments) {
	let _ = args;
}
