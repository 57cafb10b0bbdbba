//! Kernel panic path.
//!
//! A Rust panic is handled like a CPU fault: report it on serial and on
//! screen in the alert color, then halt with interrupts masked.

use crate::exceptions::interrupts::{self, seize};
use crate::utils::debug::{LogLevel, DEBUG};
use crate::utils::io::PortIo;
use crate::utils::librs::halt_loop;
use crate::vga::video_graphics_array::{ColorCode, Writer, WRITER};
use core::fmt::{self, Display, Write};

/// Draws `KERNEL PANIC: <info>` in the alert color.
pub fn render_panic<P: PortIo, D: Display>(writer: &mut Writer<P>, info: &D) -> fmt::Result {
	writer.set_color(ColorCode::LightRed, ColorCode::Black);
	writeln!(writer, "KERNEL PANIC: {}", info)?;
	writer.set_color(ColorCode::White, ColorCode::Black);
	Ok(())
}

pub fn handle_panic<D: Display>(info: &D) -> ! {
	interrupts::disable();
	{
		let mut debug = seize(&DEBUG);
		let _ = writeln!(debug, "{}: {}", LogLevel::Panic.as_str(), info);
	}
	{
		let mut writer = seize(&*WRITER);
		let _ = render_panic(&mut *writer, info);
	}
	halt_loop()
}
