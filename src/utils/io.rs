//! Port-mapped I/O.
//!
//! Every driver that talks to a device register goes through [`PortIo`], so the
//! byte sequences written to the interrupt controllers and the CRT controller
//! can be replayed against a recording implementation in tests.

use core::arch::asm;

/// Read a byte from a port.
pub unsafe fn inb(port: u16) -> u8 {
	let value: u8;
	asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack));
	value
}

/// Write a byte to a port.
pub unsafe fn outb(port: u16, value: u8) {
	asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack));
}

/// Byte-wide access to the I/O port space.
pub trait PortIo {
	/// # Safety
	///
	/// Reading a device port can have side effects on the device.
	unsafe fn read_byte(&mut self, port: u16) -> u8;

	/// # Safety
	///
	/// Writing a device port reprograms hardware.
	unsafe fn write_byte(&mut self, port: u16, value: u8);
}

/// The machine's real I/O ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ports;

impl PortIo for Ports {
	unsafe fn read_byte(&mut self, port: u16) -> u8 {
		inb(port)
	}

	unsafe fn write_byte(&mut self, port: u16, value: u8) {
		outb(port, value);
	}
}

#[cfg(test)]
pub mod test {
	use super::PortIo;
	use std::collections::VecDeque;
	use std::vec::Vec;

	/// Records every write and answers reads from a scripted queue (0 once drained).
	#[derive(Debug, Default)]
	pub struct RecordingPorts {
		pub writes: Vec<(u16, u8)>,
		pub reads: VecDeque<u8>,
	}

	impl RecordingPorts {
		/// Writes excluding the POST diagnostic port used as an I/O delay.
		pub fn device_writes(&self) -> Vec<(u16, u8)> {
			self.writes.iter().copied().filter(|&(port, _)| port != 0x80).collect()
		}
	}

	impl PortIo for RecordingPorts {
		unsafe fn read_byte(&mut self, _port: u16) -> u8 {
			self.reads.pop_front().unwrap_or(0)
		}

		unsafe fn write_byte(&mut self, port: u16, value: u8) {
			self.writes.push((port, value));
		}
	}
}
