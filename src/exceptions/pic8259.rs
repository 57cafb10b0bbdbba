//! # Programmable Interrupt Controller (PIC)
//!
//! Drives the two cascaded 8259 PICs. After reset they deliver IRQ 0-7 on
//! vectors 8-15, which collide with CPU exceptions, so the kernel remaps the
//! primary controller to vectors 32-39 and the secondary one to 40-47.
//!
//! ## Overview
//!
//! The secondary PIC is wired into input 2 of the primary. Initialization is a
//! fixed four-word sequence sent to both chips in lockstep:
//!
//! 1. ICW1 on the command port: start initialization, ICW4 will follow.
//! 2. ICW2 on the data port: vector base.
//! 3. ICW3 on the data port: cascade wiring (bit mask on the primary, line
//!    number on the secondary).
//! 4. ICW4 on the data port: 8086 mode.
//!
//! The data port then holds the interrupt mask. Only the keyboard line is
//! left unmasked.
//!
//! Acknowledgment of a line routed through the secondary must reach the
//! secondary first: the primary keeps the cascade input busy until then.

use crate::utils::io::PortIo;

const CMD_INIT: u8 = 0x11;
const CMD_END_OF_INTERRUPT: u8 = 0x20;
const MODE_8086: u8 = 0x01;

/// ICW3 for the primary: a secondary hangs off input 2.
const CASCADE_PRIMARY: u8 = 1 << 2;
/// ICW3 for the secondary: its cascade identity is 2.
const CASCADE_SECONDARY: u8 = 0x02;

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xa0;
const PIC2_DATA: u16 = 0xa1;

const WAIT_PORT: u16 = 0x80;

/// Primary mask with every line but IRQ 1 (keyboard) masked.
pub const KEYBOARD_ONLY_PRIMARY_MASK: u8 = !(1 << 1);
/// Secondary mask with every line masked.
pub const ALL_MASKED: u8 = 0xff;

struct Pic {
	offset: u8,
	command: u16,
	data: u16,
}

impl Pic {
	fn handles_interrupt(&self, interrupt_id: u8) -> bool {
		self.offset <= interrupt_id && interrupt_id < self.offset.saturating_add(8)
	}
}

/// Represents a pair of chained PICs.
pub struct ChainedPics<P: PortIo> {
	pics: [Pic; 2],
	ports: P,
}

impl<P: PortIo> ChainedPics<P> {
	/// Creates a new pair of chained PICs. Nothing is written until [`ChainedPics::remap`].
	pub const fn new(ports: P, offset1: u8, offset2: u8) -> ChainedPics<P> {
		ChainedPics {
			pics: [
				Pic {
					offset: offset1,
					command: PIC1_COMMAND,
					data: PIC1_DATA,
				},
				Pic {
					offset: offset2,
					command: PIC2_COMMAND,
					data: PIC2_DATA,
				},
			],
			ports,
		}
	}

	/// Reprograms both controllers to deliver on the given vector bases and
	/// masks every line except the keyboard.
	///
	/// # Safety
	///
	/// Must run once, with interrupts disabled, before any IRQ gate is live.
	pub unsafe fn remap(&mut self, base_vector_master: u8, base_vector_slave: u8) {
		self.pics[0].offset = base_vector_master;
		self.pics[1].offset = base_vector_slave;

		self.write_both(Register::Command, CMD_INIT, CMD_INIT);
		self.write_both(Register::Data, base_vector_master, base_vector_slave);
		self.write_both(Register::Data, CASCADE_PRIMARY, CASCADE_SECONDARY);
		self.write_both(Register::Data, MODE_8086, MODE_8086);

		self.write_masks(KEYBOARD_ONLY_PRIMARY_MASK, ALL_MASKED);
	}

	unsafe fn write_both(&mut self, register: Register, primary: u8, secondary: u8) {
		let (port1, port2) = match register {
			Register::Command => (self.pics[0].command, self.pics[1].command),
			Register::Data => (self.pics[0].data, self.pics[1].data),
		};
		self.ports.write_byte(port1, primary);
		self.io_wait();
		self.ports.write_byte(port2, secondary);
		self.io_wait();
	}

	/// Older PICs need a moment between initialization words.
	unsafe fn io_wait(&mut self) {
		self.ports.write_byte(WAIT_PORT, 0);
	}

	pub unsafe fn read_masks(&mut self) -> [u8; 2] {
		[
			self.ports.read_byte(self.pics[0].data),
			self.ports.read_byte(self.pics[1].data),
		]
	}

	pub unsafe fn write_masks(&mut self, mask1: u8, mask2: u8) {
		self.ports.write_byte(self.pics[0].data, mask1);
		self.ports.write_byte(self.pics[1].data, mask2);
	}

	pub fn handles_interrupt(&self, interrupt_id: u8) -> bool {
		self.pics.iter().any(|p| p.handles_interrupt(interrupt_id))
	}

	/// Acknowledges `interrupt_id`: secondary first when it came through the
	/// cascade, then always the primary.
	pub unsafe fn notify_end_of_interrupt(&mut self, interrupt_id: u8) {
		if self.handles_interrupt(interrupt_id) {
			if self.pics[1].handles_interrupt(interrupt_id) {
				self.ports.write_byte(self.pics[1].command, CMD_END_OF_INTERRUPT);
			}
			self.ports.write_byte(self.pics[0].command, CMD_END_OF_INTERRUPT);
		}
	}

	#[cfg(test)]
	pub fn ports(&self) -> &P {
		&self.ports
	}

	#[cfg(test)]
	pub fn ports_mut(&mut self) -> &mut P {
		&mut self.ports
	}
}

#[derive(Clone, Copy)]
enum Register {
	Command,
	Data,
}

#[cfg(test)]
mod test {
	use super::ChainedPics;
	use crate::utils::io::test::RecordingPorts;

	fn remapped() -> ChainedPics<RecordingPorts> {
		let mut pics = ChainedPics::new(RecordingPorts::default(), 0x08, 0x70);
		unsafe {
			pics.remap(0x20, 0x28);
		}
		pics
	}

	#[test]
	fn remap_sends_initialization_words_in_order() {
		let pics = remapped();

		assert_eq!(
			pics.ports().device_writes(),
			[
				(0x20, 0x11),
				(0xa0, 0x11),
				(0x21, 0x20),
				(0xa1, 0x28),
				(0x21, 0x04),
				(0xa1, 0x02),
				(0x21, 0x01),
				(0xa1, 0x01),
				(0x21, 0xfd),
				(0xa1, 0xff),
			]
		);
	}

	#[test]
	fn remap_moves_the_handled_vector_range() {
		let pics = remapped();
		assert!(!pics.handles_interrupt(0x08));
		assert!(pics.handles_interrupt(32));
		assert!(pics.handles_interrupt(47));
		assert!(!pics.handles_interrupt(48));
	}

	#[test]
	fn primary_line_acknowledges_primary_only() {
		let mut pics = remapped();
		pics.ports_mut().writes.clear();

		unsafe {
			pics.notify_end_of_interrupt(33);
		}

		assert_eq!(pics.ports().writes, [(0x20, 0x20)]);
	}

	#[test]
	fn secondary_line_acknowledges_secondary_then_primary() {
		let mut pics = remapped();
		pics.ports_mut().writes.clear();

		unsafe {
			pics.notify_end_of_interrupt(44);
		}

		assert_eq!(pics.ports().writes, [(0xa0, 0x20), (0x20, 0x20)]);
	}

	#[test]
	fn foreign_vector_is_not_acknowledged() {
		let mut pics = remapped();
		pics.ports_mut().writes.clear();

		unsafe {
			pics.notify_end_of_interrupt(0x80);
		}

		assert!(pics.ports().writes.is_empty());
	}

	#[test]
	fn masks_are_read_back_from_data_ports() {
		let mut pics = remapped();
		pics.ports_mut().reads.extend([0xfd, 0xff]);

		assert_eq!(unsafe { pics.read_masks() }, [0xfd, 0xff]);
	}
}
