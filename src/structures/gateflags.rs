//! Type and attribute byte of an interrupt gate descriptor.
//!
//! See Intel 3a, Section 6.11 "IDT Descriptors".
//! Layout: `[P:1][DPL:2][0:1][Type:4]`.

use bitflags::bitflags;

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct GateFlags: u8 {
		/// Set if the gate is valid. A clear bit raises #NP when the vector fires.
		const PRESENT = 1 << 7;
		/// Lowest privilege level allowed to reach the gate with `int n`.
		const RING_3 = 0b11 << 5;
		/// 32-bit interrupt gate: IF is cleared on entry.
		const INTERRUPT_GATE_32 = 0x0e;

		/// Present ring-0 32-bit interrupt gate (`0x8e`).
		const KERNEL_INTERRUPT = Self::PRESENT.bits() | Self::INTERRUPT_GATE_32.bits();
	}
}

/// Code segment selector of the flat kernel code segment set up at boot.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

#[cfg(test)]
mod test {
	use super::GateFlags;

	#[test]
	fn kernel_interrupt_gate_byte() {
		assert_eq!(GateFlags::KERNEL_INTERRUPT.bits(), 0x8e);
		assert!(GateFlags::KERNEL_INTERRUPT.contains(GateFlags::PRESENT));
		assert_eq!((GateFlags::KERNEL_INTERRUPT | GateFlags::RING_3).bits(), 0xee);
	}
}
