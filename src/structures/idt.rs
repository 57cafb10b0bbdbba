//! # Interrupt Descriptor Table (IDT)
//!
//! The IDT tells the CPU where to transfer control for each of the 256
//! interrupt and exception vectors. Every entry starts zeroed, i.e. not
//! present, so a vector nobody installed raises a visible fault instead of
//! jumping to an arbitrary address.
//!
//! ## Overview
//!
//! Vectors 0-31 are CPU exceptions and are bound to the fault trampolines.
//! Vectors 32-47 are the sixteen PIC lines after remapping and are bound to
//! the IRQ trampolines. The table only becomes live once [`Idt::load`] hands
//! its address and limit to the CPU with `lidt`.

use crate::structures::gateflags::GateFlags;
use core::arch::asm;
use core::mem::size_of;
use spin::Mutex;

pub const IDT_ENTRIES: usize = 256;

/// Number of CPU exception vectors at the bottom of the table.
pub const EXCEPTION_VECTORS: u8 = 32;

/// The kernel's interrupt descriptor table.
///
/// Filled once during boot with interrupts disabled.
pub static IDT: Mutex<Idt> = Mutex::new(Idt::new());

/// Represents an Interrupt Descriptor Table (IDT) entry.
///
/// Raw layout: handler bits 0-15, selector, a zero byte, the flags byte,
/// handler bits 16-31.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct IdtDescriptor {
	offset_low: u16,
	selector: u16,
	reserved: u8,
	type_attributes: u8,
	offset_high: u16,
}

const _: () = assert!(size_of::<IdtDescriptor>() == 8);

impl IdtDescriptor {
	/// A not-present entry.
	pub const fn missing() -> IdtDescriptor {
		IdtDescriptor {
			offset_low: 0,
			selector: 0,
			reserved: 0,
			type_attributes: 0,
			offset_high: 0,
		}
	}

	pub const fn new(handler: u32, selector: u16, flags: GateFlags) -> IdtDescriptor {
		IdtDescriptor {
			offset_low: (handler & 0xffff) as u16,
			selector,
			reserved: 0,
			type_attributes: flags.bits(),
			offset_high: ((handler >> 16) & 0xffff) as u16,
		}
	}

	pub fn handler(&self) -> u32 {
		u32::from(self.offset_low) | (u32::from(self.offset_high) << 16)
	}

	pub fn selector(&self) -> u16 {
		self.selector
	}

	pub fn flags(&self) -> GateFlags {
		GateFlags::from_bits_retain(self.type_attributes)
	}

	pub fn is_present(&self) -> bool {
		self.flags().contains(GateFlags::PRESENT)
	}

	/// The entry exactly as the CPU reads it from memory.
	pub fn to_bytes(&self) -> [u8; 8] {
		let low = self.offset_low.to_le_bytes();
		let selector = self.selector.to_le_bytes();
		let high = self.offset_high.to_le_bytes();
		[
			low[0],
			low[1],
			selector[0],
			selector[1],
			self.reserved,
			self.type_attributes,
			high[0],
			high[1],
		]
	}
}

/// Value loaded into IDTR by `lidt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct IdtRegister {
	pub limit: u16,
	pub base: u32,
}

#[repr(C, align(8))]
pub struct Idt {
	entries: [IdtDescriptor; IDT_ENTRIES],
}

impl Idt {
	pub const fn new() -> Idt {
		Idt {
			entries: [IdtDescriptor::missing(); IDT_ENTRIES],
		}
	}

	/// Writes one gate. Takes effect on the CPU only after [`Idt::load`].
	pub fn install(&mut self, number: u8, handler: u32, selector: u16, flags: GateFlags) {
		self.entries[usize::from(number)] = IdtDescriptor::new(handler, selector, flags);
	}

	pub fn entry(&self, number: u8) -> &IdtDescriptor {
		&self.entries[usize::from(number)]
	}

	pub fn register(&self) -> IdtRegister {
		IdtRegister {
			limit: (size_of::<[IdtDescriptor; IDT_ENTRIES]>() - 1) as u16,
			base: self.entries.as_ptr() as usize as u32,
		}
	}

	/// Points IDTR at this table.
	///
	/// # Safety
	///
	/// The table must stay at this address for as long as interrupts can
	/// fire, and every present entry must point at a valid trampoline.
	pub unsafe fn load(&self) {
		let idt_register = self.register();
		asm!("lidt [{}]", in(reg) &idt_register, options(readonly, nostack, preserves_flags));
	}
}

/// Binds the 32 fault vectors and the 16 remapped IRQ vectors, then loads the table.
///
/// Must run after the PICs were remapped and before interrupts are enabled.
#[cfg(target_arch = "x86")]
pub fn init() {
	use crate::exceptions::interrupts::PIC_1_OFFSET;
	use crate::exceptions::trampolines::{FAULT_TRAMPOLINES, IRQ_TRAMPOLINES};
	use crate::structures::gateflags::KERNEL_CODE_SELECTOR;
	use crate::utils::debug::LogLevel;

	let mut idt = IDT.lock();

	for (vector, trampoline) in FAULT_TRAMPOLINES.iter().enumerate() {
		idt.install(
			vector as u8,
			*trampoline as usize as u32,
			KERNEL_CODE_SELECTOR,
			GateFlags::KERNEL_INTERRUPT,
		);
	}
	for (line, trampoline) in IRQ_TRAMPOLINES.iter().enumerate() {
		idt.install(
			PIC_1_OFFSET + line as u8,
			*trampoline as usize as u32,
			KERNEL_CODE_SELECTOR,
			GateFlags::KERNEL_INTERRUPT,
		);
	}

	unsafe {
		idt.load();
	}

	let base = idt.register().base;
	log!(LogLevel::Info, "IDT successfully loaded at 0x{:08x}", base);
}

#[cfg(test)]
mod test {
	use super::{Idt, IdtDescriptor, EXCEPTION_VECTORS};
	use crate::structures::gateflags::{GateFlags, KERNEL_CODE_SELECTOR};

	#[test]
	fn new_table_has_no_present_entry() {
		let idt = Idt::new();
		for vector in 0..=255u8 {
			assert!(!idt.entry(vector).is_present());
			assert_eq!(idt.entry(vector).to_bytes(), [0; 8]);
		}
	}

	#[test]
	fn raw_layout_matches_gate_descriptor() {
		let entry = IdtDescriptor::new(0x1234_5678, KERNEL_CODE_SELECTOR, GateFlags::KERNEL_INTERRUPT);
		assert_eq!(entry.to_bytes(), [0x78, 0x56, 0x08, 0x00, 0x00, 0x8e, 0x34, 0x12]);
		assert_eq!(entry.handler(), 0x1234_5678);
		assert_eq!(entry.selector(), 0x08);
		assert!(entry.is_present());
	}

	#[test]
	fn install_touches_only_its_vector() {
		let mut idt = Idt::new();
		idt.install(33, 0xc010_0000, KERNEL_CODE_SELECTOR, GateFlags::KERNEL_INTERRUPT);

		assert_eq!(idt.entry(33).handler(), 0xc010_0000);
		assert_eq!(idt.entry(33).flags(), GateFlags::KERNEL_INTERRUPT);
		assert!(!idt.entry(32).is_present());
		assert!(!idt.entry(34).is_present());
	}

	#[test]
	fn reinstall_overwrites_entry() {
		let mut idt = Idt::new();
		idt.install(EXCEPTION_VECTORS, 0x1000, KERNEL_CODE_SELECTOR, GateFlags::KERNEL_INTERRUPT);
		idt.install(EXCEPTION_VECTORS, 0x2000, KERNEL_CODE_SELECTOR, GateFlags::KERNEL_INTERRUPT);
		assert_eq!(idt.entry(EXCEPTION_VECTORS).handler(), 0x2000);
	}

	#[test]
	fn register_limit_covers_256_entries() {
		let idt = Idt::new();
		let limit = idt.register().limit;
		assert_eq!(limit, 256 * 8 - 1);
	}
}
