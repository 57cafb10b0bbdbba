//! Per-vector interrupt entry stubs.
//!
//! The CPU pushes `eflags`, `cs`, `eip` (and an error code for some
//! exceptions) before jumping through the IDT. Each stub evens out the frame
//! by pushing a zero error code when the CPU did not, pushes its vector
//! number and jumps to the common stub, which saves the remaining registers
//! as a [`Registers`](super::interrupts::Registers) snapshot and calls
//! [`interrupt_dispatch`].

use crate::exceptions::interrupts::interrupt_dispatch;
use core::arch::naked_asm;

/// Flat kernel data segment set up at boot.
const KERNEL_DATA_SELECTOR: u16 = 0x10;

pub type Trampoline = unsafe extern "C" fn();

macro_rules! trampoline {
	($name:ident, $vector:literal) => {
		#[unsafe(naked)]
		unsafe extern "C" fn $name() {
			naked_asm!(
				"push 0",
				"push {vector}",
				"jmp {common}",
				vector = const $vector,
				common = sym interrupt_common,
			);
		}
	};
	($name:ident, $vector:literal, error_code) => {
		#[unsafe(naked)]
		unsafe extern "C" fn $name() {
			naked_asm!(
				"push {vector}",
				"jmp {common}",
				vector = const $vector,
				common = sym interrupt_common,
			);
		}
	};
}

#[unsafe(naked)]
unsafe extern "C" fn interrupt_common() {
	naked_asm!(
		// Save general-purpose and segment registers
		"pushad",
		"push ds",
		"push es",
		"push fs",
		"push gs",

		// Kernel data segments, forward string operations
		"mov ax, {data_selector}",
		"mov ds, ax",
		"mov es, ax",
		"mov fs, ax",
		"mov gs, ax",
		"cld",

		// interrupt_dispatch(&mut Registers)
		"push esp",
		"call {dispatch}",
		"add esp, 4",

		"pop gs",
		"pop fs",
		"pop es",
		"pop ds",
		"popad",

		// Drop vector number and error code
		"add esp, 8",
		"iretd",
		data_selector = const KERNEL_DATA_SELECTOR,
		dispatch = sym interrupt_dispatch,
	);
}

trampoline!(fault_0, 0);
trampoline!(fault_1, 1);
trampoline!(fault_2, 2);
trampoline!(fault_3, 3);
trampoline!(fault_4, 4);
trampoline!(fault_5, 5);
trampoline!(fault_6, 6);
trampoline!(fault_7, 7);
trampoline!(fault_8, 8, error_code);
trampoline!(fault_9, 9);
trampoline!(fault_10, 10, error_code);
trampoline!(fault_11, 11, error_code);
trampoline!(fault_12, 12, error_code);
trampoline!(fault_13, 13, error_code);
trampoline!(fault_14, 14, error_code);
trampoline!(fault_15, 15);
trampoline!(fault_16, 16);
trampoline!(fault_17, 17, error_code);
trampoline!(fault_18, 18);
trampoline!(fault_19, 19);
trampoline!(fault_20, 20);
trampoline!(fault_21, 21, error_code);
trampoline!(fault_22, 22);
trampoline!(fault_23, 23);
trampoline!(fault_24, 24);
trampoline!(fault_25, 25);
trampoline!(fault_26, 26);
trampoline!(fault_27, 27);
trampoline!(fault_28, 28);
trampoline!(fault_29, 29, error_code);
trampoline!(fault_30, 30, error_code);
trampoline!(fault_31, 31);

trampoline!(irq_0, 32);
trampoline!(irq_1, 33);
trampoline!(irq_2, 34);
trampoline!(irq_3, 35);
trampoline!(irq_4, 36);
trampoline!(irq_5, 37);
trampoline!(irq_6, 38);
trampoline!(irq_7, 39);
trampoline!(irq_8, 40);
trampoline!(irq_9, 41);
trampoline!(irq_10, 42);
trampoline!(irq_11, 43);
trampoline!(irq_12, 44);
trampoline!(irq_13, 45);
trampoline!(irq_14, 46);
trampoline!(irq_15, 47);

/// Entry points for vectors 0-31.
pub static FAULT_TRAMPOLINES: [Trampoline; 32] = [
	fault_0, fault_1, fault_2, fault_3, fault_4, fault_5, fault_6, fault_7,
	fault_8, fault_9, fault_10, fault_11, fault_12, fault_13, fault_14, fault_15,
	fault_16, fault_17, fault_18, fault_19, fault_20, fault_21, fault_22, fault_23,
	fault_24, fault_25, fault_26, fault_27, fault_28, fault_29, fault_30, fault_31,
];

/// Entry points for PIC lines 0-15, i.e. vectors 32-47 after remapping.
pub static IRQ_TRAMPOLINES: [Trampoline; 16] = [
	irq_0, irq_1, irq_2, irq_3, irq_4, irq_5, irq_6, irq_7,
	irq_8, irq_9, irq_10, irq_11, irq_12, irq_13, irq_14, irq_15,
];
