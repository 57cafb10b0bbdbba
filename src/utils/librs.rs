//! # Processor Primitives
//!
//! Thin wrappers around the instructions the drivers need to wait for or stop
//! on hardware. Host unit tests cannot execute privileged instructions, so the
//! test build substitutes a spin hint and counts the waits per thread.

#[cfg(not(test))]
use core::arch::asm;

/// Halts the CPU until the next external interrupt.
#[cfg(not(test))]
#[inline]
pub fn hlt() {
	unsafe {
		asm!("hlt", options(nomem, nostack, preserves_flags));
	}
}

#[cfg(test)]
#[inline]
pub fn hlt() {
	core::hint::spin_loop();
}

/// Enables interrupts and halts in one step.
///
/// `sti` only takes effect after the following instruction, so no interrupt
/// can be taken between the two: a wake-up that was pending when the caller
/// last checked its condition ends this `hlt` instead of being missed.
#[cfg(not(test))]
#[inline]
pub fn enable_and_hlt() {
	unsafe {
		asm!("sti", "hlt", options(nomem, nostack));
	}
}

#[cfg(test)]
std::thread_local! {
	static HALTS: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
	static UNMASKED_HALTS: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

#[cfg(test)]
pub fn enable_and_hlt() {
	if crate::exceptions::interrupts::are_enabled() {
		UNMASKED_HALTS.with(|count| count.set(count.get() + 1));
	}
	HALTS.with(|count| count.set(count.get() + 1));
	crate::exceptions::interrupts::enable();
	core::hint::spin_loop();
}

/// Waits entered on the calling test thread.
#[cfg(test)]
pub fn halts_on_this_thread() -> usize {
	HALTS.with(|count| count.get())
}

/// Waits entered while interrupts were already enabled, i.e. with a window
/// in which a wake-up could be lost.
#[cfg(test)]
pub fn unmasked_halts_on_this_thread() -> usize {
	UNMASKED_HALTS.with(|count| count.get())
}

/// Masks interrupts and halts forever.
pub fn halt_loop() -> ! {
	crate::exceptions::interrupts::disable();
	loop {
		hlt();
	}
}
