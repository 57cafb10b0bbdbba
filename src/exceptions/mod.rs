/// Keyboard driver
pub mod keyboard;

/// Interrupts and exceptions
pub mod interrupts;

/// Programmable Interrupt Controller (PIC)
pub mod pic8259;

/// Interrupt entry stubs
#[cfg(target_arch = "x86")]
pub mod trampolines;

/// Panic reporting
pub mod panic;
