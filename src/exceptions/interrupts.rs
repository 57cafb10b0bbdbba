//! # Interrupt Dispatch
//!
//! Every trampoline funnels into [`interrupt_dispatch`] with a pointer to the
//! register snapshot it built on the stack. Vectors below 32 are CPU faults:
//! they are reported on screen and the machine halts for good. Vectors 32-47
//! are PIC lines: the handler registered for the line runs, then the
//! controllers are acknowledged.
//!
//! The handler table is written only during driver initialization, with
//! interrupts disabled around the lock, so interrupt context never spins on
//! it.

use crate::exceptions::pic8259::ChainedPics;
use crate::structures::idt::EXCEPTION_VECTORS;
use crate::utils::debug::{LogLevel, DEBUG};
use crate::utils::io::{PortIo, Ports};
use crate::utils::librs::halt_loop;
use crate::vga::video_graphics_array::{ColorCode, Writer, WRITER};
use core::fmt::{self, Write};
use spin::{Mutex, MutexGuard};

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

/// Number of PIC lines.
pub const IRQ_LINES: usize = 16;

#[cfg(not(test))]
const EFLAGS_IF: usize = 1 << 9;

pub static PICS: Mutex<ChainedPics<Ports>> =
	Mutex::new(ChainedPics::new(Ports, PIC_1_OFFSET, PIC_2_OFFSET));

pub static ROUTER: Mutex<InterruptRouter> = Mutex::new(InterruptRouter::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
#[repr(u8)]
pub enum InterruptIndex {
	Timer = PIC_1_OFFSET,
	Keyboard,
	Cascade,
	Com2,
	Com1,
	Lpt2,
	Floppy,
	Lpt1,
	Rtc,
	Free1,
	Free2,
	Free3,
	Ps2Mouse,
	Coprocessor,
	PrimaryAtaHardDisk,
	SecondaryAtaHardDisk,
}

impl InterruptIndex {
	pub fn as_u8(self) -> u8 {
		self as u8
	}

	/// PIC line feeding this vector.
	pub fn line(self) -> u8 {
		self.as_u8() - PIC_1_OFFSET
	}
}

/// Registers saved by the trampolines, lowest address first.
///
/// `gs`..`ds` are pushed by the common stub, `edi`..`eax` by `pushad`,
/// `int_no` and `err_code` by the per-vector stub, and the rest by the CPU.
/// `useresp` and `ss` are only meaningful on a privilege change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Registers {
	pub gs: u32,
	pub fs: u32,
	pub es: u32,
	pub ds: u32,
	pub edi: u32,
	pub esi: u32,
	pub ebp: u32,
	pub esp: u32,
	pub ebx: u32,
	pub edx: u32,
	pub ecx: u32,
	pub eax: u32,
	pub int_no: u32,
	pub err_code: u32,
	pub eip: u32,
	pub cs: u32,
	pub eflags: u32,
	pub useresp: u32,
	pub ss: u32,
}

/// A device driver's interrupt service routine.
pub trait IrqHandler: Sync {
	fn handle(&self, registers: &mut Registers);
}

/// Per-line handler table: at most one handler per PIC line.
pub struct InterruptRouter {
	handlers: [Option<&'static dyn IrqHandler>; IRQ_LINES],
}

impl InterruptRouter {
	pub const fn new() -> InterruptRouter {
		InterruptRouter {
			handlers: [None; IRQ_LINES],
		}
	}

	/// Installs `handler` on `line`, replacing any previous one.
	pub fn register(&mut self, line: u8, handler: &'static dyn IrqHandler) -> Result<(), &'static str> {
		let slot = self.slot(line)?;
		if slot.replace(handler).is_some() {
			log!(LogLevel::Notice, "IRQ {} handler replaced", line);
		}
		Ok(())
	}

	pub fn unregister(&mut self, line: u8) -> Result<(), &'static str> {
		*self.slot(line)? = None;
		Ok(())
	}

	pub fn is_registered(&self, line: u8) -> bool {
		matches!(self.handlers.get(usize::from(line)), Some(Some(_)))
	}

	fn slot(&mut self, line: u8) -> Result<&mut Option<&'static dyn IrqHandler>, &'static str> {
		self.handlers
			.get_mut(usize::from(line))
			.ok_or("IRQ line out of range")
	}

	/// Runs the handler for `registers.int_no`, if any, then acknowledges the PICs.
	///
	/// Vectors outside the PIC range are ignored and not acknowledged.
	pub fn dispatch<P: PortIo>(&self, registers: &mut Registers, pics: &mut ChainedPics<P>) {
		let vector = registers.int_no;
		let Some(line) = irq_line(vector) else {
			log!(LogLevel::Warning, "Vector {} is not a device line", vector);
			return;
		};

		if let Some(handler) = self.handlers[usize::from(line)] {
			handler.handle(registers);
		}

		unsafe {
			pics.notify_end_of_interrupt(vector as u8);
		}
	}
}

/// PIC line for a remapped vector.
pub fn irq_line(vector: u32) -> Option<u8> {
	let first = u32::from(PIC_1_OFFSET);
	if (first..first + IRQ_LINES as u32).contains(&vector) {
		Some((vector - first) as u8)
	} else {
		None
	}
}

static EXCEPTION_MESSAGES: [&str; EXCEPTION_VECTORS as usize] = [
	"Division By Zero",
	"Debug",
	"Non Maskable Interrupt",
	"Breakpoint",
	"Into Detected Overflow",
	"Out of Bounds",
	"Invalid Opcode",
	"No Coprocessor",
	"Double Fault",
	"Coprocessor Segment Overrun",
	"Bad TSS",
	"Segment Not Present",
	"Stack Fault",
	"General Protection Fault",
	"Page Fault",
	"Unknown Interrupt",
	"Coprocessor Fault",
	"Alignment Check",
	"Machine Check",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
];

/// Human-readable name of a CPU exception vector.
pub fn exception_message(vector: u32) -> &'static str {
	EXCEPTION_MESSAGES
		.get(vector as usize)
		.copied()
		.unwrap_or("Unknown Interrupt")
}

/// Draws the fault report in the alert color.
pub fn render_fault<P: PortIo>(writer: &mut Writer<P>, registers: &Registers) -> fmt::Result {
	writer.set_color(ColorCode::LightRed, ColorCode::Black);
	writer.print("EXCEPTION: ");
	writer.println(exception_message(registers.int_no));
	writeln!(
		writer,
		"error code: {:#x}  eip: {:#010x}  cs: {:#06x}  eflags: {:#010x}",
		registers.err_code, registers.eip, registers.cs, registers.eflags
	)?;
	writer.set_color(ColorCode::White, ColorCode::Black);
	Ok(())
}

/// Takes `mutex` even if the interrupted code held it. Only for paths that never return.
pub(crate) fn seize<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	if mutex.is_locked() {
		unsafe { mutex.force_unlock() };
	}
	mutex.lock()
}

/// Reports a CPU exception and halts. Faults are never resumed.
///
/// May run while normal code was in the middle of drawing, so it takes the
/// display and serial locks by force.
pub fn on_fault(registers: &Registers) -> ! {
	{
		let mut debug = seize(&DEBUG);
		let _ = writeln!(
			debug,
			"{}: CPU exception {} ({})\n{:#x?}",
			LogLevel::Emergency.as_str(),
			registers.int_no,
			exception_message(registers.int_no),
			registers
		);
	}
	{
		let mut writer = seize(&*WRITER);
		let _ = render_fault(&mut *writer, registers);
	}
	halt_loop()
}

/// Forwards a device interrupt to the registered handler.
pub fn on_irq(registers: &mut Registers) {
	let router = ROUTER.lock();
	router.dispatch(registers, &mut *PICS.lock());
}

/// Common entry point of every trampoline.
pub extern "C" fn interrupt_dispatch(registers: &mut Registers) {
	if registers.int_no < u32::from(EXCEPTION_VECTORS) {
		on_fault(registers);
	}
	on_irq(registers);
}

/// Registers `handler` for `line` from normal context.
pub fn register_irq_handler(line: u8, handler: &'static dyn IrqHandler) -> Result<(), &'static str> {
	without_interrupts(|| ROUTER.lock().register(line, handler))
}

pub fn unregister_irq_handler(line: u8) -> Result<(), &'static str> {
	without_interrupts(|| ROUTER.lock().unregister(line))
}

/// Remaps the PICs onto vectors 32-47, leaving only the keyboard unmasked.
pub fn init() {
	unsafe {
		PICS.lock().remap(PIC_1_OFFSET, PIC_2_OFFSET);
	}
	log!(
		LogLevel::Info,
		"PICs remapped to {}/{}, keyboard line unmasked",
		PIC_1_OFFSET,
		PIC_2_OFFSET
	);
}

#[cfg(not(test))]
pub fn enable() {
	use core::arch::asm;
	unsafe {
		asm!("sti", options(preserves_flags, nostack));
	}
}

#[cfg(not(test))]
pub fn disable() {
	use core::arch::asm;
	unsafe {
		asm!("cli", options(preserves_flags, nostack));
	}
}

#[cfg(not(test))]
pub fn are_enabled() -> bool {
	use core::arch::asm;
	let flags: usize;
	unsafe {
		asm!("pushf", "pop {}", out(reg) flags, options(nomem, preserves_flags));
	}
	flags & EFLAGS_IF != 0
}

// Host tests model the interrupt flag per thread.
#[cfg(test)]
std::thread_local! {
	static INTERRUPT_FLAG: core::cell::Cell<bool> = const { core::cell::Cell::new(false) };
}

#[cfg(test)]
pub fn enable() {
	INTERRUPT_FLAG.with(|flag| flag.set(true));
}

#[cfg(test)]
pub fn disable() {
	INTERRUPT_FLAG.with(|flag| flag.set(false));
}

#[cfg(test)]
pub fn are_enabled() -> bool {
	INTERRUPT_FLAG.with(|flag| flag.get())
}

/// Runs `f` with interrupts masked, restoring the previous state afterwards.
pub fn without_interrupts<F, R>(f: F) -> R
where
	F: FnOnce() -> R,
{
	let enabled = are_enabled();
	if enabled {
		disable();
	}
	let result = f();
	if enabled {
		enable();
	}
	result
}
