//! # PS/2 Keyboard Driver
//!
//! Decodes scan code set 1 on IRQ 1 and hands characters to normal context.
//!
//! ## Overview
//!
//! The interrupt handler reads one scan code from port `0x60` and runs it
//! through the modifier state machine:
//!
//! - bit 7 set: a release. Shift, Ctrl and Alt releases clear their modifier,
//!   anything else is ignored.
//! - Shift, Ctrl and Alt presses set their modifier, Caps Lock toggles.
//! - Any other press is looked up in the shifted table when Shift is held or
//!   Caps Lock is on, in the plain table otherwise. A zero entry means the key
//!   has no character and the press is dropped.
//!
//! A decoded character is pushed to a lock-free queue (dropped when full) and
//! then passed to the registered callback, if any, before the handler returns.
//!
//! The modifier state is only touched from the interrupt handler. The queue is
//! the only state shared with normal context: the handler is its sole
//! producer and the shell its sole consumer.

use crate::exceptions::interrupts::{self, InterruptIndex, IrqHandler, Registers};
use crate::utils::debug::LogLevel;
#[cfg(not(test))]
use crate::utils::io::inb;
use crate::utils::librs::enable_and_hlt;
use crate::utils::ring_buffer::RingBuffer;
use bitflags::bitflags;
use spin::Mutex;

#[cfg(not(test))]
const KEYBOARD_DATA_PORT: u16 = 0x60;

const RELEASE_BIT: u8 = 0x80;

const LEFT_SHIFT: u8 = 0x2a;
const RIGHT_SHIFT: u8 = 0x36;
const CONTROL: u8 = 0x1d;
const ALT: u8 = 0x38;
const CAPS_LOCK: u8 = 0x3a;

/// Queue slots; one stays free so the queue holds 255 characters.
pub const KEYBOARD_BUFFER_SIZE: usize = 256;

/// Receives each decoded character in interrupt context. Called with the C
/// ABI so the shell can install its own function.
pub type KeyCallback = extern "C" fn(u8);

/// The keyboard, registered on IRQ 1 by [`init`].
pub static KEYBOARD: Keyboard = Keyboard::new();

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Modifiers: u8 {
		const SHIFT = 1 << 0;
		const CONTROL = 1 << 1;
		const ALT = 1 << 2;
		const CAPS_LOCK = 1 << 3;
	}
}

impl Modifiers {
	/// Whether presses decode through the shifted table.
	pub fn selects_shifted(self) -> bool {
		self.intersects(Modifiers::SHIFT | Modifiers::CAPS_LOCK)
	}
}

/// US layout, no modifier. The numeric keypad `-` and `+` decode regardless
/// of Num Lock, which is not tracked.
#[rustfmt::skip]
static KEYMAP: [u8; 128] = [
	// 0x00
	0, 0x1b, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
	// 0x10
	b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
	// 0x20
	b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
	// 0x30
	b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ', 0, 0, 0, 0, 0, 0,
	// 0x40
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, b'-', 0, 0, 0, b'+', 0,
	// 0x50
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
	// 0x60
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
	// 0x70
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// US layout with Shift held or Caps Lock on.
#[rustfmt::skip]
static KEYMAP_SHIFT: [u8; 128] = [
	// 0x00
	0, 0x1b, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
	// 0x10
	b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
	// 0x20
	b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
	// 0x30
	b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ', 0, 0, 0, 0, 0, 0,
	// 0x40
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, b'-', 0, 0, 0, b'+', 0,
	// 0x50
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
	// 0x60
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
	// 0x70
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

pub struct Keyboard {
	modifiers: Mutex<Modifiers>,
	queue: RingBuffer<KEYBOARD_BUFFER_SIZE>,
	callback: Mutex<Option<KeyCallback>>,
}

impl Keyboard {
	pub const fn new() -> Keyboard {
		Keyboard {
			modifiers: Mutex::new(Modifiers::empty()),
			queue: RingBuffer::new(),
			callback: Mutex::new(None),
		}
	}

	/// Feeds one raw scan code through the decoder. Interrupt context only.
	pub fn handle_scancode(&self, scancode: u8) {
		let Some(character) = self.decode(scancode) else {
			return;
		};

		self.queue.push(character);

		let callback = *self.callback.lock();
		if let Some(callback) = callback {
			callback(character);
		}
	}

	fn decode(&self, scancode: u8) -> Option<u8> {
		let mut modifiers = self.modifiers.lock();

		if scancode & RELEASE_BIT != 0 {
			match scancode & !RELEASE_BIT {
				LEFT_SHIFT | RIGHT_SHIFT => modifiers.remove(Modifiers::SHIFT),
				CONTROL => modifiers.remove(Modifiers::CONTROL),
				ALT => modifiers.remove(Modifiers::ALT),
				_ => (),
			}
			return None;
		}

		match scancode {
			LEFT_SHIFT | RIGHT_SHIFT => modifiers.insert(Modifiers::SHIFT),
			CONTROL => modifiers.insert(Modifiers::CONTROL),
			ALT => modifiers.insert(Modifiers::ALT),
			CAPS_LOCK => modifiers.toggle(Modifiers::CAPS_LOCK),
			_ => {
				let keymap = if modifiers.selects_shifted() {
					&KEYMAP_SHIFT
				} else {
					&KEYMAP
				};
				return match keymap[usize::from(scancode)] {
					0 => None,
					character => Some(character),
				};
			}
		}
		None
	}

	/// Whether a character is waiting. Never blocks.
	pub fn available(&self) -> bool {
		!self.queue.is_empty()
	}

	/// Pops the oldest character, if any.
	pub fn try_read(&self) -> Option<u8> {
		self.queue.pop()
	}

	/// Waits for a character, halting between checks. Returns with interrupts
	/// enabled.
	///
	/// The queue is checked with interrupts masked and the halt re-enables them
	/// atomically, so a key arriving right after an empty check still wakes
	/// the loop.
	pub fn read_blocking(&self) -> u8 {
		loop {
			interrupts::disable();
			if let Some(character) = self.queue.pop() {
				interrupts::enable();
				return character;
			}
			enable_and_hlt();
		}
	}

	/// Replaces the push-style delivery target, effective for the next character.
	pub fn set_callback(&self, callback: Option<KeyCallback>) {
		interrupts::without_interrupts(|| *self.callback.lock() = callback);
	}

	pub fn modifiers(&self) -> Modifiers {
		interrupts::without_interrupts(|| *self.modifiers.lock())
	}

	/// Forgets queued characters and modifier state. Call before the line is unmasked.
	pub fn reset(&self) {
		interrupts::without_interrupts(|| {
			self.queue.reset();
			*self.modifiers.lock() = Modifiers::empty();
		});
	}
}

impl IrqHandler for Keyboard {
	fn handle(&self, _registers: &mut Registers) {
		self.handle_scancode(read_scancode());
	}
}

#[cfg(not(test))]
fn read_scancode() -> u8 {
	unsafe { inb(KEYBOARD_DATA_PORT) }
}

/// Host tests stage the byte the controller would return.
#[cfg(test)]
fn read_scancode() -> u8 {
	test::PENDING_SCANCODE.swap(0, core::sync::atomic::Ordering::SeqCst)
}

/// Resets the driver and registers it on the keyboard line.
pub fn init() -> Result<(), &'static str> {
	KEYBOARD.reset();
	interrupts::register_irq_handler(InterruptIndex::Keyboard.line(), &KEYBOARD)?;
	log!(LogLevel::Info, "Keyboard registered on IRQ {}", InterruptIndex::Keyboard.line());
	Ok(())
}
