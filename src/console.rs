//! The surface the shell is allowed to use.
//!
//! The shell is linked in from outside the crate, so every entry point is an
//! unmangled C function. Keyboard reads go straight to the lock-free queue.
//! Display calls lock the writer with interrupts masked, so a key callback
//! that draws from interrupt context never finds the writer held.

use crate::exceptions::interrupts::without_interrupts;
use crate::exceptions::keyboard::{KeyCallback, KEYBOARD};
use crate::vga::video_graphics_array::{ColorCode, WRITER};

#[no_mangle]
pub extern "C" fn keyboard_available() -> bool {
	KEYBOARD.available()
}

/// Waits until a key is decoded. Returns with interrupts enabled.
#[no_mangle]
pub extern "C" fn keyboard_read_blocking() -> u8 {
	KEYBOARD.read_blocking()
}

/// Sets the callback run in interrupt context for every decoded key. A null
/// pointer clears it.
#[no_mangle]
pub extern "C" fn keyboard_set_callback(callback: Option<KeyCallback>) {
	KEYBOARD.set_callback(callback);
}

#[no_mangle]
pub extern "C" fn display_put_char(c: u8) {
	without_interrupts(|| WRITER.lock().put_char(c));
}

/// Writes `len` bytes starting at `s`. Bytes are stored as-is.
///
/// # Safety
///
/// `s` must be null or point to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn display_print(s: *const u8, len: usize) {
	let bytes = raw_bytes(s, len);
	without_interrupts(|| WRITER.lock().write_bytes(bytes));
}

/// [`display_print`] followed by a newline.
///
/// # Safety
///
/// Same contract as [`display_print`].
#[no_mangle]
pub unsafe extern "C" fn display_println(s: *const u8, len: usize) {
	let bytes = raw_bytes(s, len);
	without_interrupts(|| {
		let mut writer = WRITER.lock();
		writer.write_bytes(bytes);
		writer.put_char(b'\n');
	});
}

/// Attribute for subsequent output. Only the low nibble of each color is used.
#[no_mangle]
pub extern "C" fn display_set_color(foreground: u8, background: u8) {
	let (foreground, background) = (ColorCode::from_nibble(foreground), ColorCode::from_nibble(background));
	without_interrupts(|| WRITER.lock().set_color(foreground, background));
}

#[no_mangle]
pub extern "C" fn display_clear() {
	without_interrupts(|| WRITER.lock().clear_screen());
}

unsafe fn raw_bytes<'a>(s: *const u8, len: usize) -> &'a [u8] {
	if s.is_null() {
		&[]
	} else {
		core::slice::from_raw_parts(s, len)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::exceptions::keyboard::test::lock_global_keyboard;
	use core::sync::atomic::{AtomicU8, Ordering};

	#[test]
	fn entry_points_have_c_signatures() {
		let _: extern "C" fn() -> bool = keyboard_available;
		let _: extern "C" fn() -> u8 = keyboard_read_blocking;
		let _: extern "C" fn(Option<KeyCallback>) = keyboard_set_callback;
		let _: extern "C" fn(u8) = display_put_char;
		let _: unsafe extern "C" fn(*const u8, usize) = display_print;
		let _: unsafe extern "C" fn(*const u8, usize) = display_println;
		let _: extern "C" fn(u8, u8) = display_set_color;
		let _: extern "C" fn() = display_clear;
		assert_eq!(core::mem::size_of::<Option<KeyCallback>>(), core::mem::size_of::<usize>());
	}

	#[test]
	fn keyboard_calls_through_c_pointers() {
		static LAST: AtomicU8 = AtomicU8::new(0);
		extern "C" fn remember(character: u8) {
			LAST.store(character, Ordering::SeqCst);
		}

		let _guard = lock_global_keyboard();
		let available: extern "C" fn() -> bool = keyboard_available;
		let read: extern "C" fn() -> u8 = keyboard_read_blocking;
		let set_callback: extern "C" fn(Option<KeyCallback>) = keyboard_set_callback;

		KEYBOARD.reset();
		set_callback(Some(remember));
		KEYBOARD.handle_scancode(0x2c);
		set_callback(None);

		assert_eq!(LAST.load(Ordering::SeqCst), b'z');
		assert!(available());
		assert_eq!(read(), b'z');
		assert!(!available());
	}

	#[test]
	fn null_text_is_empty() {
		let bytes = unsafe { raw_bytes(core::ptr::null(), 12) };
		assert!(bytes.is_empty());

		let text = b"shell> ";
		let bytes = unsafe { raw_bytes(text.as_ptr(), text.len()) };
		assert_eq!(bytes, text);
	}
}
