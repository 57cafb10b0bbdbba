//! VGA text mode driver.
//!
//! Draws into the 80x25 cell grid at `0xb8000`, one character byte and one
//! attribute byte per cell (background in the high nibble). Output wraps at
//! the right edge and scrolls by one row past the bottom. Tab stops are every
//! 4 columns and backspace blanks the previous cell. The hardware cursor is
//! moved after every public call.
//!
//! Rust strings are mapped to code page 437; raw bytes from the shell are
//! stored unchanged.
//!
//! The display is only drawn from normal context. The fault path is the one
//! exception and it never returns, so the two never interleave.

use crate::utils::io::{PortIo, Ports};
use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

const VGA_BUFFER_ADDRESS: usize = 0xb8000;
pub const VGA_COLUMNS: usize = 80;
pub const VGA_ROWS: usize = 25;
pub const VGA_LAST_LINE: usize = VGA_ROWS - 1;

const TAB_WIDTH: usize = 4;

const VGA_CTRL_REGISTER: u16 = 0x3d4;
const VGA_DATA_REGISTER: u16 = 0x3d5;

const CURSOR_START_REGISTER: u8 = 0x0a;
const CURSOR_LOCATION_HIGH: u8 = 0x0e;
const CURSOR_LOCATION_LOW: u8 = 0x0f;

lazy_static! {
	/// Global writer instance for the VGA buffer.
	///
	/// Normal context locks it with interrupts disabled; see `print!`.
	pub static ref WRITER: Mutex<Writer<Ports>> = Mutex::new(Writer::new(
		unsafe { &mut *(VGA_BUFFER_ADDRESS as *mut VgaBuffer) },
		Ports,
	));
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorCode {
	Black = 0x0,
	Blue = 0x1,
	Green = 0x2,
	Cyan = 0x3,
	Red = 0x4,
	Magenta = 0x5,
	Brown = 0x6,
	LightGray = 0x7,
	DarkGray = 0x8,
	LightBlue = 0x9,
	LightGreen = 0xa,
	LightCyan = 0xb,
	LightRed = 0xc,
	Pink = 0xd,
	Yellow = 0xe,
	White = 0xf,
}

/// Represents a color code for a character cell in the VGA text buffer.
///
/// A color code consists of a foreground color and a background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Color(u8);

impl ColorCode {
	/// The color with number `value & 0x0f`.
	pub fn from_nibble(value: u8) -> ColorCode {
		match value & 0x0f {
			0x0 => ColorCode::Black,
			0x1 => ColorCode::Blue,
			0x2 => ColorCode::Green,
			0x3 => ColorCode::Cyan,
			0x4 => ColorCode::Red,
			0x5 => ColorCode::Magenta,
			0x6 => ColorCode::Brown,
			0x7 => ColorCode::LightGray,
			0x8 => ColorCode::DarkGray,
			0x9 => ColorCode::LightBlue,
			0xa => ColorCode::LightGreen,
			0xb => ColorCode::LightCyan,
			0xc => ColorCode::LightRed,
			0xd => ColorCode::Pink,
			0xe => ColorCode::Yellow,
			_ => ColorCode::White,
		}
	}
}

impl Color {
	pub const fn new(foreground: ColorCode, background: ColorCode) -> Color {
		Color(((background as u8) << 4) | (foreground as u8))
	}

	pub fn as_u8(self) -> u8 {
		self.0
	}
}

/// Represents a character cell in the VGA text buffer.
///
/// Each cell consists of an ASCII character and its associated color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct ScreenChar {
	ascii_character: u8,
	color: Color,
}

impl ScreenChar {
	const fn blank(color: Color) -> ScreenChar {
		ScreenChar {
			ascii_character: b' ',
			color,
		}
	}
}

/// The VGA text buffer.
///
/// Every access is volatile: the memory belongs to the display adapter.
#[repr(transparent)]
pub struct VgaBuffer {
	chars: [[ScreenChar; VGA_COLUMNS]; VGA_ROWS],
}

impl VgaBuffer {
	fn read(&self, row: usize, column: usize) -> ScreenChar {
		unsafe { core::ptr::read_volatile(&self.chars[row][column]) }
	}

	fn write(&mut self, character: ScreenChar, row: usize, column: usize) {
		unsafe { core::ptr::write_volatile(&mut self.chars[row][column], character) }
	}
}

/// Writer for the VGA text buffer.
///
/// Keeps the cursor inside the grid after every public call: reaching the
/// right edge wraps to the next row and stepping past the last row scrolls.
pub struct Writer<P: PortIo> {
	column_position: usize,
	row_position: usize,
	color: Color,
	buffer: &'static mut VgaBuffer,
	ports: P,
}

impl<P: PortIo> Writer<P> {
	pub fn new(buffer: &'static mut VgaBuffer, ports: P) -> Writer<P> {
		Writer {
			column_position: 0,
			row_position: 0,
			color: Color::new(ColorCode::White, ColorCode::Black),
			buffer,
			ports,
		}
	}

	/// Writes one byte and moves the hardware cursor after it.
	pub fn put_char(&mut self, byte: u8) {
		self.write_byte(byte);
		self.update_cursor();
	}

	fn write_byte(&mut self, byte: u8) {
		match byte {
			b'\n' => {
				self.column_position = 0;
				self.row_position += 1;
			}
			b'\r' => self.column_position = 0,
			b'\t' => {
				self.column_position = (self.column_position + TAB_WIDTH) & !(TAB_WIDTH - 1);
			}
			0x08 => {
				if self.column_position > 0 {
					self.column_position -= 1;
					self.buffer.write(
						ScreenChar::blank(self.color),
						self.row_position,
						self.column_position,
					);
				}
			}
			byte => {
				self.buffer.write(
					ScreenChar {
						ascii_character: byte,
						color: self.color,
					},
					self.row_position,
					self.column_position,
				);
				self.column_position += 1;
			}
		}

		if self.column_position >= VGA_COLUMNS {
			self.column_position = 0;
			self.row_position += 1;
		}
		if self.row_position >= VGA_ROWS {
			self.scroll();
		}
	}

	/// Writes `s`, mapping each character to its code page 437 glyph.
	pub fn print(&mut self, s: &str) {
		for character in s.chars() {
			self.write_byte(convert_to_cp437(character));
		}
		self.update_cursor();
	}

	/// Writes bytes unchanged, control bytes included.
	pub fn write_bytes(&mut self, bytes: &[u8]) {
		for &byte in bytes {
			self.write_byte(byte);
		}
		self.update_cursor();
	}

	pub fn println(&mut self, s: &str) {
		self.print(s);
		self.put_char(b'\n');
	}

	/// Moves every row up by one, blanks the last row and parks the cursor on it.
	pub fn scroll(&mut self) {
		for row in 1..VGA_ROWS {
			for column in 0..VGA_COLUMNS {
				let character = self.buffer.read(row, column);
				self.buffer.write(character, row - 1, column);
			}
		}
		self.clear_row(VGA_LAST_LINE);
		self.row_position = VGA_LAST_LINE;
	}

	fn clear_row(&mut self, row: usize) {
		let blank = ScreenChar::blank(self.color);
		for column in 0..VGA_COLUMNS {
			self.buffer.write(blank, row, column);
		}
	}

	/// Attribute for subsequent writes. Cells already on screen keep theirs.
	pub fn set_color(&mut self, foreground: ColorCode, background: ColorCode) {
		self.color = Color::new(foreground, background);
	}

	pub fn color_byte(&self) -> u8 {
		self.color.as_u8()
	}

	pub fn clear_screen(&mut self) {
		for row in 0..VGA_ROWS {
			self.clear_row(row);
		}
		self.column_position = 0;
		self.row_position = 0;
		self.update_cursor();
	}

	/// Current `(column, row)`.
	pub fn cursor(&self) -> (usize, usize) {
		(self.column_position, self.row_position)
	}

	/// `(character, attribute)` stored at a cell.
	pub fn cell(&self, row: usize, column: usize) -> (u8, u8) {
		let character = self.buffer.read(row, column);
		(character.ascii_character, character.color.as_u8())
	}

	/// Makes the hardware cursor an underline on scan lines 14-15.
	pub fn show_cursor(&mut self) {
		unsafe {
			self.ports.write_byte(VGA_CTRL_REGISTER, CURSOR_START_REGISTER);
			self.ports.write_byte(VGA_DATA_REGISTER, 0x0e);
		}
	}

	fn update_cursor(&mut self) {
		let position = (self.row_position * VGA_COLUMNS + self.column_position) as u16;

		unsafe {
			self.ports.write_byte(VGA_CTRL_REGISTER, CURSOR_LOCATION_LOW);
			self.ports.write_byte(VGA_DATA_REGISTER, (position & 0xff) as u8);
			self.ports.write_byte(VGA_CTRL_REGISTER, CURSOR_LOCATION_HIGH);
			self.ports.write_byte(VGA_DATA_REGISTER, ((position >> 8) & 0xff) as u8);
		}
	}
}

impl<P: PortIo> fmt::Write for Writer<P> {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.print(s);
		Ok(())
	}
}

/// Glyph drawn for characters code page 437 has no cell for.
const UNKNOWN_GLYPH: u8 = 0xfe;

/// Code page 437 byte for `character`. ASCII maps to itself.
fn convert_to_cp437(character: char) -> u8 {
	match character {
		'\0'..='\x7f' => character as u8,
		'Ç' => 0x80,
		'ü' => 0x81,
		'é' => 0x82,
		'â' => 0x83,
		'ä' => 0x84,
		'à' => 0x85,
		'ç' => 0x87,
		'ê' => 0x88,
		'ë' => 0x89,
		'è' => 0x8a,
		'ï' => 0x8b,
		'î' => 0x8c,
		'Ä' => 0x8e,
		'É' => 0x90,
		'ô' => 0x93,
		'ö' => 0x94,
		'û' => 0x96,
		'ù' => 0x97,
		'Ö' => 0x99,
		'Ü' => 0x9a,
		'£' => 0x9c,
		'µ' => 0xe6,
		'°' => 0xf8,
		'²' => 0xfd,
		'§' => 0x15,
		_ => UNKNOWN_GLYPH,
	}
}

/// Resets the attribute to white on black, clears the screen and shows the cursor.
pub fn init() {
	crate::exceptions::interrupts::without_interrupts(|| {
		let mut writer = WRITER.lock();
		writer.set_color(ColorCode::White, ColorCode::Black);
		writer.clear_screen();
		writer.show_cursor();
	});
}

#[cfg(test)]
pub mod test {
	use super::*;
	use crate::utils::io::test::RecordingPorts;
	use std::boxed::Box;
	use std::string::String;
	use std::vec::Vec;

	pub fn test_writer() -> Writer<RecordingPorts> {
		let blank = ScreenChar::blank(Color::new(ColorCode::LightGray, ColorCode::Black));
		let buffer = Box::leak(Box::new(VgaBuffer {
			chars: [[blank; VGA_COLUMNS]; VGA_ROWS],
		}));
		Writer::new(buffer, RecordingPorts::default())
	}

	pub fn row_text<P: PortIo>(writer: &Writer<P>, row: usize) -> String {
		(0..VGA_COLUMNS)
			.map(|column| writer.cell(row, column).0 as char)
			.collect()
	}

	fn row_text_bytes<P: PortIo>(writer: &Writer<P>, row: usize) -> Vec<u8> {
		(0..VGA_COLUMNS).map(|column| writer.cell(row, column).0).collect()
	}

	fn assert_cursor_in_bounds<P: PortIo>(writer: &Writer<P>) {
		let (column, row) = writer.cursor();
		assert!(column < VGA_COLUMNS, "column {} out of bounds", column);
		assert!(row < VGA_ROWS, "row {} out of bounds", row);
	}

	/// Writes `count` printable bytes whose character encodes the row they land on.
	fn fill_rows(writer: &mut Writer<RecordingPorts>, count: usize) {
		for i in 0..count {
			writer.put_char(b'a' + (i / VGA_COLUMNS) as u8);
			assert_cursor_in_bounds(writer);
		}
	}

	#[test]
	fn printable_character_uses_current_attribute() {
		let mut writer = test_writer();
		writer.set_color(ColorCode::Yellow, ColorCode::Blue);
		writer.put_char(b'k');

		assert_eq!(writer.cell(0, 0), (b'k', 0x1e));
		assert_eq!(writer.cursor(), (1, 0));
	}

	#[test]
	fn set_color_does_not_repaint() {
		let mut writer = test_writer();
		writer.put_char(b'x');
		writer.set_color(ColorCode::Green, ColorCode::Red);

		assert_eq!(writer.cell(0, 0), (b'x', 0x0f));
		assert_eq!(writer.color_byte(), 0x42);
	}

	#[test]
	fn newline_and_carriage_return() {
		let mut writer = test_writer();
		writer.print("abc\n");
		assert_eq!(writer.cursor(), (0, 1));

		writer.print("de\r");
		assert_eq!(writer.cursor(), (0, 1));
		writer.put_char(b'X');
		assert_eq!(row_text(&writer, 1).trim_end(), "Xe");
	}

	#[test]
	fn tab_rounds_up_to_next_stop() {
		let mut writer = test_writer();
		writer.put_char(b'\t');
		assert_eq!(writer.cursor(), (4, 0));

		writer.print("ab");
		writer.put_char(b'\t');
		assert_eq!(writer.cursor(), (8, 0));

		writer.put_char(b'\t');
		assert_eq!(writer.cursor(), (12, 0));
	}

	#[test]
	fn tab_at_line_end_wraps() {
		let mut writer = test_writer();
		fill_rows(&mut writer, VGA_COLUMNS - 2);
		writer.put_char(b'\t');
		assert_eq!(writer.cursor(), (0, 1));
	}

	#[test]
	fn backspace_blanks_previous_cell() {
		let mut writer = test_writer();
		writer.print("ok");
		writer.set_color(ColorCode::Black, ColorCode::White);
		writer.put_char(0x08);

		assert_eq!(writer.cursor(), (1, 0));
		assert_eq!(writer.cell(0, 1), (b' ', 0xf0));
		assert_eq!(writer.cell(0, 0).0, b'o');
	}

	#[test]
	fn backspace_at_column_zero_does_nothing() {
		let mut writer = test_writer();
		writer.print("\n");
		writer.put_char(0x08);
		assert_eq!(writer.cursor(), (0, 1));
	}

	#[test]
	fn full_row_wraps_without_scrolling() {
		let mut writer = test_writer();
		fill_rows(&mut writer, VGA_COLUMNS);
		assert_eq!(writer.cursor(), (0, 1));
		assert_eq!(writer.cell(0, 0).0, b'a');

		writer.put_char(b'z');
		assert_eq!(writer.cursor(), (1, 1));
		assert_eq!(writer.cell(1, 0).0, b'z');
	}

	#[test]
	fn filling_the_screen_scrolls_exactly_once() {
		let mut writer = test_writer();
		fill_rows(&mut writer, VGA_COLUMNS * VGA_ROWS - 1);
		assert_eq!(writer.cell(0, 0).0, b'a');
		assert_eq!(writer.cursor(), (VGA_COLUMNS - 1, VGA_LAST_LINE));

		writer.put_char(b'a' + VGA_LAST_LINE as u8);
		assert_eq!(writer.cell(0, 0).0, b'b');
		assert_eq!(writer.cell(VGA_LAST_LINE - 1, 0).0, b'a' + VGA_LAST_LINE as u8);
		assert_eq!(row_text(&writer, VGA_LAST_LINE).trim_end(), "");
		assert_eq!(writer.cursor(), (0, VGA_LAST_LINE));

		writer.put_char(b'!');
		assert_eq!(writer.cell(0, 0).0, b'b');
		assert_eq!(writer.cursor(), (1, VGA_LAST_LINE));
	}

	#[test]
	fn newline_on_last_row_scrolls() {
		let mut writer = test_writer();
		for row in 0..VGA_ROWS {
			writer.put_char(b'0' + row as u8);
			if row < VGA_LAST_LINE {
				writer.put_char(b'\n');
			}
		}
		writer.set_color(ColorCode::Cyan, ColorCode::Black);
		writer.put_char(b'\n');

		assert_eq!(writer.cursor(), (0, VGA_LAST_LINE));
		assert_eq!(writer.cell(0, 0).0, b'1');
		assert_eq!(writer.cell(VGA_LAST_LINE, 0), (b' ', 0x03));
	}

	#[test]
	fn println_appends_newline() {
		let mut writer = test_writer();
		writer.println("hi");
		assert_eq!(row_text(&writer, 0).trim_end(), "hi");
		assert_eq!(writer.cursor(), (0, 1));
	}

	#[test]
	fn clear_blanks_with_current_attribute_and_homes_cursor() {
		let mut writer = test_writer();
		writer.print("garbage\nmore");
		writer.set_color(ColorCode::White, ColorCode::Blue);
		writer.clear_screen();

		assert_eq!(writer.cursor(), (0, 0));
		for row in 0..VGA_ROWS {
			for column in 0..VGA_COLUMNS {
				assert_eq!(writer.cell(row, column), (b' ', 0x1f));
			}
		}
	}

	#[test]
	fn hardware_cursor_follows_logical_cursor() {
		let mut writer = test_writer();
		writer.print("\n\n\n\n");
		writer.ports.writes.clear();
		writer.put_char(b'x');

		// row 4, column 1 -> 321
		assert_eq!(
			writer.ports.writes,
			[(0x3d4, 0x0f), (0x3d5, 0x41), (0x3d4, 0x0e), (0x3d5, 0x01)]
		);
	}

	#[test]
	fn non_ascii_text_maps_to_code_page_437() {
		let mut writer = test_writer();
		writer.print("é°→a");

		assert_eq!(row_text_bytes(&writer, 0)[..4], [0x82, 0xf8, 0xfe, b'a']);
		assert_eq!(writer.cursor(), (4, 0));
	}

	#[test]
	fn raw_bytes_are_stored_unchanged() {
		let mut writer = test_writer();
		writer.write_bytes(&[0x82, b'x', b'\n', 0xdb]);

		assert_eq!(writer.cell(0, 0).0, 0x82);
		assert_eq!(writer.cell(0, 1).0, b'x');
		assert_eq!(writer.cell(1, 0).0, 0xdb);
		assert_eq!(writer.cursor(), (1, 1));
	}

	#[test]
	fn color_from_nibble_ignores_high_bits() {
		assert_eq!(ColorCode::from_nibble(0x0c), ColorCode::LightRed);
		assert_eq!(ColorCode::from_nibble(0xf2), ColorCode::Green);
		for value in 0..16u8 {
			assert_eq!(ColorCode::from_nibble(value) as u8, value);
		}
	}

	#[test]
	fn formatted_output() {
		use core::fmt::Write;
		let mut writer = test_writer();
		write!(writer, "{}+{}={}", 2, 2, 4).unwrap();
		assert_eq!(row_text(&writer, 0).trim_end(), "2+2=4");
	}
}
