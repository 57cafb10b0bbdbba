//! # Serial Port Debugging Module
//!
//! Kernel diagnostics are written to COM1. The `log!` macro prefixes each
//! line with a [`LogLevel`] and routes it here, leaving the VGA text window
//! to whatever the shell draws.

use crate::utils::io::{PortIo, Ports};
use core::fmt;
use spin::Mutex;

const SERIAL_PORT: u16 = 0x3f8;

const DATA: u16 = SERIAL_PORT;
const INTERRUPT_ENABLE: u16 = SERIAL_PORT + 1;
const FIFO_CONTROL: u16 = SERIAL_PORT + 2;
const LINE_CONTROL: u16 = SERIAL_PORT + 3;
const MODEM_CONTROL: u16 = SERIAL_PORT + 4;
const LINE_STATUS: u16 = SERIAL_PORT + 5;

const LINE_STATUS_TRANSMIT_EMPTY: u8 = 0x20;

pub static DEBUG: Mutex<Debug<Ports>> = Mutex::new(Debug::new(Ports));

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
	Panic,
	Emergency,
	Alert,
	Critical,
	Error,
	Warning,
	Notice,
	Info,
	Debug,
}

impl LogLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			LogLevel::Panic => "PANIC",
			LogLevel::Emergency => "EMERGENCY",
			LogLevel::Alert => "ALERT",
			LogLevel::Critical => "CRITICAL",
			LogLevel::Error => "ERROR",
			LogLevel::Warning => "WARNING",
			LogLevel::Notice => "NOTICE",
			LogLevel::Info => "INFO",
			LogLevel::Debug => "DEBUG",
		}
	}
}

/// A 16550 UART used as a write-only debug sink.
pub struct Debug<P: PortIo> {
	ports: P,
}

impl<P: PortIo> Debug<P> {
	pub const fn new(ports: P) -> Debug<P> {
		Debug { ports }
	}

	/// Programs 38400 baud, 8N1, FIFO enabled.
	pub fn init(&mut self) {
		unsafe {
			self.ports.write_byte(INTERRUPT_ENABLE, 0x00);
			self.ports.write_byte(LINE_CONTROL, 0x80);
			self.ports.write_byte(DATA, 0x03);
			self.ports.write_byte(INTERRUPT_ENABLE, 0x00);
			self.ports.write_byte(LINE_CONTROL, 0x03);
			self.ports.write_byte(FIFO_CONTROL, 0xc7);
			self.ports.write_byte(MODEM_CONTROL, 0x0b);
		}
	}

	fn is_transmit_empty(&mut self) -> bool {
		unsafe { self.ports.read_byte(LINE_STATUS) & LINE_STATUS_TRANSMIT_EMPTY != 0 }
	}

	fn write_byte_serial(&mut self, byte: u8) {
		while !self.is_transmit_empty() {}
		unsafe {
			self.ports.write_byte(DATA, byte);
		}
	}

	pub fn write_string_serial(&mut self, s: &str) {
		for byte in s.bytes() {
			self.write_byte_serial(byte);
			if byte == b'\n' {
				self.write_byte_serial(b'\r');
			}
		}
	}
}

impl<P: PortIo> fmt::Write for Debug<P> {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.write_string_serial(s);
		Ok(())
	}
}

pub fn init_serial_port() {
	DEBUG.lock().init();
	log!(LogLevel::Info, "Serial port initialized");
}
