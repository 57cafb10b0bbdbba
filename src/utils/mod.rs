//! Low-level helpers shared by the drivers.

/// Port-mapped I/O
pub mod io;

/// Serial port logging
pub mod debug;

/// Processor primitives
pub mod librs;

/// Lock-free keyboard queue
pub mod ring_buffer;
