//! Structures for the x86 architecture

/// Interrupt Descriptor Table
pub mod idt;

/// Type and attribute flags for IDT gates
pub mod gateflags;
