//! VGA text mode driver.

/// Represents the VGA text buffer.
pub mod video_graphics_array;
