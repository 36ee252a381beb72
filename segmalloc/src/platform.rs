//! Abstraction over OS differences.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::MmapSegment;
