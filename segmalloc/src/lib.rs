#![no_std]
#![deny(missing_docs)]

//! A segregated-fit heap allocator library.
//!
//! The type `SegAllocator` manages a single OS-reserved arena with segregated free lists,
//! address-ordered coalescing, and block splitting, exposing allocate, release, and resize over
//! byte offsets rather than raw pointers.
//!
//! #   Warning
//!
//! The allocator is single-threaded by design: a concurrent host must serialize all entry points
//! behind a single mutual-exclusion boundary.

mod allocator;
mod platform;

pub use allocator::SegAllocator;
pub use platform::MmapSegment;

pub use segmalloc_core::{Heap, Payload, Segment};
