#![no_std]

#![deny(missing_docs)]

//! Building blocks for a segregated-fit heap allocator.
//!
//! segmalloc-core manages a single growable heap arena and implements the allocate, release, and
//! resize operations on top of it. It contains:
//! -   A segment trait, abstracting the heap-growth primitive of the host environment.
//! -   A heap type carving the arena into boundary-tagged blocks, organized in a segregated free
//!     list, with address-ordered coalescing and block splitting.
//! -   A heap checker, walking the whole arena and every free list to detect corruption.
//!
//! All addresses handled by this crate are byte offsets from the arena base, never raw pointers;
//! the arena itself is plain bytes supplied by the segment.

mod api;
mod internals;
mod utils;

pub use api::*;
