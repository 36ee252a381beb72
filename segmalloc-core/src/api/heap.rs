//! Heap
//!
//! The Heap type is the public face of the allocator: a segment carved into boundary-tagged
//! blocks, with allocate, release, and resize operations and an on-demand consistency check.
//!
//! Payloads are identified by their byte offset from the arena base, wrapped in the `Payload`
//! type; the bytes themselves are reached through `payload` / `payload_mut`. A null pointer in
//! the conventional C semantics maps onto `None` here, on both sides of the API.

use crate::internals::{block, checker, ops};

use super::Segment;

/// Payload
///
/// The address of an allocated payload, as a byte offset from the arena base.
///
/// Always aligned on 8 bytes. Remains valid until released, or moved by a resize.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Payload(usize);

impl Payload {
    /// Returns the byte offset of the payload.
    pub fn offset(&self) -> usize { self.0 }
}

/// Heap
///
/// A single growable heap region with segregated free-list organization, address-ordered
/// coalescing, and block splitting. Single-threaded by design: a concurrent host must serialize
/// all entry points behind one mutual-exclusion boundary.
pub struct Heap<S> {
    segment: S,
}

impl<S: Segment> Heap<S> {
    /// Establishes the free-list class table, prologue, and epilogue on the segment, and performs
    /// one initial heap extension.
    ///
    /// Returns None if the segment cannot supply the initial bytes; the segment is consumed
    /// either way.
    pub fn new(mut segment: S) -> Option<Heap<S>> {
        ops::initialize(&mut segment)?;

        Some(Heap { segment })
    }

    /// Allocates `size` payload bytes.
    ///
    /// The payload is aligned on 8 bytes and writable for at least `size` bytes. Returns None for
    /// a zero-size request, or if the segment is exhausted; exhaustion leaves the heap fully
    /// usable.
    pub fn allocate(&mut self, size: usize) -> Option<Payload> {
        ops::allocate(&mut self.segment, size).map(Payload)
    }

    /// Releases a payload, merging the freed block with any free neighbor.
    ///
    /// A None payload is a no-op.
    pub fn release(&mut self, payload: Option<Payload>) {
        if let Some(payload) = payload {
            ops::release(self.segment.bytes_mut(), payload.0);
        }
    }

    /// Resizes a payload to `size` bytes.
    ///
    /// A None payload allocates; a zero size releases and returns None. Otherwise the block is
    /// grown or shrunk in place when possible, falling back to allocate + copy + release; the
    /// first `min(old, new)` payload bytes are preserved either way. On exhaustion the original
    /// payload is left untouched and None returned.
    pub fn resize(&mut self, payload: Option<Payload>, size: usize) -> Option<Payload> {
        let payload = match payload {
            None => return self.allocate(size),
            Some(payload) => payload,
        };

        if size == 0 {
            self.release(Some(payload));
            return None;
        }

        ops::resize(&mut self.segment, payload.0, size).map(Payload)
    }

    /// Checks every heap invariant, panicking with a diagnostic naming `label` on any violation.
    ///
    /// Read-only, callable at any point. A panic here means the heap is corrupt: a defect in the
    /// allocator itself, or caller misuse such as a double release.
    pub fn check(&self, label: &str) {
        checker::check(self.segment.bytes(), label);
    }

    /// Returns the payload bytes, spanning the full capacity of its block.
    ///
    /// The capacity is at least the size requested at allocation.
    pub fn payload(&self, payload: Payload) -> &[u8] {
        let bytes = self.segment.bytes();
        let capacity = Self::capacity_at(bytes, payload.0);

        &bytes[payload.0..payload.0 + capacity]
    }

    /// Returns the payload bytes, spanning the full capacity of its block.
    pub fn payload_mut(&mut self, payload: Payload) -> &mut [u8] {
        let bytes = self.segment.bytes_mut();
        let capacity = Self::capacity_at(bytes, payload.0);

        &mut bytes[payload.0..payload.0 + capacity]
    }

    fn capacity_at(bytes: &[u8], bp: usize) -> usize {
        debug_assert!(block::block_allocated(bytes, bp), "Not an allocated payload: {}", bp);

        block::block_size(bytes, bp) - block::DSIZE
    }
}

// mod tests
