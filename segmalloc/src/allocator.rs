//! Allocator

use segmalloc_core::{Heap, Payload};

use crate::MmapSegment;

/// Segregated-fit Allocator.
///
/// A heap over an OS-reserved arena. All addresses are byte offsets from the arena base; the
/// bytes behind a payload are reached through `payload` / `payload_mut`.
pub struct SegAllocator {
    heap: Heap<MmapSegment>,
}

impl SegAllocator {
    //  256 MB; pages are only committed as the heap actually extends into them.
    const DEFAULT_CAPACITY: usize = 256 * 1024 * 1024;

    /// Creates an instance over a default-sized reservation.
    ///
    /// Returns None if the reservation or the initial heap extension fails.
    #[cold]
    pub fn new() -> Option<SegAllocator> { Self::with_capacity(Self::DEFAULT_CAPACITY) }

    /// Creates an instance over a reservation of `capacity` bytes.
    ///
    /// The capacity bounds how far the heap can ever grow. Returns None if the reservation or
    /// the initial heap extension fails.
    #[cold]
    pub fn with_capacity(capacity: usize) -> Option<SegAllocator> {
        let segment = MmapSegment::new(capacity)?;

        Heap::new(segment).map(|heap| SegAllocator { heap })
    }

    /// Allocates `size` payload bytes, aligned on 8 bytes.
    ///
    /// Returns None for a zero-size request, or if the reservation is exhausted; exhaustion
    /// leaves the heap fully usable.
    pub fn allocate(&mut self, size: usize) -> Option<Payload> { self.heap.allocate(size) }

    /// Allocates `size` payload bytes, zeroed.
    pub fn allocate_zeroed(&mut self, size: usize) -> Option<Payload> {
        let payload = self.heap.allocate(size)?;

        for byte in self.heap.payload_mut(payload) {
            *byte = 0;
        }

        Some(payload)
    }

    /// Releases a payload; None is a no-op.
    pub fn release(&mut self, payload: Option<Payload>) { self.heap.release(payload); }

    /// Resizes a payload to `size` bytes, preserving the first `min(old, new)` payload bytes.
    ///
    /// A None payload allocates; a zero size releases and returns None. On exhaustion the
    /// original payload is left untouched and None returned.
    pub fn resize(&mut self, payload: Option<Payload>, size: usize) -> Option<Payload> {
        self.heap.resize(payload, size)
    }

    /// Returns the payload bytes.
    pub fn payload(&self, payload: Payload) -> &[u8] { self.heap.payload(payload) }

    /// Returns the payload bytes.
    pub fn payload_mut(&mut self, payload: Payload) -> &mut [u8] {
        self.heap.payload_mut(payload)
    }

    /// Checks every heap invariant, panicking with a diagnostic naming `label` on any violation.
    pub fn check(&self, label: &str) { self.heap.check(label); }
}
