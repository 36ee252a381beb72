//! Segment
//!
//! The Segment trait is used to request memory directly from the host environment. By abstracting
//! the underlying heap-growth primitive, it becomes possible to run the allocator over an OS-level
//! arena, a fixed buffer, or anything else that can hand out bytes at its top.

/// Abstraction of a monotonically growing byte arena.
///
/// The arena only ever grows, by appending at the top; it never shrinks. All addresses handed out
/// by the allocator are byte offsets into this arena, so implementations are free to relocate the
/// backing storage when growing.
pub trait Segment {
    /// Extends the arena by `extra` bytes, and returns the offset of the previous top.
    ///
    /// Returns None if the arena is exhausted, in which case the arena is left untouched.
    ///
    /// Implementations may assume that `extra` is a multiple of 8; callers guarantee it.
    fn grow(&mut self, extra: usize) -> Option<usize>;

    /// Returns the arena content, from base to top.
    fn bytes(&self) -> &[u8];

    /// Returns the arena content, from base to top.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// ArraySegment
///
/// A fixed-capacity inline segment. Growth fails once the capacity is reached, exercising the
/// exhaustion path for real; handy for tests and for embedding without an OS.
pub struct ArraySegment<const N: usize> {
    storage: [u8; N],
    top: usize,
}

impl<const N: usize> ArraySegment<N> {
    /// Creates an empty instance.
    pub const fn new() -> Self { Self { storage: [0; N], top: 0 } }

    /// Returns the maximum number of bytes the segment can hold.
    pub const fn capacity(&self) -> usize { N }
}

impl<const N: usize> Default for ArraySegment<N> {
    fn default() -> Self { Self::new() }
}

impl<const N: usize> Segment for ArraySegment<N> {
    fn grow(&mut self, extra: usize) -> Option<usize> {
        let top = self.top.checked_add(extra)?;

        if top > N {
            return None;
        }

        let previous = self.top;
        self.top = top;

        Some(previous)
    }

    fn bytes(&self) -> &[u8] { &self.storage[..self.top] }

    fn bytes_mut(&mut self) -> &mut [u8] { &mut self.storage[..self.top] }
}
