//! The block layout codec.
//!
//! A block is a contiguous run of arena bytes framed by a header and a footer, each one word wide
//! and holding the same `(size, allocated)` boundary tag. The size occupies all bits above the
//! lowest 3, the allocated flag occupies bit 0, so a tag is simply `size | allocated`.
//!
//! A block address `bp` designates the first payload byte, one word past the header; the footer
//! sits at `bp + size - 2 * WSIZE`. Because every block keeps its footer valid, free or allocated,
//! both neighbors are reachable in O(1): the next from the current header, the previous from the
//! word just below the current header.
//!
//! The functions here are pure offset arithmetic over the arena slice; they trust their callers.
//! All safety checks live in the checker.

use crate::utils::PowerOf2;

/// One machine word, in bytes.
pub(crate) const WSIZE: usize = 8;

/// Two machine words, in bytes: the per-block header + footer overhead.
pub(crate) const DSIZE: usize = 16;

/// Payload alignment.
//  Safety:
//  -   8 is a power of 2.
pub(crate) const ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(8) };

/// Smallest legal block: header, footer, and the two link words a free block carries.
pub(crate) const MIN_BLOCK: usize = 4 * WSIZE;

/// Heap growth quantum, amortizing repeated small extensions.
pub(crate) const CHUNK: usize = 4096;

/// Number of size classes in the segregated free list.
pub(crate) const NUM_CLASSES: usize = 9;

/// Block sizes above this ceiling all fall in the last, unbounded class.
pub(crate) const CLASS_CEILING: usize = 4096;

/// Bytes reserved at the arena base for the class sentinels, one (succ, pred) pair each.
pub(crate) const SENTINELS: usize = NUM_CLASSES * DSIZE;

/// Block address of the prologue block.
pub(crate) const PROLOGUE: usize = SENTINELS + WSIZE;

/// Block address of the first real block, just past the prologue.
pub(crate) const FIRST_BLOCK: usize = PROLOGUE + MIN_BLOCK;

/// Reads the word at `at`.
pub(crate) fn load(bytes: &[u8], at: usize) -> usize {
    let mut word = [0u8; WSIZE];
    word.copy_from_slice(&bytes[at..at + WSIZE]);

    u64::from_ne_bytes(word) as usize
}

/// Writes `value` as the word at `at`.
pub(crate) fn store(bytes: &mut [u8], at: usize, value: usize) {
    bytes[at..at + WSIZE].copy_from_slice(&(value as u64).to_ne_bytes());
}

/// Packs a size and an allocated flag into a boundary tag.
pub(crate) fn pack(size: usize, allocated: bool) -> usize {
    debug_assert!(size % ALIGNMENT == 0, "Unaligned size: {}", size);

    size | allocated as usize
}

/// Extracts the size from a boundary tag.
pub(crate) fn size_of(tag: usize) -> usize { tag & !0x7 }

/// Extracts the allocated flag from a boundary tag.
pub(crate) fn is_allocated(tag: usize) -> bool { tag & 0x1 != 0 }

/// Returns the offset of the header of `bp`.
pub(crate) fn header_at(bp: usize) -> usize { bp - WSIZE }

/// Returns the offset of the footer of `bp`.
pub(crate) fn footer_at(bytes: &[u8], bp: usize) -> usize { bp + block_size(bytes, bp) - DSIZE }

/// Returns the size of the block at `bp`, per its header.
pub(crate) fn block_size(bytes: &[u8], bp: usize) -> usize { size_of(load(bytes, header_at(bp))) }

/// Returns whether the block at `bp` is allocated, per its header.
pub(crate) fn block_allocated(bytes: &[u8], bp: usize) -> bool {
    is_allocated(load(bytes, header_at(bp)))
}

/// Returns the address of the block following `bp`.
pub(crate) fn next_block(bytes: &[u8], bp: usize) -> usize { bp + block_size(bytes, bp) }

/// Returns the address of the block preceding `bp`, per that block's footer.
pub(crate) fn prev_block(bytes: &[u8], bp: usize) -> usize {
    bp - size_of(load(bytes, bp - DSIZE))
}

/// Writes both boundary tags of the block at `bp`.
pub(crate) fn stamp(bytes: &mut [u8], bp: usize, size: usize, allocated: bool) {
    let tag = pack(size, allocated);

    store(bytes, header_at(bp), tag);
    store(bytes, bp + size - DSIZE, tag);
}

/// Returns whether `bp` designates the epilogue, the zero-size allocated terminator.
pub(crate) fn is_epilogue(bytes: &[u8], bp: usize) -> bool {
    load(bytes, header_at(bp)) == pack(0, true)
}
