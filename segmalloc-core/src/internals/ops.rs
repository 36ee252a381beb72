//! The allocation engine.
//!
//! The engine is the only component mutating blocks. It finds candidate blocks through the
//! segregated free list, splits and coalesces them through the block codec, and grows the arena
//! through the segment when no fit exists. Every operation leaves the free-list invariants intact:
//! a block is linked exactly while it is free, and no two free blocks are ever adjacent.
//!
//! The arena prefix is laid out at initialization and never changes shape afterwards: the class
//! sentinels, then the prologue block, then real blocks up to the epilogue header, which is always
//! the last word of the arena. Prologue and epilogue are allocated sentinels so that neighbor
//! lookups from any real block stay in bounds.

use crate::api::Segment;

use super::block::{self, ALIGNMENT, CHUNK, DSIZE, FIRST_BLOCK, MIN_BLOCK, NUM_CLASSES, PROLOGUE, WSIZE};
use super::free_list;

/// Lays out the arena prefix and performs the initial extension.
///
/// Returns None if the segment cannot supply the initial bytes.
pub(crate) fn initialize<S: Segment>(segment: &mut S) -> Option<()> {
    let base = segment.grow(FIRST_BLOCK)?;
    debug_assert!(base == 0, "Initializing a non-empty segment: {}", base);

    let bytes = segment.bytes_mut();

    free_list::initialize(bytes);

    block::stamp(bytes, PROLOGUE, MIN_BLOCK, true);
    block::store(bytes, block::header_at(FIRST_BLOCK), block::pack(0, true));

    extend(segment, CHUNK / WSIZE)?;

    Some(())
}

/// Grows the arena by `words` machine-words, formatted as one fresh free block.
///
/// The new block is coalesced with a trailing free block, linked into the free list, and its
/// address returned; the epilogue is relocated to the new top. Returns None on exhaustion, leaving
/// the arena untouched.
#[cold]
pub(crate) fn extend<S: Segment>(segment: &mut S, words: usize) -> Option<usize> {
    let size = ALIGNMENT.checked_round_up(words.checked_mul(WSIZE)?)?;

    let top = segment.grow(size)?;
    let bytes = segment.bytes_mut();

    //  The old epilogue header becomes the new block's header.
    let bp = top;
    block::stamp(bytes, bp, size, false);

    let next = block::next_block(bytes, bp);
    block::store(bytes, block::header_at(next), block::pack(0, true));

    Some(coalesce(bytes, bp))
}

/// Merges the free block at `bp` with any free neighbor, and links the result into the free list.
///
/// `bp` must be marked free and not belong to any class yet; free neighbors are unlinked before
/// merging. Returns the address of the merged block.
pub(crate) fn coalesce(bytes: &mut [u8], bp: usize) -> usize {
    let prev = block::prev_block(bytes, bp);
    let next = block::next_block(bytes, bp);

    let mut bp = bp;
    let mut size = block::block_size(bytes, bp);

    if !block::block_allocated(bytes, next) {
        free_list::remove(bytes, next);
        size += block::block_size(bytes, next);
    }

    if !block::block_allocated(bytes, prev) {
        free_list::remove(bytes, prev);
        size += block::block_size(bytes, prev);
        bp = prev;
    }

    block::stamp(bytes, bp, size, false);
    free_list::insert(bytes, bp);

    bp
}

/// Returns the block size needed to serve a request: payload rounded up to alignment, plus the
/// header + footer overhead, never below the minimum block size.
///
/// Returns None if the request is too large for any block size to hold; such a request can never
/// be served, so callers treat it as exhaustion.
pub(crate) fn adjust(size: usize) -> Option<usize> {
    debug_assert!(size > 0);

    ALIGNMENT.checked_round_up(size.max(DSIZE))?.checked_add(DSIZE)
}

/// Returns the first free block able to hold `needed` bytes, if any.
///
/// Classes are scanned from the one covering `needed` upward; within a class, first fit in
/// address order.
pub(crate) fn find_fit(bytes: &[u8], needed: usize) -> Option<usize> {
    for class in free_list::class_of(needed)..NUM_CLASSES {
        for bp in free_list::iterate(bytes, class) {
            if block::block_size(bytes, bp) >= needed {
                return Some(bp);
            }
        }
    }

    None
}

/// Converts the free block at `bp` into an allocated block of `needed` bytes.
///
/// The block is unlinked; if the remainder is at least one minimum block it is split off as a new
/// free block, otherwise the whole block is kept to avoid an unusable sliver.
pub(crate) fn place(bytes: &mut [u8], bp: usize, needed: usize) {
    free_list::remove(bytes, bp);

    let total = block::block_size(bytes, bp);
    debug_assert!(total >= needed, "Placing {} bytes in a {}-byte block", needed, total);

    if total - needed >= MIN_BLOCK {
        block::stamp(bytes, bp, needed, true);

        //  The split tail cannot touch another free block: the successor of a free block is
        //  always allocated.
        let tail = bp + needed;
        block::stamp(bytes, tail, total - needed, false);
        free_list::insert(bytes, tail);
    } else {
        block::stamp(bytes, bp, total, true);
    }
}

/// Allocates a block able to hold `size` payload bytes, returning its address.
///
/// Returns None for a zero request, or on exhaustion.
pub(crate) fn allocate<S: Segment>(segment: &mut S, size: usize) -> Option<usize> {
    if size == 0 {
        return None;
    }

    let needed = adjust(size)?;

    if let Some(bp) = find_fit(segment.bytes(), needed) {
        place(segment.bytes_mut(), bp, needed);
        return Some(bp);
    }

    let bp = extend(segment, needed.max(CHUNK) / WSIZE)?;
    debug_assert!(block::block_size(segment.bytes(), bp) >= needed,
        "Extension too small for {} bytes", needed);

    place(segment.bytes_mut(), bp, needed);

    Some(bp)
}

/// Releases the allocated block at `bp`, merging it with any free neighbor.
pub(crate) fn release(bytes: &mut [u8], bp: usize) {
    debug_assert!(block::block_allocated(bytes, bp), "Releasing a free block: {}", bp);

    let size = block::block_size(bytes, bp);
    block::stamp(bytes, bp, size, false);

    coalesce(bytes, bp);
}

/// Resizes the allocated block at `bp` to hold `size` payload bytes.
///
/// Prefers staying in place: shrinking splits the tail off when it is no sliver, growing absorbs
/// an immediately following free block when large enough. Otherwise falls back to a fresh
/// allocation, copying the payload over and releasing the old block; on exhaustion the original
/// block is left untouched and None returned.
pub(crate) fn resize<S: Segment>(segment: &mut S, bp: usize, size: usize) -> Option<usize> {
    debug_assert!(size > 0);

    let bytes = segment.bytes_mut();

    debug_assert!(block::block_allocated(bytes, bp), "Resizing a free block: {}", bp);

    let needed = adjust(size)?;
    let old = block::block_size(bytes, bp);

    if needed <= old {
        if old - needed >= MIN_BLOCK {
            block::stamp(bytes, bp, needed, true);

            let tail = bp + needed;
            block::stamp(bytes, tail, old - needed, false);
            coalesce(bytes, tail);
        }

        return Some(bp);
    }

    let next = block::next_block(bytes, bp);

    if !block::block_allocated(bytes, next) {
        let combined = old + block::block_size(bytes, next);

        if combined >= needed {
            free_list::remove(bytes, next);

            if combined - needed >= MIN_BLOCK {
                block::stamp(bytes, bp, needed, true);

                let tail = bp + needed;
                block::stamp(bytes, tail, combined - needed, false);
                free_list::insert(bytes, tail);
            } else {
                block::stamp(bytes, bp, combined, true);
            }

            return Some(bp);
        }
    }

    let new_bp = allocate(segment, size)?;

    let bytes = segment.bytes_mut();
    let preserved = (old - DSIZE).min(size);
    bytes.copy_within(bp..bp + preserved, new_bp);

    release(bytes, bp);

    Some(new_bp)
}

#[cfg(test)]
mod tests {

use crate::api::ArraySegment;

use super::*;

//  Large enough for the arena prefix, the initial chunk, and a few extensions.
type TestSegment = ArraySegment<16384>;

fn fresh() -> TestSegment {
    let mut segment = TestSegment::new();
    initialize(&mut segment).expect("Initialized");
    segment
}

#[test]
fn initialize_layout() {
    let segment = fresh();
    let bytes = segment.bytes();

    assert_eq!(FIRST_BLOCK + CHUNK, bytes.len());

    //  Prologue: minimum-size allocated block with matching tags.
    assert_eq!(block::pack(MIN_BLOCK, true), block::load(bytes, block::header_at(PROLOGUE)));
    assert_eq!(block::pack(MIN_BLOCK, true), block::load(bytes, block::footer_at(bytes, PROLOGUE)));

    //  One chunk-sized free block, then the epilogue.
    assert_eq!(CHUNK, block::block_size(bytes, FIRST_BLOCK));
    assert!(!block::block_allocated(bytes, FIRST_BLOCK));
    assert!(block::is_epilogue(bytes, block::next_block(bytes, FIRST_BLOCK)));

    //  The free block is linked in the class covering CHUNK.
    let class = free_list::class_of(CHUNK);
    assert_eq!(Some(FIRST_BLOCK), free_list::iterate(bytes, class).next());
}

#[test]
fn initialize_exhausted() {
    //  Too small for the prefix plus the initial chunk.
    let mut segment = ArraySegment::<256>::new();

    assert_eq!(None, initialize(&mut segment));
}

#[test]
fn adjust_rounds_up() {
    assert_eq!(Some(MIN_BLOCK), adjust(1));
    assert_eq!(Some(MIN_BLOCK), adjust(16));
    assert_eq!(Some(40), adjust(17));
    assert_eq!(Some(40), adjust(24));
    assert_eq!(Some(136), adjust(120));
}

#[test]
fn adjust_rejects_unservable_sizes() {
    //  No block size can hold a payload this large once overhead is added.
    assert_eq!(None, adjust(usize::MAX));
    assert_eq!(None, adjust(usize::MAX - 7));

    //  Representable as a block size; the segment is what turns these down.
    assert!(adjust(usize::MAX - 64).is_some());
    assert!(adjust(1 << 40).is_some());
}

#[test]
fn allocate_zero_is_null() {
    let mut segment = fresh();

    assert_eq!(None, allocate(&mut segment, 0));
}

#[test]
fn allocate_splits_avoiding_slivers() {
    let mut segment = fresh();

    //  8 bytes out of the initial 4096-byte block: split, leaving no sliver.
    let bp = allocate(&mut segment, 8).expect("Fits");
    let bytes = segment.bytes();

    assert_eq!(FIRST_BLOCK, bp);
    assert_eq!(MIN_BLOCK, block::block_size(bytes, bp));

    let tail = block::next_block(bytes, bp);
    assert_eq!(CHUNK - MIN_BLOCK, block::block_size(bytes, tail));
    assert!(!block::block_allocated(bytes, tail));
}

#[test]
fn allocate_keeps_whole_block_when_split_would_sliver() {
    let mut segment = fresh();

    //  Carve a 48-byte free block fenced by allocated neighbors.
    let a = allocate(&mut segment, 32).expect("Fits");
    assert_eq!(48, block::block_size(segment.bytes(), a));

    let _guard = allocate(&mut segment, 8).expect("Fits");
    release(segment.bytes_mut(), a);

    //  40 needed out of 48: the 8-byte remainder is below MIN_BLOCK, no split.
    let b = allocate(&mut segment, 24).expect("Fits");

    assert_eq!(a, b);
    assert_eq!(48, block::block_size(segment.bytes(), b));
}

#[test]
fn allocate_extends_when_no_fit() {
    let mut segment = fresh();
    let before = segment.bytes().len();

    //  Larger than the initial chunk: forces an extension of `needed` bytes.
    let bp = allocate(&mut segment, 8000).expect("Fits");

    assert!(segment.bytes().len() > before);
    assert!(block::block_size(segment.bytes(), bp) >= adjust(8000).expect("Adjustable"));
}

#[test]
fn allocate_exhaustion_is_local() {
    let mut segment = fresh();

    //  Far beyond the segment capacity.
    assert_eq!(None, allocate(&mut segment, 1 << 20));

    //  The failure left the heap fully usable.
    let bp = allocate(&mut segment, 64).expect("Fits");
    assert!(block::block_allocated(segment.bytes(), bp));
}

#[test]
fn allocate_huge_request_is_null() {
    let mut segment = fresh();

    //  Sizes whose block-size computation would overflow are exhaustion, not a panic.
    assert_eq!(None, allocate(&mut segment, usize::MAX));
    assert_eq!(None, allocate(&mut segment, usize::MAX - 64));

    let bp = allocate(&mut segment, 64).expect("Fits");
    assert!(block::block_allocated(segment.bytes(), bp));
}

#[test]
fn release_coalesces_both_neighbors() {
    let mut segment = fresh();

    let a = allocate(&mut segment, 16).expect("Fits");
    let b = allocate(&mut segment, 16).expect("Fits");
    let c = allocate(&mut segment, 16).expect("Fits");
    let _guard = allocate(&mut segment, 16).expect("Fits");

    release(segment.bytes_mut(), a);
    release(segment.bytes_mut(), c);

    //  Releasing b merges a, b and c into a single 96-byte free block at a.
    release(segment.bytes_mut(), b);

    let bytes = segment.bytes();
    assert!(!block::block_allocated(bytes, a));
    assert_eq!(3 * MIN_BLOCK, block::block_size(bytes, a));
}

#[test]
fn extend_coalesces_with_trailing_free_block() {
    let mut segment = fresh();

    //  Consume the whole initial chunk, then free the tail end of it.
    let _head = allocate(&mut segment, CHUNK - MIN_BLOCK - DSIZE).expect("Fits");
    let tail = allocate(&mut segment, 16).expect("Fits");
    assert!(block::is_epilogue(segment.bytes(), block::next_block(segment.bytes(), tail)));

    release(segment.bytes_mut(), tail);

    let bp = extend(&mut segment, CHUNK / WSIZE).expect("Grown");

    //  The fresh region merged with the trailing free block.
    assert_eq!(tail, bp);
    assert_eq!(MIN_BLOCK + CHUNK, block::block_size(segment.bytes(), bp));
}

#[test]
fn resize_shrinks_in_place() {
    let mut segment = fresh();

    let bp = allocate(&mut segment, 200).expect("Fits");
    let _guard = allocate(&mut segment, 16).expect("Fits");

    let shrunk = resize(&mut segment, bp, 40).expect("Fits");

    assert_eq!(bp, shrunk);
    assert_eq!(Some(block::block_size(segment.bytes(), bp)), adjust(40));

    //  The tail went back to the free list.
    assert!(!block::block_allocated(segment.bytes(), block::next_block(segment.bytes(), bp)));
}

#[test]
fn resize_grows_in_place() {
    let mut segment = fresh();

    let a = allocate(&mut segment, 64).expect("Fits");
    let b = allocate(&mut segment, 64).expect("Fits");
    let _guard = allocate(&mut segment, 16).expect("Fits");

    release(segment.bytes_mut(), b);

    let grown = resize(&mut segment, a, 100).expect("Fits");

    assert_eq!(a, grown);
    assert!(block::block_size(segment.bytes(), a) >= adjust(100).expect("Adjustable"));
}

#[test]
fn resize_falls_back_to_copy() {
    let mut segment = fresh();

    let a = allocate(&mut segment, 24).expect("Fits");
    let _guard = allocate(&mut segment, 24).expect("Fits");

    for (i, byte) in segment.bytes_mut()[a..a + 24].iter_mut().enumerate() {
        *byte = i as u8;
    }

    let moved = resize(&mut segment, a, 200).expect("Fits");

    assert_ne!(a, moved);

    let bytes = segment.bytes();
    for i in 0..24 {
        assert_eq!(i as u8, bytes[moved + i]);
    }

    //  The old block was released and coalesced away or reusable.
    assert!(!block::block_allocated(bytes, a));
}

#[test]
fn resize_exhaustion_leaves_block_untouched() {
    let mut segment = fresh();

    let a = allocate(&mut segment, 24).expect("Fits");
    let _guard = allocate(&mut segment, 24).expect("Fits");

    segment.bytes_mut()[a] = 0xfe;

    assert_eq!(None, resize(&mut segment, a, 1 << 20));
    assert_eq!(None, resize(&mut segment, a, usize::MAX));

    let bytes = segment.bytes();
    assert!(block::block_allocated(bytes, a));
    assert_eq!(Some(block::block_size(bytes, a)), adjust(24));
    assert_eq!(0xfe, bytes[a]);
}

} // mod tests
