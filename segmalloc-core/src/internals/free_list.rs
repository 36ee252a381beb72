//! The segregated free list.
//!
//! Free blocks are organized in NUM_CLASSES circular doubly linked lists, one per size class. The
//! links live inside the free blocks themselves: the first payload word holds the successor, the
//! second the predecessor, both stored as byte offsets from the arena base rather than pointers.
//!
//! Each class has a fixed sentinel node in the arena prefix, at `class * DSIZE`; an empty class is
//! a sentinel linked to itself. Sentinels carry no boundary tags and are recognizable by their
//! address, which is always below the sentinel region's end.
//!
//! Class 0 covers exactly the minimum block size; class k in between covers sizes in
//! `(MIN_BLOCK << (k - 1), MIN_BLOCK << k]`; the last class is unbounded above CLASS_CEILING.
//! Within a class, members are kept in strictly increasing address order.

use super::block::{self, CLASS_CEILING, DSIZE, MIN_BLOCK, NUM_CLASSES, SENTINELS, WSIZE};

/// Returns the sentinel node of a class.
pub(crate) fn sentinel(class: usize) -> usize {
    debug_assert!(class < NUM_CLASSES, "No such class: {}", class);

    class * DSIZE
}

/// Returns whether a node is a class sentinel, rather than a free block.
pub(crate) fn is_sentinel(node: usize) -> bool { node < SENTINELS }

/// Returns the class covering a block size.
///
/// The size must be a multiple of 8 and at least MIN_BLOCK.
pub(crate) fn class_of(size: usize) -> usize {
    debug_assert!(size >= MIN_BLOCK && size % WSIZE == 0, "Not a block size: {}", size);

    if size > CLASS_CEILING {
        return NUM_CLASSES - 1;
    }

    //  Highest set bit of (size in words - 1); minimum blocks land on 1, hence the shift down.
    let words = size / WSIZE;
    let highest = usize::BITS - 1 - (words - 1).leading_zeros();

    highest as usize - 1
}

/// Links every sentinel to itself, emptying all classes.
pub(crate) fn initialize(bytes: &mut [u8]) {
    for class in 0..NUM_CLASSES {
        let node = sentinel(class);

        set_succ(bytes, node, node);
        set_pred(bytes, node, node);
    }
}

/// Links a free block into the class covering its size, in address order.
///
/// The block must be marked free and not currently belong to any class.
pub(crate) fn insert(bytes: &mut [u8], bp: usize) {
    debug_assert!(!block::block_allocated(bytes, bp), "Inserting an allocated block: {}", bp);

    let head = sentinel(class_of(block::block_size(bytes, bp)));

    //  First member whose address exceeds bp, or the sentinel again if none does.
    let mut cursor = succ(bytes, head);
    while cursor != head && cursor < bp {
        cursor = succ(bytes, cursor);
    }

    let before = pred(bytes, cursor);

    set_succ(bytes, before, bp);
    set_pred(bytes, bp, before);
    set_succ(bytes, bp, cursor);
    set_pred(bytes, cursor, bp);
}

/// Unlinks a free block from its class.
///
/// The block must currently be a non-sentinel member of some class.
pub(crate) fn remove(bytes: &mut [u8], bp: usize) {
    debug_assert!(!is_sentinel(bp), "Removing a sentinel: {}", bp);

    let before = pred(bytes, bp);
    let after = succ(bytes, bp);

    debug_assert!(succ(bytes, before) == bp && pred(bytes, after) == bp,
        "Removing an unlinked block: {}", bp);

    set_succ(bytes, before, after);
    set_pred(bytes, after, before);
}

/// Returns an iterator over the members of a class, in list order.
pub(crate) fn iterate(bytes: &[u8], class: usize) -> ClassIterator<'_> {
    let head = sentinel(class);

    ClassIterator { bytes, head, cursor: succ(bytes, head) }
}

/// Lazy traversal of one class, from its sentinel around the circle and back.
pub(crate) struct ClassIterator<'a> {
    bytes: &'a [u8],
    head: usize,
    cursor: usize,
}

impl<'a> Iterator for ClassIterator<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == self.head {
            return None;
        }

        let result = self.cursor;
        self.cursor = succ(self.bytes, self.cursor);

        Some(result)
    }
}

/// Returns the successor of a node.
pub(crate) fn succ(bytes: &[u8], node: usize) -> usize { block::load(bytes, node) }

/// Returns the predecessor of a node.
pub(crate) fn pred(bytes: &[u8], node: usize) -> usize { block::load(bytes, node + WSIZE) }

fn set_succ(bytes: &mut [u8], node: usize, target: usize) { block::store(bytes, node, target); }

fn set_pred(bytes: &mut [u8], node: usize, target: usize) {
    block::store(bytes, node + WSIZE, target);
}
