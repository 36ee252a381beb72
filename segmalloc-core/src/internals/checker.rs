//! The heap checker.
//!
//! A read-only consistency oracle: it walks every block from the prologue to the epilogue, then
//! every class of the free list, and panics with a diagnostic naming the violated invariant and
//! the caller-supplied label on the first violation found. A violation means the allocator's
//! correctness contract is already broken, so there is no recoverable-error path here.
//!
//! The two walks are cross-checked: the number of free blocks found in the arena must equal the
//! number of members found across all classes, catching both free blocks missing from every list
//! and lists holding phantom members.

use crate::utils;

use super::block::{self, ALIGNMENT, DSIZE, FIRST_BLOCK, MIN_BLOCK, NUM_CLASSES, PROLOGUE, WSIZE};
use super::free_list;

/// Checks every block-chain and free-list invariant, panicking on the first violation.
pub(crate) fn check(bytes: &[u8], label: &str) {
    let free_blocks = check_blocks(bytes, label);
    let members = check_free_lists(bytes, label);

    assert!(free_blocks == members,
        "{}: block walk found {} free blocks, the free lists hold {}", label, free_blocks, members);
}

//  Walks the block chain; returns the number of free blocks seen.
fn check_blocks(bytes: &[u8], label: &str) -> usize {
    let top = bytes.len();

    assert!(utils::is_sufficiently_aligned_for(top, ALIGNMENT),
        "{}: misaligned heap top {}", label, top);

    let prologue_tag = block::pack(MIN_BLOCK, true);
    assert!(block::load(bytes, block::header_at(PROLOGUE)) == prologue_tag,
        "{}: corrupt prologue header", label);
    assert!(block::load(bytes, block::footer_at(bytes, PROLOGUE)) == prologue_tag,
        "{}: corrupt prologue footer", label);

    assert!(block::load(bytes, top - WSIZE) == block::pack(0, true),
        "{}: corrupt epilogue header", label);

    let mut bp = FIRST_BLOCK;
    let mut previous_free = false;
    let mut free_blocks = 0;
    let mut total = 0;

    while !block::is_epilogue(bytes, bp) {
        assert!(utils::is_sufficiently_aligned_for(bp, ALIGNMENT),
            "{}: misaligned block at {}", label, bp);

        let header = block::load(bytes, block::header_at(bp));
        let size = block::size_of(header);

        assert!(size >= MIN_BLOCK, "{}: undersized block at {} ({} bytes)", label, bp, size);
        assert!(bp + size <= top, "{}: block at {} overruns the heap top", label, bp);

        let footer = block::load(bytes, block::footer_at(bytes, bp));
        assert!(header == footer,
            "{}: header/footer mismatch at {} ({:#x} != {:#x})", label, bp, header, footer);

        let free = !block::is_allocated(header);
        assert!(!(free && previous_free), "{}: adjacent free blocks at {}", label, bp);

        if free {
            free_blocks += 1;
        }

        previous_free = free;
        total += size;
        bp += size;
    }

    //  The epilogue header is the last word of the arena.
    assert!(bp == top, "{}: epilogue at {} rather than the heap top {}", label, bp, top);

    //  Conservation: the block extents tile the arena between prologue and epilogue exactly.
    assert!(total == top - FIRST_BLOCK,
        "{}: block sizes sum to {}, expected {}", label, total, top - FIRST_BLOCK);

    free_blocks
}

//  Walks every class; returns the number of members seen across all of them.
fn check_free_lists(bytes: &[u8], label: &str) -> usize {
    let top = bytes.len();
    let mut members = 0;

    for class in 0..NUM_CLASSES {
        let head = free_list::sentinel(class);

        let mut previous = head;
        let mut cursor = free_list::succ(bytes, head);
        let mut steps = 0;

        while cursor != head {
            steps += 1;
            assert!(steps <= top / MIN_BLOCK,
                "{}: free list of class {} does not cycle back", label, class);

            assert!(!free_list::is_sentinel(cursor),
                "{}: free list of class {} strays into the sentinel region at {}",
                label, class, cursor);
            assert!(utils::is_sufficiently_aligned_for(cursor, ALIGNMENT) && cursor + DSIZE <= top,
                "{}: free list of class {} links out of bounds at {}", label, class, cursor);

            assert!(free_list::pred(bytes, cursor) == previous,
                "{}: broken links in class {} at {}", label, class, cursor);

            assert!(!block::block_allocated(bytes, cursor),
                "{}: allocated block {} linked in class {}", label, cursor, class);

            let size = block::block_size(bytes, cursor);
            assert!(free_list::class_of(size) == class,
                "{}: {}-byte block {} linked in class {}", label, size, cursor, class);

            assert!(previous == head || cursor > previous,
                "{}: class {} not address ordered at {}", label, class, cursor);

            members += 1;
            previous = cursor;
            cursor = free_list::succ(bytes, cursor);
        }

        assert!(free_list::pred(bytes, head) == previous,
            "{}: class {} does not close back on its sentinel", label, class);
    }

    members
}

// mod tests
