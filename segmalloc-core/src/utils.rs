//! A collection of utilities.

mod power_of_2;

pub use power_of_2::PowerOf2;

/// Returns whether the offset is sufficiently aligned for the given alignment.
pub(crate) fn is_sufficiently_aligned_for(offset: usize, alignment: PowerOf2) -> bool {
    offset % alignment == 0
}
