//! The API of segmalloc-core.

mod heap;
mod segment;

pub use heap::{Heap, Payload};
pub use segment::{ArraySegment, Segment};

pub use crate::utils::PowerOf2;
