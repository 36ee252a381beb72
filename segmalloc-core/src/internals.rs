//! The internals of segmalloc-core.
//!
//! The internals provide all the heavy-lifting.

pub mod block;
pub mod checker;
pub mod free_list;
pub mod ops;
