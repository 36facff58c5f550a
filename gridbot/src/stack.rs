//! Stack growth for recursive walks over program trees.
//!
//! Program files put no bound on nesting, so decoding, encoding and
//! evaluating a tree recurse as deep as the file does. Each recursive step
//! goes through [`ensure_sufficient_stack`], which moves onto a fresh stack
//! segment when the current one runs low.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
