//! Deterministic, pure logic shared by the interpreter.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod condition;
pub mod invariants;
pub mod level;
pub mod program;
pub mod types;
pub mod world;
