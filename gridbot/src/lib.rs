//! Interpreter for grid-robot visual programs.
//!
//! A program is a tree of instructions (moves, turns, register operations,
//! loops, conditionals and calls) that steers a robot across a grid towards a
//! goal. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (program tree, world state,
//!   condition evaluation, invariants). No I/O, fully testable in isolation.
//! - **[`engine`]**: The pollable execution state machine with suspension,
//!   cancellation and loop/recursion limits.
//! - **[`io`]**: Side-effecting operations (program files, level catalog, config).
//!
//! Host-facing modules ([`debugger`], [`looping`], [`observer`]) coordinate the
//! engine with whatever drives it; the `gridbot` binary is one such host.

pub mod core;
pub mod debugger;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod observer;
pub mod stack;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
