//! File formats and on-disk state for the interpreter.

pub mod config;
pub mod levels;
pub mod program_file;
