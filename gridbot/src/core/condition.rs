//! Condition evaluation over world state.
//!
//! Evaluation reads the world and never mutates it. The only impure input is
//! [`Condition::RandomBoolean`], which draws from an injected [`RandomSource`]
//! so tests can script the outcome.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::program::{CompareOp, Condition};
use crate::core::types::Severity;
use crate::core::world::World;
use crate::stack::ensure_sufficient_stack;

/// Source of coin flips for `RandomBoolean`.
pub trait RandomSource {
    fn next_bool(&mut self) -> bool;
}

/// Thread-local generator, the production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_bool(&mut self) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }
}

/// Reproducible generator for replaying a run.
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_bool(&mut self) -> bool {
        self.0.gen_bool(0.5)
    }
}

/// A log line produced while evaluating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub severity: Severity,
    pub message: String,
}

impl Note {
    fn info(message: String) -> Self {
        Self {
            severity: Severity::Info,
            message,
        }
    }

    fn warning(message: String) -> Self {
        Self {
            severity: Severity::Warning,
            message,
        }
    }
}

/// Evaluate an optional condition slot.
///
/// An empty slot evaluates to `false` and records a warning.
pub fn evaluate(
    slot: Option<&Condition>,
    world: &World,
    random: &mut dyn RandomSource,
    notes: &mut Vec<Note>,
) -> bool {
    let Some(condition) = slot else {
        notes.push(Note::warning(
            "condition slot is empty - treating as false".to_string(),
        ));
        return false;
    };

    match condition {
        Condition::WallAhead => world.is_wall_ahead(),
        Condition::GoalAhead => world.is_goal_ahead(),
        Condition::PathClear => !world.is_wall_ahead(),
        Condition::True => true,
        Condition::False => false,
        Condition::RandomBoolean => {
            let result = random.next_bool();
            notes.push(Note::info(format!("  RANDOM? returned {result}")));
            result
        }
        Condition::Not(inner) => {
            let result =
                !ensure_sufficient_stack(|| evaluate(inner.as_deref(), world, random, notes));
            notes.push(Note::info(format!("  {condition}: {result}")));
            result
        }
        Condition::RegisterCompare {
            register,
            op,
            value,
        } => {
            let current = world.registers().get(*register);
            match op {
                CompareOp::Equals => current == *value,
                CompareOp::Greater => current > *value,
            }
        }
        Condition::Unknown { kind, .. } => {
            notes.push(Note::warning(format!(
                "unknown condition '{kind}' - treating as false"
            )));
            false
        }
    }
}
