//! Run results and engine errors.

use thiserror::Error;

use crate::core::types::Position;

/// Fatal reasons a run ends in failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    #[error("Collision detected at {target}")]
    CollisionDetected { target: Position },
    #[error("While loop exceeded maximum iterations ({limit})")]
    LoopLimitExceeded { limit: u32 },
    #[error("Call depth limit ({limit}) exceeded calling '{function}'")]
    CallDepthExceeded { function: String, limit: usize },
    #[error("Goal not reached")]
    GoalNotReached,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure(RunFailure),
    Aborted,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunOutcome::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Requests the engine rejects without starting a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("a program is already running")]
    AlreadyRunning,
    #[error("no instructions to execute")]
    EmptyProgram,
}
