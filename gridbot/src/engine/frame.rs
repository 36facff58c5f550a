//! Explicit activation records replacing recursive evaluation.

use crate::core::program::{Condition, Instruction};

#[derive(Debug, Clone)]
pub(super) enum FrameKind {
    /// Plain sequence: the main program or a selected `If` branch.
    Block,
    Repeat {
        completed: u64,
        total: u64,
    },
    While {
        condition: Option<Condition>,
        /// Completed passes over the body.
        iterations: u32,
    },
    Call {
        function_name: String,
    },
}

/// A body being walked, with the index of the next node to fetch.
#[derive(Debug, Clone)]
pub(super) struct Frame {
    pub(super) kind: FrameKind,
    body: Vec<Instruction>,
    pc: usize,
}

impl Frame {
    fn new(kind: FrameKind, body: Vec<Instruction>) -> Self {
        Self { kind, body, pc: 0 }
    }

    pub(super) fn block(body: Vec<Instruction>) -> Self {
        Frame::new(FrameKind::Block, body)
    }

    pub(super) fn repeat(total: u64, body: Vec<Instruction>) -> Self {
        Frame::new(
            FrameKind::Repeat {
                completed: 0,
                total,
            },
            body,
        )
    }

    pub(super) fn while_loop(condition: Option<Condition>, body: Vec<Instruction>) -> Self {
        Frame::new(
            FrameKind::While {
                condition,
                iterations: 0,
            },
            body,
        )
    }

    pub(super) fn call(function_name: String, body: Vec<Instruction>) -> Self {
        Frame::new(FrameKind::Call { function_name }, body)
    }

    /// Next node of this pass, or `None` once the body is exhausted.
    pub(super) fn fetch(&mut self) -> Option<Instruction> {
        let instruction = self.body.get(self.pc)?.clone();
        self.pc += 1;
        Some(instruction)
    }

    /// Rewind for another pass over the same body.
    pub(super) fn restart(&mut self) {
        self.pc = 0;
    }

    pub(super) fn is_call(&self) -> bool {
        matches!(self.kind, FrameKind::Call { .. })
    }
}
