//! Engine → host notifications.
//!
//! # Separation of Concerns
//!
//! - **Observers (this module)**: product output for whoever hosts the engine
//!   (console lines, register display, highlighting). Always delivered.
//! - **Tracing (`logging`)**: dev diagnostics via `RUST_LOG`, output to stderr.

use std::io::Write;

use crate::core::program::Instruction;
use crate::core::types::Severity;
use crate::core::world::{Registers, WorldSnapshot};
use crate::engine::RunOutcome;

/// Receives read-only notifications from a running engine.
///
/// Every method has a no-op default so hosts implement only what they render.
pub trait RunObserver {
    /// A node reached its suspension point; its effect has not been applied yet.
    fn on_instruction_enter(&mut self, _instruction: &Instruction) {}
    fn on_log(&mut self, _message: &str, _severity: Severity) {}
    fn on_register_change(&mut self, _registers: &Registers) {}
    fn on_world_change(&mut self, _world: &WorldSnapshot) {}
    fn on_run_end(&mut self, _outcome: &RunOutcome) {}
}

/// Writes log lines as `> message`, the way the game console shows them.
pub struct ConsoleObserver<W: Write> {
    out: W,
    show_registers: bool,
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_registers: false,
        }
    }

    /// Also print the register bank after every register change.
    pub fn with_registers(mut self) -> Self {
        self.show_registers = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RunObserver for ConsoleObserver<W> {
    fn on_log(&mut self, message: &str, severity: Severity) {
        let prefix = match severity {
            Severity::Warning => "> WARNING: ",
            _ => "> ",
        };
        // Console output is best effort; a closed pipe must not abort a run.
        let _ = writeln!(self.out, "{prefix}{message}");
    }

    fn on_register_change(&mut self, registers: &Registers) {
        if !self.show_registers {
            return;
        }
        let line = registers
            .iter()
            .map(|(register, value)| format!("{register}: {value}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(self.out, "  [{line}]");
    }
}
