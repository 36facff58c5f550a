//! Execution engine: walks a program against a world as a pollable state machine.
//!
//! The engine never blocks and never sleeps. A host loop calls [`Engine::poll`];
//! each call applies the effect of the node that last passed its suspension
//! point, then fetches the next node and stops at that node's suspension point:
//!
//! - interactive runs return [`Tick::AwaitingResume`] until [`Engine::resume`]
//!   delivers exactly one resume,
//! - non-interactive runs return [`Tick::Delay`] and the host decides how to wait.
//!
//! Control flow uses an explicit frame stack instead of recursion, so a paused
//! run is just data and cancellation can unwind it at any node boundary.

mod frame;
mod outcome;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::condition::{RandomSource, ThreadRandom, evaluate as evaluate_condition};
use crate::core::invariants::validate_program;
use crate::core::program::{Condition, FunctionTable, Instruction, Program};
use crate::core::types::{Severity, Turn};
use crate::core::world::World;
use crate::observer::RunObserver;
use frame::{Frame, FrameKind};

pub use outcome::{EngineError, RunFailure, RunOutcome};

/// Hard cap on `While` iterations per loop entry.
pub const LOOP_ITERATION_LIMIT: u32 = 100;

/// Engine settings fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delay per instruction at speed 1; the effective delay is `base_delay / speed`.
    pub base_delay: Duration,
    /// Maximum number of nested `Call` frames.
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_call_depth: 256,
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Speed multiplier; values below 1 are treated as 1.
    pub speed: u32,
    /// Pause at every suspension point until resumed.
    pub interactive: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            speed: 5,
            interactive: false,
        }
    }
}

impl RunOptions {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    pub fn with_speed(speed: u32) -> Self {
        Self {
            speed,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// Suspended in interactive mode, waiting for one resume.
    Paused,
    Completed(RunOutcome),
}

/// What the host should do after a [`Engine::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No run has been started since the last reset.
    Idle,
    /// Interactive suspension; call [`Engine::resume`] before polling again.
    AwaitingResume,
    /// Non-interactive suspension; poll again after this delay.
    Delay(Duration),
    Finished(RunOutcome),
}

/// Shareable cancellation flag, checked at every node and loop boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Why the walk stopped early.
enum Halt {
    Cancelled,
    Failed(RunFailure),
}

impl From<RunFailure> for Halt {
    fn from(failure: RunFailure) -> Self {
        Halt::Failed(failure)
    }
}

pub struct Engine {
    config: EngineConfig,
    world: World,
    random: Box<dyn RandomSource>,
    state: EngineState,
    options: RunOptions,
    functions: FunctionTable,
    frames: Vec<Frame>,
    /// Node that has passed its suspension point and whose effect is next.
    armed: Option<Instruction>,
    cancel: CancelHandle,
}

impl Engine {
    pub fn new(world: World, config: EngineConfig) -> Self {
        Self {
            config,
            world,
            random: Box::new(ThreadRandom),
            state: EngineState::Idle,
            options: RunOptions::default(),
            functions: FunctionTable::default(),
            frames: Vec::new(),
            armed: None,
            cancel: CancelHandle::default(),
        }
    }

    /// Replace the source used by `RandomBoolean`.
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True while a run is `Running` or `Paused`.
    pub fn is_active(&self) -> bool {
        matches!(self.state, EngineState::Running | EngineState::Paused)
    }

    /// Node waiting at its suspension point, for highlighting.
    pub fn pending_instruction(&self) -> Option<&Instruction> {
        self.armed.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Start a run of `program` against the current world.
    ///
    /// The function table is rebuilt from `program.functions` and stays fixed
    /// until the run ends. The world is not reset; use [`Engine::reset`] for that.
    pub fn start(
        &mut self,
        program: &Program,
        options: RunOptions,
        observer: &mut dyn RunObserver,
    ) -> Result<(), EngineError> {
        if self.is_active() {
            warn!("start rejected: run already active");
            notify(observer, Severity::Error, "Program is already running");
            return Err(EngineError::AlreadyRunning);
        }
        if program.is_empty() {
            notify(observer, Severity::Error, "ERROR: No instructions to execute");
            return Err(EngineError::EmptyProgram);
        }

        for violation in validate_program(program) {
            notify(observer, Severity::Warning, &violation);
        }
        self.functions = FunctionTable::from_definitions(&program.functions);
        for name in self.functions.names() {
            notify(observer, Severity::Info, &format!("Function '{name}' defined"));
        }

        self.options = RunOptions {
            speed: options.speed.max(1),
            ..options
        };
        self.cancel.clear();
        self.frames = vec![Frame::block(program.main.clone())];
        self.armed = None;
        self.state = EngineState::Running;
        info!(
            nodes = program.main.len(),
            functions = self.functions.len(),
            interactive = self.options.interactive,
            speed = self.options.speed,
            "run started"
        );
        notify(observer, Severity::Success, "EXECUTING PROGRAM...");
        Ok(())
    }

    /// Advance to the next suspension point or to the end of the run.
    pub fn poll(&mut self, observer: &mut dyn RunObserver) -> Tick {
        match &self.state {
            EngineState::Idle => return Tick::Idle,
            EngineState::Completed(outcome) => return Tick::Finished(outcome.clone()),
            EngineState::Paused if !self.cancel.is_cancelled() => return Tick::AwaitingResume,
            EngineState::Paused | EngineState::Running => {}
        }
        self.state = EngineState::Running;

        match self.advance(observer) {
            Ok(Some(instruction)) => self.suspend(instruction, observer),
            Ok(None) => {
                let outcome = if self.world.check_win_condition() {
                    RunOutcome::Success
                } else {
                    RunOutcome::Failure(RunFailure::GoalNotReached)
                };
                self.finish(outcome, observer)
            }
            Err(Halt::Cancelled) => self.finish(RunOutcome::Aborted, observer),
            Err(Halt::Failed(failure)) => self.finish(RunOutcome::Failure(failure), observer),
        }
    }

    /// Deliver one resume signal. Returns `false` (and does nothing) unless paused.
    pub fn resume(&mut self) -> bool {
        if self.state != EngineState::Paused {
            return false;
        }
        self.state = EngineState::Running;
        true
    }

    /// Toggle suspension at future suspension points of the current run.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.options.interactive = interactive;
    }

    /// Request cancellation; a pending suspension is released so the next poll unwinds.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if self.state == EngineState::Paused {
            self.state = EngineState::Running;
        }
    }

    /// Abort any active run and install `world` (e.g. freshly rebuilt from the level).
    pub fn reset(&mut self, world: World, observer: &mut dyn RunObserver) {
        if self.is_active() {
            self.cancel.cancel();
            self.finish(RunOutcome::Aborted, observer);
        }
        self.world = world;
        self.state = EngineState::Idle;
        self.cancel.clear();
        observer.on_register_change(self.world.registers());
        observer.on_world_change(&self.world.snapshot());
    }

    fn advance(&mut self, observer: &mut dyn RunObserver) -> Result<Option<Instruction>, Halt> {
        self.check_cancelled()?;
        if let Some(instruction) = self.armed.take() {
            self.execute(instruction, observer)?;
        }
        self.next_instruction(observer)
    }

    fn suspend(&mut self, instruction: Instruction, observer: &mut dyn RunObserver) -> Tick {
        debug!(instruction = %instruction, depth = self.frames.len(), "entering instruction");
        observer.on_instruction_enter(&instruction);
        let tick = if self.options.interactive {
            notify(
                observer,
                Severity::Info,
                &format!("[DEBUG] Paused at: {}", instruction.kind()),
            );
            self.state = EngineState::Paused;
            Tick::AwaitingResume
        } else {
            Tick::Delay(self.config.base_delay / self.options.speed)
        };
        self.armed = Some(instruction);
        tick
    }

    fn finish(&mut self, outcome: RunOutcome, observer: &mut dyn RunObserver) -> Tick {
        self.frames.clear();
        self.armed = None;
        match &outcome {
            RunOutcome::Success => notify(observer, Severity::Success, "SUCCESS! Level completed!"),
            RunOutcome::Failure(RunFailure::GoalNotReached) => {
                notify(observer, Severity::Error, "Program ended. Goal not reached.");
            }
            RunOutcome::Failure(failure) => {
                notify(observer, Severity::Error, &format!("ERROR: {failure}"));
            }
            RunOutcome::Aborted => notify(observer, Severity::Warning, "Execution aborted"),
        }
        info!(?outcome, "run finished");
        self.state = EngineState::Completed(outcome.clone());
        observer.on_run_end(&outcome);
        Tick::Finished(outcome)
    }

    fn check_cancelled(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    /// Fetch the next node, unwinding exhausted frames and re-entering loops.
    fn next_instruction(
        &mut self,
        observer: &mut dyn RunObserver,
    ) -> Result<Option<Instruction>, Halt> {
        while let Some(frame) = self.frames.last_mut() {
            if let Some(instruction) = frame.fetch() {
                return Ok(Some(instruction));
            }
            if let Some(frame) = self.frames.pop() {
                self.complete_pass(frame, observer)?;
            }
        }
        Ok(None)
    }

    /// Handle a frame whose body just ran out; loops push themselves back.
    fn complete_pass(
        &mut self,
        mut frame: Frame,
        observer: &mut dyn RunObserver,
    ) -> Result<(), Halt> {
        match &mut frame.kind {
            FrameKind::Block => {}
            FrameKind::Call { function_name } => {
                notify(
                    observer,
                    Severity::Info,
                    &format!("Function '{function_name}' completed"),
                );
            }
            FrameKind::Repeat { completed, total } => {
                *completed += 1;
                if *completed < *total {
                    self.check_cancelled()?;
                    notify(
                        observer,
                        Severity::Info,
                        &format!("  Iteration {}/{}", *completed + 1, total),
                    );
                    frame.restart();
                    self.frames.push(frame);
                }
            }
            FrameKind::While {
                condition,
                iterations,
            } => {
                *iterations += 1;
                if self.loop_head(condition.as_ref(), *iterations, observer)? {
                    frame.restart();
                    self.frames.push(frame);
                }
            }
        }
        Ok(())
    }

    /// Top of a `While` iteration: `iterations` passes have completed so far.
    fn loop_head(
        &mut self,
        condition: Option<&Condition>,
        iterations: u32,
        observer: &mut dyn RunObserver,
    ) -> Result<bool, Halt> {
        self.check_cancelled()?;
        let holds = self.evaluate(condition, observer);
        if iterations >= LOOP_ITERATION_LIMIT {
            warn!(iterations, "while loop hit iteration limit");
            return Err(Halt::Failed(RunFailure::LoopLimitExceeded {
                limit: LOOP_ITERATION_LIMIT,
            }));
        }
        if holds {
            notify(
                observer,
                Severity::Info,
                &format!("WHILE {}: iteration {}", label(condition), iterations + 1),
            );
        }
        Ok(holds)
    }

    fn evaluate(&mut self, condition: Option<&Condition>, observer: &mut dyn RunObserver) -> bool {
        let mut notes = Vec::new();
        let value = evaluate_condition(condition, &self.world, self.random.as_mut(), &mut notes);
        for note in notes {
            notify(observer, note.severity, &note.message);
        }
        value
    }

    fn execute(
        &mut self,
        instruction: Instruction,
        observer: &mut dyn RunObserver,
    ) -> Result<(), Halt> {
        match instruction {
            Instruction::Move => match self.world.move_player() {
                Ok(position) => {
                    notify(observer, Severity::Info, &format!("  Moved to {position}"));
                    observer.on_world_change(&self.world.snapshot());
                }
                Err(collision) => {
                    notify(
                        observer,
                        Severity::Error,
                        &format!("  Cannot move - obstacle at {}", collision.target),
                    );
                    return Err(Halt::Failed(RunFailure::CollisionDetected {
                        target: collision.target,
                    }));
                }
            },
            Instruction::TurnLeft => self.turn(Turn::Left, observer),
            Instruction::TurnRight => self.turn(Turn::Right, observer),
            Instruction::SetRegister { register, value } => {
                self.world.registers_mut().set(register, value);
                notify(observer, Severity::Info, &format!("  {register} = {value}"));
                observer.on_register_change(self.world.registers());
            }
            Instruction::Increment { register } => {
                let now = self.world.registers_mut().add(register, 1);
                notify(observer, Severity::Info, &format!("  {register}++ (now {now})"));
                observer.on_register_change(self.world.registers());
            }
            Instruction::Decrement { register } => {
                let now = self.world.registers_mut().add(register, -1);
                notify(observer, Severity::Info, &format!("  {register}-- (now {now})"));
                observer.on_register_change(self.world.registers());
            }
            Instruction::Repeat { count, body } => {
                let total = u64::try_from(count.max(0)).unwrap_or(0);
                notify(observer, Severity::Info, &format!("Repeating {total} times"));
                if total > 0 && !body.is_empty() {
                    notify(observer, Severity::Info, &format!("  Iteration 1/{total}"));
                    self.frames.push(Frame::repeat(total, body));
                }
            }
            Instruction::If { condition, body } => {
                let holds = self.evaluate(condition.as_ref(), observer);
                notify(
                    observer,
                    Severity::Info,
                    &format!("IF {}: {holds}", label(condition.as_ref())),
                );
                if holds {
                    self.frames.push(Frame::block(body));
                }
            }
            Instruction::IfElse {
                condition,
                if_body,
                else_body,
            } => {
                let holds = self.evaluate(condition.as_ref(), observer);
                notify(
                    observer,
                    Severity::Info,
                    &format!("IF-ELSE {}: {holds}", label(condition.as_ref())),
                );
                if holds {
                    notify(observer, Severity::Info, "  Executing THEN branch");
                    self.frames.push(Frame::block(if_body));
                } else {
                    notify(observer, Severity::Info, "  Executing ELSE branch");
                    self.frames.push(Frame::block(else_body));
                }
            }
            Instruction::While { condition, body } => {
                if condition == Some(Condition::True) {
                    notify(
                        observer,
                        Severity::Info,
                        "WHILE TRUE detected - will run until max iterations or program stops",
                    );
                }
                if self.loop_head(condition.as_ref(), 0, observer)? {
                    self.frames.push(Frame::while_loop(condition, body));
                }
            }
            Instruction::Call { function_name } => self.call(function_name, observer)?,
            Instruction::FunctionDef { function_name, .. } => {
                warn!(%function_name, "nested function definition skipped");
                notify(
                    observer,
                    Severity::Warning,
                    &format!("Function '{function_name}' must be defined at top level - skipping"),
                );
            }
            Instruction::Unknown { kind, .. } => {
                warn!(%kind, "unknown instruction skipped");
                notify(observer, Severity::Warning, &format!("Unknown instruction: {kind}"));
            }
        }
        Ok(())
    }

    fn turn(&mut self, turn: Turn, observer: &mut dyn RunObserver) {
        self.world.turn_player(turn);
        notify(observer, Severity::Info, &format!("  Turned {}", turn.label()));
        observer.on_world_change(&self.world.snapshot());
    }

    fn call(&mut self, function_name: String, observer: &mut dyn RunObserver) -> Result<(), Halt> {
        let Some(body) = self.functions.get(&function_name) else {
            warn!(%function_name, "call to undefined function skipped");
            notify(
                observer,
                Severity::Warning,
                &format!("Function '{function_name}' not defined - skipping call"),
            );
            return Ok(());
        };
        let body = body.to_vec();

        let depth = self.frames.iter().filter(|frame| frame.is_call()).count();
        if depth >= self.config.max_call_depth {
            return Err(Halt::Failed(RunFailure::CallDepthExceeded {
                function: function_name,
                limit: self.config.max_call_depth,
            }));
        }
        notify(
            observer,
            Severity::Info,
            &format!("Calling function '{function_name}'"),
        );
        self.frames.push(Frame::call(function_name, body));
        Ok(())
    }
}

fn label(condition: Option<&Condition>) -> String {
    condition.map_or_else(|| "<empty>".to_string(), ToString::to_string)
}

/// Deliver a product log line and mirror it to tracing.
fn notify(observer: &mut dyn RunObserver, severity: Severity, message: &str) {
    match severity {
        Severity::Warning | Severity::Error => warn!(?severity, "{message}"),
        Severity::Info | Severity::Success => debug!(?severity, "{message}"),
    }
    observer.on_log(message, severity);
}
