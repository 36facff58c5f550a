//! Step/continue/reset controls layered over the engine.
//!
//! The debugger owns the loaded level and program so that a reset can rebuild
//! the world without losing the program being edited.

use tracing::info;

use crate::core::condition::RandomSource;
use crate::core::level::Level;
use crate::core::program::Program;
use crate::core::types::Severity;
use crate::core::world::World;
use crate::engine::{Engine, EngineConfig, EngineError, EngineState, RunOptions, RunOutcome, Tick};
use crate::io::levels::LevelCatalog;
use crate::observer::RunObserver;

pub const ALL_LEVELS_COMPLETED: &str = "ALL LEVELS COMPLETED! You are THE ONE.";

/// Console lines shown whenever a level is (re)loaded.
pub fn announce_level(level: &Level, observer: &mut dyn RunObserver) {
    observer.on_log(
        &format!("Level {}: {} loaded", level.id, level.name),
        Severity::Success,
    );
    if let Some(description) = &level.description {
        observer.on_log(&format!("Objective: {description}"), Severity::Info);
    }
    if let Some(hint) = &level.hint {
        observer.on_log(&format!("Hint: {hint}"), Severity::Info);
    }
}

/// Announce the level that follows `current` after a success.
///
/// Returns `None` and reports completion when `current` is the last level.
pub fn announce_next<'a>(
    catalog: &'a LevelCatalog,
    current: u32,
    observer: &mut dyn RunObserver,
) -> Option<&'a Level> {
    match catalog.next_after(current) {
        Some(next) => {
            info!(from = current, to = next.id, "advancing to next level");
            announce_level(next, observer);
            Some(next)
        }
        None => {
            info!(level = current, "catalog completed");
            observer.on_log(ALL_LEVELS_COMPLETED, Severity::Success);
            None
        }
    }
}

pub struct Debugger {
    engine: Engine,
    level: Level,
    program: Program,
}

impl Debugger {
    pub fn new(level: Level, program: Program, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(World::from_level(&level), config),
            level,
            program,
        }
    }

    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.engine = self.engine.with_random(random);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Replace the program. Takes effect at the next start.
    pub fn load_program(&mut self, program: Program) {
        self.program = program;
    }

    /// Switch levels, aborting any active run and rebuilding the world.
    pub fn load_level(&mut self, level: Level, observer: &mut dyn RunObserver) {
        info!(level = level.id, name = %level.name, "loading level");
        self.level = level;
        self.engine.reset(World::from_level(&self.level), observer);
        announce_level(&self.level, observer);
    }

    /// After a successful run, load the next level of `catalog`, keeping the
    /// program.
    ///
    /// Returns `false` when the last run did not succeed or when the current
    /// level was the last one (completion is reported instead).
    pub fn advance(&mut self, catalog: &LevelCatalog, observer: &mut dyn RunObserver) -> bool {
        if self.engine.state() != &EngineState::Completed(RunOutcome::Success) {
            return false;
        }
        let Some(next) = catalog.next_after(self.level.id).cloned() else {
            announce_next(catalog, self.level.id, observer);
            return false;
        };
        self.load_level(next, observer);
        true
    }

    /// Start an interactive run and advance to the first suspension point.
    ///
    /// This is what a step request does when no run is active.
    pub fn start_stepping(&mut self, observer: &mut dyn RunObserver) -> Result<Tick, EngineError> {
        self.engine
            .start(&self.program, RunOptions::interactive(), observer)?;
        Ok(self.engine.poll(observer))
    }

    /// Start a non-interactive run; the host drives it with [`crate::looping::drive`].
    pub fn run(&mut self, speed: u32, observer: &mut dyn RunObserver) -> Result<(), EngineError> {
        self.engine.start(
            &self.program,
            RunOptions {
                speed,
                interactive: false,
            },
            observer,
        )
    }

    /// Release exactly one pending suspension and advance to the next one.
    ///
    /// Returns `None` without touching the engine when nothing is paused.
    pub fn step(&mut self, observer: &mut dyn RunObserver) -> Option<Tick> {
        if !self.engine.resume() {
            return None;
        }
        Some(self.engine.poll(observer))
    }

    /// Leave stepping mode and release the current suspension.
    ///
    /// Returns `false` when the engine was not paused.
    pub fn continue_run(&mut self) -> bool {
        if self.engine.state() != &EngineState::Paused {
            return false;
        }
        self.engine.set_interactive(false);
        self.engine.resume()
    }

    /// Abort any run and restore the level's initial world. The program is kept.
    pub fn reset(&mut self, observer: &mut dyn RunObserver) {
        self.engine.reset(World::from_level(&self.level), observer);
        announce_level(&self.level, observer);
        info!(level = self.level.id, "level reset");
        observer.on_log("Level reset", Severity::Info);
    }
}
