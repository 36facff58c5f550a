//! Test-only helpers: scripted randomness, a recording observer and level builders.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::core::condition::RandomSource;
use crate::core::level::{Level, PlayerStart};
use crate::core::program::Instruction;
use crate::core::types::{Direction, Position, Severity};
use crate::core::world::{Registers, WorldSnapshot};
use crate::engine::{Engine, RunOutcome, Tick};
use crate::observer::RunObserver;

/// Returns scripted coin flips in order, then `false` forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    flips: VecDeque<bool>,
}

impl ScriptedRandom {
    pub fn new(flips: Vec<bool>) -> Self {
        Self {
            flips: flips.into(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_bool(&mut self) -> bool {
        self.flips.pop_front().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Enter(Instruction),
    Log(Severity, String),
    Registers(Registers),
    World(WorldSnapshot),
    End(RunOutcome),
}

/// Observer that keeps every notification for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<Event>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type codes of entered nodes, in order.
    pub fn entered(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Enter(instruction) => Some(instruction.kind().to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Log(_, message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn logs_with(&self, severity: Severity) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Log(s, message) if *s == severity => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_log(&self, needle: &str) -> bool {
        self.logs().iter().any(|line| line.contains(needle))
    }

    pub fn outcomes(&self) -> Vec<RunOutcome> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::End(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }
}

impl RunObserver for RecordingObserver {
    fn on_instruction_enter(&mut self, instruction: &Instruction) {
        self.events.push(Event::Enter(instruction.clone()));
    }

    fn on_log(&mut self, message: &str, severity: Severity) {
        self.events.push(Event::Log(severity, message.to_string()));
    }

    fn on_register_change(&mut self, registers: &Registers) {
        self.events.push(Event::Registers(*registers));
    }

    fn on_world_change(&mut self, world: &WorldSnapshot) {
        self.events.push(Event::World(world.clone()));
    }

    fn on_run_end(&mut self, outcome: &RunOutcome) {
        self.events.push(Event::End(outcome.clone()));
    }
}

/// Obstacle-free level with the robot at (0, 0) facing right.
pub fn open_level(grid_size: i64, goal: Position) -> Level {
    Level {
        id: 1,
        name: "OPEN".to_string(),
        grid_size,
        player: PlayerStart {
            x: 0,
            y: 0,
            direction: Direction::Right,
        },
        goal,
        obstacles: Vec::new(),
        description: None,
        hint: None,
    }
}

/// Poll until the run finishes, resuming every interactive pause and skipping delays.
pub fn run_to_end(engine: &mut Engine, observer: &mut dyn RunObserver) -> RunOutcome {
    for _ in 0..1_000_000 {
        match engine.poll(observer) {
            Tick::Finished(outcome) => return outcome,
            Tick::AwaitingResume => {
                engine.resume();
            }
            Tick::Delay(_) => {}
            Tick::Idle => panic!("engine is idle; start a run first"),
        }
    }
    panic!("run did not finish");
}

/// Write `levels` as a catalog file inside a fresh temp dir.
pub fn write_catalog(levels: &[Level]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("levels.json");
    let payload = serde_json::json!({ "levels": levels });
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&payload).expect("serialize catalog"),
    )
    .expect("write catalog");
    (dir, path)
}
