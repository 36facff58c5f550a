//! End-to-end run scenarios: decode a program file, run it through the engine
//! and debugger, and check the world and console afterwards.

use gridbot::core::level::Level;
use gridbot::core::program::{Condition, Instruction, Program};
use gridbot::core::types::{Position, Register, Severity};
use gridbot::core::world::World;
use gridbot::debugger::Debugger;
use gridbot::engine::{
    Engine, EngineConfig, EngineState, RunFailure, RunOptions, RunOutcome, Tick,
};
use gridbot::io::program_file::decode;
use gridbot::looping::drive;
use gridbot::test_support::{RecordingObserver, open_level, run_to_end};

/// Program file for the first level with the obstacle column removed:
/// seven steps right, turn, seven steps down, expressed with a function and
/// nested repeats.
const STAIRCASE: &str = r#"{
  "version": "1.0",
  "level": 1,
  "levelName": "AWAKENING",
  "functions": [
    {"type": "function", "functionName": "walk7", "body": [
      {"type": "repeat", "count": 7, "body": [{"type": "move"}]}
    ]}
  ],
  "mainProgram": [
    {"type": "call", "functionName": "walk7"},
    {"type": "turnRight"},
    {"type": "call", "functionName": "walk7"}
  ],
  "exportDate": "2024-05-01T10:00:00.000Z"
}"#;

fn clear_awakening() -> Level {
    Level {
        obstacles: Vec::new(),
        ..Level::awakening()
    }
}

/// Decoded file → engine → success, with the console showing the full trace.
#[test]
fn decoded_program_reaches_goal() {
    let decoded = decode(STAIRCASE).expect("decode");
    assert!(decoded.warnings.is_empty());

    let mut engine = Engine::new(
        World::from_level(&clear_awakening()),
        EngineConfig::default(),
    );
    let mut observer = RecordingObserver::new();
    engine
        .start(&decoded.file.program, RunOptions::default(), &mut observer)
        .expect("start");
    let outcome = run_to_end(&mut engine, &mut observer);

    assert_eq!(outcome, RunOutcome::Success);
    assert!(engine.world().check_win_condition());
    let moves = observer
        .logs()
        .iter()
        .filter(|line| line.starts_with("  Moved to"))
        .count();
    assert_eq!(moves, 14);
    assert_eq!(
        observer.logs().last().map(String::as_str),
        Some("SUCCESS! Level completed!")
    );
}

/// The same program on the real first level hits the obstacle at (3, 1).
#[test]
fn obstacle_stops_run_mid_function() {
    let decoded = decode(STAIRCASE).expect("decode");
    let mut engine = Engine::new(
        World::from_level(&Level::awakening()),
        EngineConfig::default(),
    );
    let mut observer = RecordingObserver::new();
    engine
        .start(&decoded.file.program, RunOptions::default(), &mut observer)
        .expect("start");

    assert_eq!(
        run_to_end(&mut engine, &mut observer),
        RunOutcome::Failure(RunFailure::CollisionDetected {
            target: Position::new(3, 1)
        })
    );
    assert!(!observer.has_log("turnRight"));
    assert!(!observer.has_log("Function 'walk7' completed"));
    assert_eq!(
        observer.logs_with(Severity::Error).last().map(String::as_str),
        Some("ERROR: Collision detected at (3, 1)")
    );
}

/// Step/continue/reset protocol through the debugger, including a second run
/// after reset starting from the level's initial world.
#[test]
fn step_continue_reset_protocol() {
    let decoded = decode(STAIRCASE).expect("decode");
    let mut debugger = Debugger::new(
        clear_awakening(),
        decoded.file.program,
        EngineConfig::default(),
    );
    let mut observer = RecordingObserver::new();

    // call, repeat, move, move: four pauses, one move applied.
    assert_eq!(
        debugger.start_stepping(&mut observer).expect("start"),
        Tick::AwaitingResume
    );
    for _ in 0..3 {
        assert_eq!(debugger.step(&mut observer), Some(Tick::AwaitingResume));
    }
    assert_eq!(observer.entered(), vec!["call", "repeat", "move", "move"]);
    assert_eq!(
        debugger.engine().world().player().position,
        Position::new(2, 1)
    );

    debugger.reset(&mut observer);
    assert_eq!(debugger.engine().state(), &EngineState::Idle);
    assert_eq!(
        debugger.engine().world().player().position,
        Position::new(1, 1)
    );

    assert_eq!(debugger.step(&mut observer), None);
    debugger
        .start_stepping(&mut observer)
        .expect("restart stepping");
    assert!(debugger.continue_run());
    let tick = drive(debugger.engine_mut(), &mut observer, |_| {});
    assert_eq!(tick, Tick::Finished(RunOutcome::Success));
    assert_eq!(
        observer.outcomes(),
        vec![RunOutcome::Aborted, RunOutcome::Success]
    );
}

/// Cancelling from another handle while paused aborts at the next poll and
/// leaves the world exactly as it was at the pause.
#[test]
fn cancel_from_shared_handle_while_paused() {
    let mut engine = Engine::new(
        World::from_level(&open_level(4, Position::new(3, 0))),
        EngineConfig::default(),
    );
    let handle = engine.cancel_handle();
    let mut observer = RecordingObserver::new();
    let program = Program::new(vec![
        Instruction::SetRegister {
            register: Register::R1,
            value: 4,
        },
        Instruction::Move,
    ]);
    engine
        .start(&program, RunOptions::interactive(), &mut observer)
        .expect("start");
    assert_eq!(engine.poll(&mut observer), Tick::AwaitingResume);
    engine.resume();
    assert_eq!(engine.poll(&mut observer), Tick::AwaitingResume);

    let cancel_thread = std::thread::spawn(move || handle.cancel());
    cancel_thread.join().expect("join");

    assert_eq!(engine.poll(&mut observer), Tick::Finished(RunOutcome::Aborted));
    assert_eq!(engine.world().registers().get(Register::R1), 4);
    assert_eq!(engine.world().player().position, Position::new(0, 0));
}

/// A wall-follower built from `while`/`ifElse` that terminates before the cap.
#[test]
fn wall_follower_reaches_corner() {
    let program = Program::new(vec![
        Instruction::While {
            condition: Some(Condition::not(Condition::GoalAhead)),
            body: vec![Instruction::IfElse {
                condition: Some(Condition::WallAhead),
                if_body: vec![Instruction::TurnRight],
                else_body: vec![Instruction::Move],
            }],
        },
        Instruction::Move,
    ]);
    let mut engine = Engine::new(
        World::from_level(&open_level(5, Position::new(4, 4))),
        EngineConfig::default(),
    );
    let mut observer = RecordingObserver::new();
    engine
        .start(&program, RunOptions::default(), &mut observer)
        .expect("start");

    assert_eq!(run_to_end(&mut engine, &mut observer), RunOutcome::Success);
}
