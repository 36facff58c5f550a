//! CLI tests for the `gridbot` binary.
//!
//! Spawns the binary in a temp dir and checks exit codes and console output
//! for run, debug, validate, export and levels.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use gridbot::core::level::Level;
use gridbot::core::program::{Condition, Instruction, Program};
use gridbot::core::types::Position;
use gridbot::exit_codes;
use gridbot::io::config::{GridbotConfig, write_config};
use gridbot::io::program_file::{ProgramFile, load_program_file, write_program_file};
use gridbot::test_support::{open_level, write_catalog};

fn write_program(dir: &Path, name: &str, program: Program) -> PathBuf {
    let path = dir.join(name);
    write_program_file(&path, &ProgramFile::export(program, 1, "AWAKENING"))
        .expect("write program");
    path
}

fn gridbot(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gridbot"));
    command.current_dir(dir);
    command
}

#[test]
fn run_failure_exits_with_failed_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let program = write_program(
        temp.path(),
        "crash.json",
        Program::new(vec![Instruction::Move, Instruction::Move]),
    );

    let output = gridbot(temp.path())
        .args(["run", "--no-delay"])
        .arg(&program)
        .output()
        .expect("gridbot run");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("> Level 1: AWAKENING loaded"));
    assert!(stdout.contains("> EXECUTING PROGRAM..."));
    assert!(stdout.contains("Cannot move - obstacle at (3, 1)"));
}

#[test]
fn run_success_uses_catalog_from_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let level = Level {
        id: 4,
        name: "SHORT HOP".to_string(),
        ..open_level(3, Position::new(2, 0))
    };
    let (_catalog_dir, catalog_path) = write_catalog(&[level]);
    write_config(
        &temp.path().join("gridbot.toml"),
        &GridbotConfig {
            levels_path: catalog_path,
            ..GridbotConfig::default()
        },
    )
    .expect("write config");
    let program = write_program(
        temp.path(),
        "hop.json",
        Program::new(vec![Instruction::Repeat {
            count: 2,
            body: vec![Instruction::Move],
        }]),
    );

    let output = gridbot(temp.path())
        .args(["run", "--no-delay", "--level", "4"])
        .arg(&program)
        .output()
        .expect("gridbot run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("> Level 4: SHORT HOP loaded"));
    assert!(stdout.contains("> SUCCESS! Level completed!"));
    assert!(stdout.contains("> ALL LEVELS COMPLETED! You are THE ONE."));
}

#[test]
fn run_success_announces_next_demo_level() {
    let temp = tempfile::tempdir().expect("tempdir");
    let demos = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos");
    write_config(
        &temp.path().join("gridbot.toml"),
        &GridbotConfig {
            levels_path: demos.join("levels.json"),
            ..GridbotConfig::default()
        },
    )
    .expect("write config");

    let output = gridbot(temp.path())
        .args(["run", "--no-delay"])
        .arg(demos.join("awakening.json"))
        .output()
        .expect("gridbot run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let objective = stdout
        .find("> Objective: Reach the exit node.")
        .expect("objective line");
    let hint = stdout
        .find("> Hint: Repeat blocks save space.")
        .expect("hint line");
    let success = stdout
        .find("> SUCCESS! Level completed!")
        .expect("success line");
    let next = stdout.find("> Level 2: DETOUR loaded").expect("next level");
    assert!(objective < hint && hint < success && success < next);
    assert!(stdout.contains("> Hint: Use wallAhead to decide when to turn."));
    assert!(!stdout.contains("ALL LEVELS COMPLETED"));
}

#[test]
fn run_rejects_unsupported_version() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("future.json");
    fs::write(&path, r#"{"version": "2.0", "mainProgram": []}"#).expect("write");

    let output = gridbot(temp.path())
        .arg("run")
        .arg(&path)
        .output()
        .expect("gridbot run");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported file version 2.0"));
}

#[test]
fn validate_reports_nested_definition() {
    let temp = tempfile::tempdir().expect("tempdir");
    let bad = write_program(
        temp.path(),
        "nested.json",
        Program::new(vec![Instruction::If {
            condition: Some(Condition::True),
            body: vec![Instruction::FunctionDef {
                function_name: "inner".to_string(),
                body: Vec::new(),
            }],
        }]),
    );
    let good = write_program(temp.path(), "good.json", Program::new(vec![Instruction::Move]));

    let status = gridbot(temp.path())
        .arg("validate")
        .arg(&bad)
        .status()
        .expect("validate bad");
    assert_eq!(status.code(), Some(exit_codes::INVALID));

    let status = gridbot(temp.path())
        .arg("validate")
        .arg(&good)
        .status()
        .expect("validate good");
    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn debug_reads_commands_from_stdin() {
    let temp = tempfile::tempdir().expect("tempdir");
    let program = write_program(
        temp.path(),
        "steps.json",
        Program::new(vec![Instruction::TurnLeft, Instruction::Move]),
    );

    let mut child = gridbot(temp.path())
        .arg("debug")
        .arg(&program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn debug");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"step\nstep\nreset\nstep\ncontinue\nquit\n")
        .expect("write commands");
    let output = child.wait_with_output().expect("wait");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("[DEBUG] Paused at: turnLeft").count(), 2);
    assert!(stdout.contains("> Level reset"));
    assert!(stdout.contains("> Execution aborted"));
    assert!(stdout.contains("> Program ended. Goal not reached."));
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
}

#[test]
fn export_restamps_level_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let program = write_program(temp.path(), "in.json", Program::new(vec![Instruction::Move]));
    let out = temp.path().join("out.json");

    let status = gridbot(temp.path())
        .args(["export", "--level", "7", "--out"])
        .arg(&out)
        .arg(&program)
        .status()
        .expect("gridbot export");
    assert_eq!(status.code(), Some(exit_codes::OK));

    let exported = load_program_file(&out).expect("load export").file;
    assert_eq!(exported.level, Some(7));
    assert_eq!(exported.level_name.as_deref(), Some("Unknown"));
    assert_eq!(exported.program.main, vec![Instruction::Move]);
}

#[test]
fn levels_lists_builtin_when_catalog_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = gridbot(temp.path())
        .arg("levels")
        .output()
        .expect("gridbot levels");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("01 - AWAKENING (10x10, 6 obstacle(s))")
    );
}
