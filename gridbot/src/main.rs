//! Grid-robot program interpreter.
//!
//! Loads a versioned program file, runs it against a level from the catalog
//! (`levels.json`, or the built-in level when missing) and prints the game
//! console to stdout. `debug` drives the same engine one instruction at a time
//! from commands read on stdin.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use gridbot::core::condition::SeededRandom;
use gridbot::core::invariants::validate_program;
use gridbot::core::level::Level;
use gridbot::core::types::Severity;
use gridbot::core::world::World;
use gridbot::debugger::{Debugger, announce_level, announce_next};
use gridbot::engine::{Engine, EngineState, RunOptions, RunOutcome, Tick};
use gridbot::exit_codes;
use gridbot::io::config::{GridbotConfig, load_config};
use gridbot::io::levels::{LevelCatalog, load_catalog_or_builtin};
use gridbot::io::program_file::{Decoded, ProgramFile, load_program_file, write_program_file};
use gridbot::logging;
use gridbot::looping::drive;
use gridbot::observer::{ConsoleObserver, RunObserver};

#[derive(Parser)]
#[command(
    name = "gridbot",
    version,
    about = "Interpreter for grid-robot visual programs"
)]
struct Cli {
    /// Config file (TOML). A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "gridbot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a program file and report structural problems.
    Validate { program: PathBuf },
    /// Run a program to completion against a level.
    Run {
        program: PathBuf,
        /// Level id; defaults to the level stored in the program file.
        #[arg(long)]
        level: Option<u32>,
        /// Speed multiplier (delay per instruction = base delay / speed).
        #[arg(long)]
        speed: Option<u32>,
        /// Skip the delay between instructions.
        #[arg(long)]
        no_delay: bool,
        /// Seed for `randomBoolean`, for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Step through a program; reads step/continue/reset/state/quit from stdin.
    Debug {
        program: PathBuf,
        #[arg(long)]
        level: Option<u32>,
    },
    /// List the levels in the catalog.
    Levels,
    /// Re-export a program file stamped for a level.
    Export {
        program: PathBuf,
        #[arg(long)]
        level: u32,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Validate { program } => cmd_validate(&program),
        Command::Run {
            program,
            level,
            speed,
            no_delay,
            seed,
        } => cmd_run(
            &config,
            &program,
            RunArgs {
                level,
                speed,
                no_delay,
                seed,
            },
        ),
        Command::Debug { program, level } => cmd_debug(&config, &program, level),
        Command::Levels => cmd_levels(&config),
        Command::Export {
            program,
            level,
            out,
        } => cmd_export(&config, &program, level, &out),
    }
}

struct RunArgs {
    level: Option<u32>,
    speed: Option<u32>,
    no_delay: bool,
    seed: Option<u64>,
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let decoded = load_program_file(path)?;
    for warning in &decoded.warnings {
        println!("warning: {warning}");
    }
    let violations = validate_program(&decoded.file.program);
    for violation in &violations {
        println!("error: {violation}");
    }
    if !violations.is_empty() {
        return Ok(exit_codes::INVALID);
    }
    println!(
        "ok: {} function(s), {} main instruction(s)",
        decoded.file.program.functions.len(),
        decoded.file.program.main.len()
    );
    Ok(exit_codes::OK)
}

fn cmd_run(config: &GridbotConfig, path: &Path, args: RunArgs) -> Result<i32> {
    let decoded = load_program_file(path)?;
    let catalog = load_catalog_or_builtin(&config.levels_path);
    let level = pick_level(&catalog, args.level.or(decoded.file.level))?;

    let stdout = io::stdout();
    let mut console = ConsoleObserver::new(stdout.lock()).with_registers();
    announce(&mut console, level, &decoded);

    let mut engine = Engine::new(World::from_level(level), config.engine_config());
    if let Some(seed) = args.seed {
        engine = engine.with_random(SeededRandom::new(seed));
    }
    let options = RunOptions {
        speed: args.speed.unwrap_or(config.default_speed),
        interactive: false,
    };
    if engine
        .start(&decoded.file.program, options, &mut console)
        .is_err()
    {
        return Ok(exit_codes::INVALID);
    }

    let tick = if args.no_delay {
        drive(&mut engine, &mut console, |_| {})
    } else {
        drive(&mut engine, &mut console, thread::sleep)
    };
    match tick {
        Tick::Finished(outcome) => {
            if outcome == RunOutcome::Success {
                announce_next(&catalog, level.id, &mut console);
            }
            Ok(outcome_code(&outcome))
        }
        other => {
            debug!(?other, "run stopped without finishing");
            Ok(exit_codes::ABORTED)
        }
    }
}

fn cmd_debug(config: &GridbotConfig, path: &Path, level: Option<u32>) -> Result<i32> {
    let decoded = load_program_file(path)?;
    let catalog = load_catalog_or_builtin(&config.levels_path);
    let level = pick_level(&catalog, level.or(decoded.file.level))?;

    let stdout = io::stdout();
    let mut console = ConsoleObserver::new(stdout.lock()).with_registers();
    announce(&mut console, level, &decoded);
    let mut debugger = Debugger::new(
        level.clone(),
        decoded.file.program,
        config.engine_config(),
    );

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read command from stdin")?;
        match line.trim() {
            "" => {}
            "step" | "s" => {
                if debugger.engine().is_active() {
                    debugger.step(&mut console);
                } else if let Err(err) = debugger.start_stepping(&mut console) {
                    debug!(%err, "step rejected");
                }
            }
            "continue" | "c" => {
                if debugger.continue_run() {
                    drive(debugger.engine_mut(), &mut console, |_| {});
                } else {
                    console.on_log("Nothing to continue", Severity::Warning);
                }
            }
            "reset" | "r" => debugger.reset(&mut console),
            "state" => {
                let snapshot = debugger.engine().world().snapshot();
                let json = serde_json::to_string(&snapshot).context("serialize world")?;
                console.on_log(&json, Severity::Info);
            }
            "quit" | "q" => break,
            other => console.on_log(&format!("Unknown command: {other}"), Severity::Warning),
        }
        debugger.advance(&catalog, &mut console);
    }

    let code = match debugger.engine().state() {
        EngineState::Completed(outcome) => outcome_code(outcome),
        _ => exit_codes::OK,
    };
    Ok(code)
}

fn cmd_levels(config: &GridbotConfig) -> Result<i32> {
    let catalog = load_catalog_or_builtin(&config.levels_path);
    let mut out = io::stdout().lock();
    for level in &catalog.levels {
        writeln!(
            out,
            "{:02} - {} ({}x{}, {} obstacle(s))",
            level.id,
            level.name,
            level.grid_size,
            level.grid_size,
            level.obstacles.len()
        )
        .context("write level list")?;
    }
    Ok(exit_codes::OK)
}

fn cmd_export(config: &GridbotConfig, path: &Path, level: u32, out: &Path) -> Result<i32> {
    let decoded = load_program_file(path)?;
    let catalog = load_catalog_or_builtin(&config.levels_path);
    let file = ProgramFile::export(decoded.file.program, level, catalog.name_of(level));
    write_program_file(out, &file)?;
    println!("Program exported successfully");
    Ok(exit_codes::OK)
}

fn pick_level(catalog: &LevelCatalog, id: Option<u32>) -> Result<&Level> {
    catalog
        .find_or_first(id.unwrap_or(1))
        .context("level catalog is empty")
}

fn announce(console: &mut dyn RunObserver, level: &Level, decoded: &Decoded) {
    announce_level(level, console);
    for warning in &decoded.warnings {
        console.on_log(warning, Severity::Warning);
    }
}

fn outcome_code(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Success => exit_codes::OK,
        RunOutcome::Failure(_) => exit_codes::FAILED,
        RunOutcome::Aborted => exit_codes::ABORTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_flags() {
        let cli = Cli::parse_from([
            "gridbot",
            "run",
            "prog.json",
            "--level",
            "3",
            "--no-delay",
            "--seed",
            "7",
        ]);
        match cli.command {
            Command::Run {
                program,
                level,
                speed,
                no_delay,
                seed,
            } => {
                assert_eq!(program, PathBuf::from("prog.json"));
                assert_eq!(level, Some(3));
                assert_eq!(speed, None);
                assert!(no_delay);
                assert_eq!(seed, Some(7));
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.config, PathBuf::from("gridbot.toml"));
    }

    #[test]
    fn parse_export_requires_level_and_out() {
        assert!(Cli::try_parse_from(["gridbot", "export", "prog.json"]).is_err());
        let cli = Cli::parse_from([
            "gridbot", "export", "prog.json", "--level", "2", "--out", "o.json",
        ]);
        assert!(matches!(cli.command, Command::Export { level: 2, .. }));
    }

    #[test]
    fn outcome_codes_are_distinct() {
        assert_eq!(outcome_code(&RunOutcome::Success), exit_codes::OK);
        assert_eq!(
            outcome_code(&RunOutcome::Failure(
                gridbot::engine::RunFailure::GoalNotReached
            )),
            exit_codes::FAILED
        );
        assert_eq!(outcome_code(&RunOutcome::Aborted), exit_codes::ABORTED);
    }
}
