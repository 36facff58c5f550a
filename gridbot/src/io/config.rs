//! Interpreter configuration stored in `gridbot.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

/// Interpreter configuration (TOML).
///
/// Missing fields default to the values the game ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GridbotConfig {
    /// Delay per instruction at speed 1, in milliseconds.
    pub base_delay_ms: u64,

    /// Speed multiplier used when `run` is not given `--speed`.
    pub default_speed: u32,

    /// Maximum nesting of function calls before a run fails.
    pub max_call_depth: usize,

    /// Level catalog location, relative to the working directory.
    pub levels_path: PathBuf,
}

impl Default for GridbotConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            default_speed: 5,
            max_call_depth: 256,
            levels_path: PathBuf::from("levels.json"),
        }
    }
}

impl GridbotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_speed == 0 {
            return Err(anyhow!("default_speed must be > 0"));
        }
        if self.max_call_depth == 0 {
            return Err(anyhow!("max_call_depth must be > 0"));
        }
        if self.levels_path.as_os_str().is_empty() {
            return Err(anyhow!("levels_path must not be empty"));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_call_depth: self.max_call_depth,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GridbotConfig::default()`.
pub fn load_config(path: &Path) -> Result<GridbotConfig> {
    if !path.exists() {
        let cfg = GridbotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GridbotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GridbotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
