//! Level catalog load with schema + invariant validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::core::invariants::validate_level;
use crate::core::level::Level;

const CATALOG_SCHEMA: &str = include_str!("../../schemas/level_catalog.v1.schema.json");

/// Ordered list of levels, as stored in `levels.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCatalog {
    pub levels: Vec<Level>,
}

impl LevelCatalog {
    /// Catalog holding only the built-in first level.
    pub fn builtin() -> Self {
        Self {
            levels: vec![Level::awakening()],
        }
    }

    pub fn get(&self, id: u32) -> Option<&Level> {
        self.levels.iter().find(|level| level.id == id)
    }

    /// The requested level, or the first one when `id` is not in the catalog.
    pub fn find_or_first(&self, id: u32) -> Option<&Level> {
        self.get(id).or_else(|| self.levels.first())
    }

    /// The level listed after `id`, used to advance after a success.
    pub fn next_after(&self, id: u32) -> Option<&Level> {
        let index = self.levels.iter().position(|level| level.id == id)?;
        self.levels.get(index + 1)
    }

    /// Display name for export; `"Unknown"` when the id is not in the catalog.
    pub fn name_of(&self, id: u32) -> &str {
        self.get(id).map_or("Unknown", |level| level.name.as_str())
    }
}

/// Parse and validate catalog text (schema, then per-level invariants).
pub fn parse_catalog(contents: &str) -> Result<LevelCatalog> {
    let value: Value = serde_json::from_str(contents).context("parse level catalog")?;
    validate_schema(&value)?;
    let catalog: LevelCatalog =
        serde_json::from_value(value).context("deserialize level catalog")?;

    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for level in &catalog.levels {
        if !seen.insert(level.id) {
            errors.push(format!("level {}: duplicate id", level.id));
        }
        errors.extend(validate_level(level));
    }
    if !errors.is_empty() {
        bail!("level invariants failed: {}", errors.join("; "));
    }
    Ok(catalog)
}

pub fn load_catalog(path: &Path) -> Result<LevelCatalog> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_catalog(&contents).with_context(|| format!("load {}", path.display()))
}

/// Load the catalog, falling back to the built-in level when it cannot be read.
pub fn load_catalog_or_builtin(path: &Path) -> LevelCatalog {
    match load_catalog(path) {
        Ok(catalog) => {
            info!(path = %path.display(), levels = catalog.levels.len(), "level data loaded");
            catalog
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "failed to load level data; using built-in level"
            );
            LevelCatalog::builtin()
        }
    }
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(CATALOG_SCHEMA).context("parse catalog schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Position;
    use crate::test_support::{open_level, write_catalog};

    fn three_levels() -> Vec<Level> {
        vec![
            Level::awakening(),
            Level {
                id: 2,
                name: "DETOUR".to_string(),
                ..open_level(6, Position::new(5, 5))
            },
            Level {
                id: 5,
                name: "SPIRAL".to_string(),
                ..open_level(8, Position::new(4, 4))
            },
        ]
    }

    #[test]
    fn loads_valid_catalog() {
        let (_dir, path) = write_catalog(&three_levels());
        let catalog = load_catalog(&path).expect("load");
        assert_eq!(catalog.levels.len(), 3);
        assert_eq!(catalog.name_of(2), "DETOUR");
        assert_eq!(catalog.name_of(9), "Unknown");
        assert_eq!(catalog.next_after(2).map(|level| level.id), Some(5));
        assert!(catalog.next_after(5).is_none());
        assert_eq!(catalog.find_or_first(9).map(|level| level.id), Some(1));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let catalog = load_catalog_or_builtin(&temp.path().join("levels.json"));
        assert_eq!(catalog, LevelCatalog::builtin());
        assert_eq!(catalog.levels[0].name, "AWAKENING");
    }

    #[test]
    fn schema_rejects_bad_direction() {
        let text = serde_json::json!({
            "levels": [{
                "id": 1, "name": "X", "gridSize": 4,
                "player": {"x": 0, "y": 0, "direction": 45},
                "goal": {"x": 3, "y": 3}
            }]
        })
        .to_string();
        let err = parse_catalog(&text).expect_err("invalid direction");
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn invariants_reject_goal_outside_grid_and_duplicate_ids() {
        let mut levels = three_levels();
        levels[1].goal = Position::new(6, 0);
        levels[2].id = 1;
        let (_dir, path) = write_catalog(&levels);
        let err = format!("{:#}", load_catalog(&path).expect_err("invalid"));
        assert!(err.contains("goal is outside the grid"));
        assert!(err.contains("duplicate id"));
        assert_eq!(
            load_catalog_or_builtin(&path),
            LevelCatalog::builtin()
        );
    }
}
