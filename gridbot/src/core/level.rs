//! Level definitions as read from a level catalog.

use serde::{Deserialize, Serialize};

use crate::core::types::{Direction, Position};

/// Starting pose of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStart {
    pub x: i64,
    pub y: i64,
    pub direction: Direction,
}

impl PlayerStart {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// A single puzzle: grid, start pose, goal and fixed obstacles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: u32,
    pub name: String,
    pub grid_size: i64,
    pub player: PlayerStart,
    pub goal: Position,
    #[serde(default)]
    pub obstacles: Vec<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Level {
    /// The built-in first level, used when no catalog can be loaded.
    pub fn awakening() -> Self {
        Self {
            id: 1,
            name: "AWAKENING".to_string(),
            grid_size: 10,
            player: PlayerStart {
                x: 1,
                y: 1,
                direction: Direction::Right,
            },
            goal: Position::new(8, 8),
            obstacles: vec![
                Position::new(3, 1),
                Position::new(3, 2),
                Position::new(3, 3),
                Position::new(6, 5),
                Position::new(6, 6),
                Position::new(6, 7),
            ],
            description: None,
            hint: None,
        }
    }
}
