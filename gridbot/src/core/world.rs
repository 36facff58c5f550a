//! World state: grid, robot pose, goal, obstacles and the register bank.
//!
//! The engine is the only writer of a [`World`] during a run. Observers and the
//! condition evaluator only ever see shared references or [`WorldSnapshot`]s.

use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::core::level::Level;
use crate::core::types::{Direction, Position, Register, Turn};

/// Robot pose. The step vector is always derived from `direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub position: Position,
    pub direction: Direction,
}

impl Player {
    pub fn delta(&self) -> (i64, i64) {
        self.direction.delta()
    }

    /// The cell directly in front of the robot.
    pub fn ahead(&self) -> Position {
        self.position.offset(self.delta())
    }
}

/// The four integer memory cells, zeroed on level load and reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    values: [i64; 4],
}

impl Registers {
    pub fn get(&self, register: Register) -> i64 {
        self.values[register.index()]
    }

    pub fn set(&mut self, register: Register, value: i64) {
        self.values[register.index()] = value;
    }

    /// Add `delta` without clamping to any editor range.
    pub fn add(&mut self, register: Register, delta: i64) -> i64 {
        let slot = &mut self.values[register.index()];
        *slot = slot.saturating_add(delta);
        *slot
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, i64)> + '_ {
        Register::ALL
            .into_iter()
            .map(|register| (register, self.get(register)))
    }
}

impl Serialize for Registers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Register::ALL.len()))?;
        for (register, value) in self.iter() {
            map.serialize_entry(register.name(), &value)?;
        }
        map.end()
    }
}

/// Raised by [`World::move_player`] when the next cell is off-grid or blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("collision detected at {target}")]
pub struct Collision {
    pub target: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    grid_size: i64,
    player: Player,
    goal: Position,
    obstacles: BTreeSet<Position>,
    registers: Registers,
}

impl World {
    pub fn new(
        grid_size: i64,
        player: Player,
        goal: Position,
        obstacles: impl IntoIterator<Item = Position>,
    ) -> Self {
        Self {
            grid_size,
            player,
            goal,
            obstacles: obstacles.into_iter().collect(),
            registers: Registers::default(),
        }
    }

    /// Fresh world for `level` with all registers at zero.
    pub fn from_level(level: &Level) -> Self {
        World::new(
            level.grid_size,
            Player {
                position: level.player.position(),
                direction: level.player.direction,
            },
            level.goal,
            level.obstacles.iter().copied(),
        )
    }

    pub fn grid_size(&self) -> i64 {
        self.grid_size
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    pub fn obstacles(&self) -> &BTreeSet<Position> {
        &self.obstacles
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// True when `(x, y)` is inside the grid and not an obstacle.
    pub fn is_valid_move(&self, x: i64, y: i64) -> bool {
        if x < 0 || x >= self.grid_size || y < 0 || y >= self.grid_size {
            return false;
        }
        !self.obstacles.contains(&Position::new(x, y))
    }

    pub fn is_wall_ahead(&self) -> bool {
        let ahead = self.player.ahead();
        !self.is_valid_move(ahead.x, ahead.y)
    }

    pub fn is_goal_ahead(&self) -> bool {
        self.player.ahead() == self.goal
    }

    /// Step one cell forward, or report the blocked target cell.
    pub fn move_player(&mut self) -> Result<Position, Collision> {
        let target = self.player.ahead();
        if !self.is_valid_move(target.x, target.y) {
            return Err(Collision { target });
        }
        self.player.position = target;
        Ok(target)
    }

    pub fn turn_player(&mut self, turn: Turn) -> Direction {
        self.player.direction = self.player.direction.turned(turn);
        self.player.direction
    }

    pub fn check_win_condition(&self) -> bool {
        self.player.position == self.goal
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let (dx, dy) = self.player.delta();
        WorldSnapshot {
            grid_size: self.grid_size,
            player: PlayerSnapshot {
                x: self.player.position.x,
                y: self.player.position.y,
                direction: self.player.direction,
                dx,
                dy,
            },
            goal: self.goal,
            obstacles: self.obstacles.iter().copied().collect(),
            registers: self.registers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub x: i64,
    pub y: i64,
    pub direction: Direction,
    pub dx: i64,
    pub dy: i64,
}

/// Read-only view of the world handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub grid_size: i64,
    pub player: PlayerSnapshot,
    pub goal: Position,
    pub obstacles: Vec<Position>,
    pub registers: Registers,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awakening() -> World {
        World::from_level(&Level::awakening())
    }

    #[test]
    fn valid_moves_exclude_bounds_and_obstacles_only() {
        let world = awakening();
        let obstacles: Vec<Position> = world.obstacles().iter().copied().collect();
        for x in -1..=10 {
            for y in -1..=10 {
                let in_bounds = (0..10).contains(&x) && (0..10).contains(&y);
                let blocked = obstacles.contains(&Position::new(x, y));
                assert_eq!(
                    world.is_valid_move(x, y),
                    in_bounds && !blocked,
                    "cell ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn move_into_obstacle_reports_collision_and_keeps_position() {
        let mut world = awakening();
        assert_eq!(world.move_player(), Ok(Position::new(2, 1)));
        assert_eq!(
            world.move_player(),
            Err(Collision {
                target: Position::new(3, 1)
            })
        );
        assert_eq!(world.player().position, Position::new(2, 1));
    }

    #[test]
    fn turning_updates_step_vector() {
        let mut world = awakening();
        world.turn_player(Turn::Right);
        assert_eq!(world.player().delta(), (0, 1));
        world.turn_player(Turn::Left);
        world.turn_player(Turn::Left);
        assert_eq!(world.player().direction, Direction::Up);
        assert_eq!(world.snapshot().player.dy, -1);
    }

    #[test]
    fn registers_start_at_zero_and_are_unclamped() {
        let mut world = awakening();
        assert!(world.registers().iter().all(|(_, value)| value == 0));
        world.registers_mut().set(Register::R3, 99);
        assert_eq!(world.registers_mut().add(Register::R3, 1), 100);
        world.registers_mut().set(Register::R4, -99);
        assert_eq!(world.registers_mut().add(Register::R4, -1), -100);
    }

    #[test]
    fn snapshot_serializes_registers_by_name() {
        let world = awakening();
        let json = serde_json::to_value(world.snapshot()).expect("serialize");
        assert_eq!(json["registers"]["R1"], 0);
        assert_eq!(json["player"]["direction"], 0);
        assert_eq!(json["gridSize"], 10);
    }
}
