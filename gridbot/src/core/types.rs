//! Shared deterministic types for the interpreter core.
//!
//! These types define stable contracts between the program model, the world,
//! and the engine. They should not depend on external state or I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the four named integer memory cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Register {
    R1,
    R2,
    R3,
    R4,
}

impl Register {
    pub const ALL: [Register; 4] = [Register::R1, Register::R2, Register::R3, Register::R4];

    pub fn name(self) -> &'static str {
        match self {
            Register::R1 => "R1",
            Register::R2 => "R2",
            Register::R3 => "R3",
            Register::R4 => "R4",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Register::R1 => 0,
            Register::R2 => 1,
            Register::R3 => 2,
            Register::R4 => 3,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown register '{0}' (expected R1, R2, R3 or R4)")]
pub struct UnknownRegisterError(pub String);

impl FromStr for Register {
    type Err = UnknownRegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .into_iter()
            .find(|register| register.name() == s)
            .ok_or_else(|| UnknownRegisterError(s.to_string()))
    }
}

/// Robot heading, in degrees clockwise from "right".
///
/// The grid uses screen coordinates: `y` grows downward, so 90 degrees faces down.
/// Serialized as the raw degree value (`0`, `90`, `180`, `270`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("direction must be one of 0, 90, 180, 270 (got {0})")]
pub struct InvalidDirectionError(pub i64);

impl Direction {
    pub fn degrees(self) -> i64 {
        match self {
            Direction::Right => 0,
            Direction::Down => 90,
            Direction::Left => 180,
            Direction::Up => 270,
        }
    }

    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees {
            0 => Some(Direction::Right),
            90 => Some(Direction::Down),
            180 => Some(Direction::Left),
            270 => Some(Direction::Up),
            _ => None,
        }
    }

    /// Unit vector `(dx, dy)` for this heading.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }

    pub fn turned(self, turn: Turn) -> Self {
        let degrees = (self.degrees() + turn.degrees() + 360) % 360;
        // Cardinal plus a quarter turn is always cardinal.
        Direction::from_degrees(degrees).unwrap_or(self)
    }
}

impl TryFrom<i64> for Direction {
    type Error = InvalidDirectionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Direction::from_degrees(value).ok_or(InvalidDirectionError(value))
    }
}

impl From<Direction> for i64 {
    fn from(direction: Direction) -> Self {
        direction.degrees()
    }
}

/// A quarter turn applied by `TurnLeft` / `TurnRight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Left,
    Right,
}

impl Turn {
    pub fn degrees(self) -> i64 {
        match self {
            Turn::Left => -90,
            Turn::Right => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Turn::Left => "left",
            Turn::Right => "right",
        }
    }
}

/// Grid cell coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, (dx, dy): (i64, i64)) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Severity attached to product log lines delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names_parse_back() {
        for register in Register::ALL {
            assert_eq!(register.name().parse::<Register>(), Ok(register));
        }
        assert!("R5".parse::<Register>().is_err());
        assert!("r1".parse::<Register>().is_err());
    }

    #[test]
    fn direction_delta_table_is_fixed() {
        assert_eq!(Direction::Right.delta(), (1, 0));
        assert_eq!(Direction::Down.delta(), (0, 1));
        assert_eq!(Direction::Left.delta(), (-1, 0));
        assert_eq!(Direction::Up.delta(), (0, -1));
    }

    #[test]
    fn turning_wraps_through_zero() {
        assert_eq!(Direction::Right.turned(Turn::Left), Direction::Up);
        assert_eq!(Direction::Up.turned(Turn::Right), Direction::Right);
        assert_eq!(Direction::Left.turned(Turn::Right), Direction::Up);

        let mut direction = Direction::Right;
        for _ in 0..4 {
            direction = direction.turned(Turn::Right);
        }
        assert_eq!(direction, Direction::Right);
    }

    #[test]
    fn direction_rejects_non_cardinal_degrees() {
        assert_eq!(Direction::try_from(45), Err(InvalidDirectionError(45)));
        assert_eq!(Direction::try_from(360), Err(InvalidDirectionError(360)));
        let parsed: Direction = serde_json::from_str("180").expect("parse");
        assert_eq!(parsed, Direction::Left);
    }
}
