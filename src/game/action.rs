use serde::{Deserialize, Serialize};

/// Direction the snake can move.
///
/// The declaration order (right, left, down, up) is the canonical iteration
/// order used for neighbor expansion and for breaking ties between equally
/// valued actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DirectionVector", into = "DirectionVector")]
pub enum Direction {
    Right,
    Left,
    Down,
    Up,
}

/// Wire form of a direction: a unit vector `{x, y}` where `x` moves along
/// weeks and `y` along days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DirectionVector {
    pub x: i32,
    pub y: i32,
}

impl Direction {
    /// All four directions in canonical order.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Down,
        Direction::Up,
    ];

    /// Returns the delta (dw, dd) for moving in this direction, where the
    /// first component moves along weeks and the second along days.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
            Direction::Up => (0, -1),
        }
    }

    /// Canonical index of this direction (0=right, 1=left, 2=down, 3=up).
    pub fn index(&self) -> usize {
        match self {
            Direction::Right => 0,
            Direction::Left => 1,
            Direction::Down => 2,
            Direction::Up => 3,
        }
    }

    /// Inverse of [`Direction::index`].
    pub fn from_index(index: usize) -> Option<Direction> {
        Direction::ALL.get(index).copied()
    }

    /// Direction matching a unit delta, if any.
    pub fn from_delta(dw: i32, dd: i32) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.delta() == (dw, dd))
    }
}

impl From<Direction> for DirectionVector {
    fn from(direction: Direction) -> Self {
        let (x, y) = direction.delta();
        DirectionVector { x, y }
    }
}

impl TryFrom<DirectionVector> for Direction {
    type Error = String;

    fn try_from(vector: DirectionVector) -> Result<Self, Self::Error> {
        Direction::from_delta(vector.x, vector.y)
            .ok_or_else(|| format!("not a unit direction vector: ({}, {})", vector.x, vector.y))
    }
}
