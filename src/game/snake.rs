use serde::{Deserialize, Serialize};

use super::action::Direction;

/// A cell coordinate on the contribution calendar: `week` is the column,
/// `day` the row within the fixed 7-day week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub week: i32,
    pub day: i32,
}

impl Position {
    pub fn new(week: i32, day: i32) -> Self {
        Self { week, day }
    }

    /// The adjacent position one step in `direction`.
    pub fn step(&self, direction: Direction) -> Self {
        let (dw, dd) = direction.delta();
        Self {
            week: self.week + dw,
            day: self.day + dd,
        }
    }

    /// Manhattan distance to another position.
    pub fn manhattan(&self, other: Position) -> i32 {
        (self.week - other.week).abs() + (self.day - other.day).abs()
    }
}

/// The snake: an ordered sequence of positions, head first.
///
/// Growth is deferred: eating raises `target_len`, and the body then gains
/// one segment per move until it catches up. The head is part of the body,
/// so the occupancy checks below cover the whole snake.
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    body: Vec<Position>,
    target_len: usize,
}

impl Snake {
    /// A length-1 snake at the given starting cell.
    pub fn new(start: Position) -> Self {
        Self {
            body: vec![start],
            target_len: 1,
        }
    }

    /// Current head position.
    pub fn head(&self) -> Position {
        self.body[0]
    }

    /// Full body, head first.
    pub fn body(&self) -> &[Position] {
        &self.body
    }

    /// Number of segments currently on the board.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Length the body is growing toward.
    pub fn target_len(&self) -> usize {
        self.target_len
    }

    /// Whether `pos` is covered by any segment, head included.
    pub fn contains(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }

    /// Raise the target length by `amount`, never beyond `max_len`.
    pub fn grow(&mut self, amount: usize, max_len: usize) {
        self.target_len = (self.target_len + amount).min(max_len);
    }

    /// Commit a move: the new head slides in and the tail is trimmed to the
    /// current target length.
    pub fn advance(&mut self, new_head: Position) {
        self.body.insert(0, new_head);
        self.body.truncate(self.target_len);
    }
}
