//! Compact feature snapshot used as the Q-table lookup key

use serde::{Deserialize, Serialize};

use crate::game::{Board, Direction, Position};

/// Distance values are clipped here; it also stands in for "no reward cell
/// left anywhere".
pub const MAX_DISTANCE: u32 = 10;

/// Derived per-tick snapshot of the agent's surroundings.
///
/// Rebuilt fresh every tick from board and body; never stored beyond the
/// current computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Sign of the week delta toward the nearest reward cell.
    pub dx: i32,
    /// Sign of the day delta toward the nearest reward cell.
    pub dy: i32,
    /// Manhattan distance to the nearest reward cell, clipped to
    /// [`MAX_DISTANCE`].
    pub distance: u32,
    /// Whether each neighbor slot (canonical right/left/down/up order) is a
    /// wall or body segment.
    pub occupancy: [bool; 4],
    /// Current body length, head included.
    pub body_length: u32,
}

/// Stable lookup key for a [`State`].
///
/// Two logically equal states always produce the same key: the key is the
/// fixed-order bit packing below, independent of how the state was built.
///
/// ```text
/// bits 0..2   dx + 1          (0, 1 or 2)
/// bits 2..4   dy + 1
/// bits 4..8   distance        (0..=10)
/// bits 8..12  occupancy       (bit per slot, canonical order)
/// bits 12..17 body length     (1..=30)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateKey(pub u64);

impl State {
    /// Encode the snapshot the agent keys its Q-table on.
    pub fn encode(board: &Board, body: &[Position], head: Position) -> State {
        let (dx, dy, distance) = match board.nearest_reward(head) {
            Some(target) => (
                (target.week - head.week).signum(),
                (target.day - head.day).signum(),
                (head.manhattan(target) as u32).min(MAX_DISTANCE),
            ),
            None => (0, 0, MAX_DISTANCE),
        };

        let mut occupancy = [false; 4];
        for (slot, direction) in Direction::ALL.iter().enumerate() {
            let pos = head.step(*direction);
            occupancy[slot] = !board.in_bounds(pos) || body.contains(&pos);
        }

        State {
            dx,
            dy,
            distance,
            occupancy,
            body_length: body.len() as u32,
        }
    }

    /// Number of neighbor slots that are neither wall nor body.
    pub fn free_neighbors(&self) -> u32 {
        self.occupancy.iter().filter(|occupied| !**occupied).count() as u32
    }

    /// Stable, order-independent key for this state.
    pub fn key(&self) -> StateKey {
        let mut key = (self.dx + 1) as u64;
        key |= ((self.dy + 1) as u64) << 2;
        key |= (self.distance as u64) << 4;
        for (slot, occupied) in self.occupancy.iter().enumerate() {
            if *occupied {
                key |= 1 << (8 + slot);
            }
        }
        key |= (self.body_length as u64) << 12;
        StateKey(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::DAYS_PER_WEEK;

    fn board_with(rewards: &[(usize, u32)], weeks: usize) -> Board {
        let mut cells = vec![0; weeks * DAYS_PER_WEEK];
        for &(index, count) in rewards {
            cells[index] = count;
        }
        Board::new(weeks, 0, cells).unwrap()
    }

    #[test]
    fn test_encode_direction_and_distance() {
        // Reward at week 3, day 5; head at week 1, day 1.
        let board = board_with(&[(3 * 7 + 5, 2)], 5);
        let head = Position::new(1, 1);
        let state = State::encode(&board, &[head], head);

        assert_eq!(state.dx, 1);
        assert_eq!(state.dy, 1);
        assert_eq!(state.distance, 6);
        assert_eq!(state.body_length, 1);
    }

    #[test]
    fn test_encode_clips_distance() {
        let board = board_with(&[(4 * 7 + 6, 1)], 5);
        let head = Position::new(0, 0);
        let state = State::encode(&board, &[head], head);

        // True distance is 10 and anything beyond also reads as 10.
        assert_eq!(state.distance, MAX_DISTANCE);
    }

    #[test]
    fn test_encode_without_rewards() {
        let board = board_with(&[], 3);
        let head = Position::new(1, 1);
        let state = State::encode(&board, &[head], head);

        assert_eq!(state.dx, 0);
        assert_eq!(state.dy, 0);
        assert_eq!(state.distance, MAX_DISTANCE);
    }

    #[test]
    fn test_encode_occupancy_order() {
        let board = board_with(&[], 3);
        let head = Position::new(0, 0);
        // Body blocks the cell below; left and up are walls.
        let body = vec![head, Position::new(0, 1)];
        let state = State::encode(&board, &body, head);

        // right free, left wall, down body, up wall
        assert_eq!(state.occupancy, [false, true, true, true]);
        assert_eq!(state.free_neighbors(), 1);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let board = board_with(&[(10, 1), (16, 1)], 4);
        let head = Position::new(2, 2);
        let body = vec![head, Position::new(1, 2)];

        let a = State::encode(&board, &body, head);
        let b = State::encode(&board, &body, head);
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_distinguishes_fields() {
        let base = State {
            dx: 0,
            dy: 0,
            distance: 5,
            occupancy: [false; 4],
            body_length: 3,
        };

        let mut keys = vec![base.key()];
        for variant in [
            State { dx: 1, ..base },
            State { dy: -1, ..base },
            State {
                distance: 6,
                ..base
            },
            State {
                occupancy: [true, false, false, false],
                ..base
            },
            State {
                occupancy: [false, false, false, true],
                ..base
            },
            State {
                body_length: 4,
                ..base
            },
        ] {
            keys.push(variant.key());
        }

        let unique: std::collections::HashSet<StateKey> = keys.iter().copied().collect();
        assert_eq!(unique.len(), keys.len());
    }
}
