use anyhow::{bail, Result};

use super::action::Direction;
use super::snake::Position;

/// Read-only geometry and reward view over a contribution calendar, plus
/// the mutation needed to consume eaten cells.
///
/// Cells are stored flat in calendar order. The calendar's first week may
/// start mid-week, so a position maps to `week * 7 + day - first_day_offset`;
/// positions before the offset (or past the last stored cell) do not exist
/// and count as out of bounds.
#[derive(Debug, Clone)]
pub struct Board {
    total_weeks: usize,
    first_day_offset: usize,
    cells: Vec<u32>,
    initial: Vec<u32>,
    remaining_reward_cells: usize,
}

/// Days per calendar column.
pub const DAYS_PER_WEEK: usize = 7;

impl Board {
    /// Build a board from calendar-ordered cell counts.
    ///
    /// Fails fast on a zero-sized board, an offset outside the week, or a
    /// cell vector that does not fit the grid.
    pub fn new(total_weeks: usize, first_day_offset: usize, cells: Vec<u32>) -> Result<Self> {
        if total_weeks == 0 {
            bail!("board must span at least one week");
        }
        if first_day_offset >= DAYS_PER_WEEK {
            bail!(
                "first day offset must be within a week, got {}",
                first_day_offset
            );
        }
        if cells.is_empty() {
            bail!("board must contain at least one cell");
        }
        if first_day_offset + cells.len() > total_weeks * DAYS_PER_WEEK {
            bail!(
                "{} cells with offset {} exceed a {}-week calendar",
                cells.len(),
                first_day_offset,
                total_weeks
            );
        }

        let remaining_reward_cells = cells.iter().filter(|&&c| c > 0).count();
        let initial = cells.clone();
        Ok(Self {
            total_weeks,
            first_day_offset,
            cells,
            initial,
            remaining_reward_cells,
        })
    }

    pub fn total_weeks(&self) -> usize {
        self.total_weeks
    }

    pub fn first_day_offset(&self) -> usize {
        self.first_day_offset
    }

    /// Current cell counts in calendar order.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    fn flat_index(&self, pos: Position) -> Option<usize> {
        if pos.week < 0
            || pos.week >= self.total_weeks as i32
            || pos.day < 0
            || pos.day >= DAYS_PER_WEEK as i32
        {
            return None;
        }
        let index =
            pos.week as i64 * DAYS_PER_WEEK as i64 + pos.day as i64 - self.first_day_offset as i64;
        if index < 0 || index >= self.cells.len() as i64 {
            return None;
        }
        Some(index as usize)
    }

    /// Whether `pos` addresses an existing calendar cell.
    pub fn in_bounds(&self, pos: Position) -> bool {
        self.flat_index(pos).is_some()
    }

    /// Reward count at `pos`; 0 when out of range or empty.
    pub fn reward(&self, pos: Position) -> u32 {
        self.flat_index(pos).map_or(0, |i| self.cells[i])
    }

    /// In-bounds neighbors of `pos` in canonical right/left/down/up order.
    pub fn neighbors(&self, pos: Position) -> Vec<Position> {
        Direction::ALL
            .iter()
            .map(|d| pos.step(*d))
            .filter(|p| self.in_bounds(*p))
            .collect()
    }

    /// Whether `pos` is covered by any body segment.
    pub fn is_occupied(&self, pos: Position, body: &[Position]) -> bool {
        body.contains(&pos)
    }

    /// Fraction of the four neighbor slots of `pos` that are in bounds and
    /// unoccupied. Out-of-bounds neighbors count against the score.
    pub fn safety(&self, pos: Position, body: &[Position]) -> f64 {
        self.open_neighbors(pos, body) as f64 / Direction::ALL.len() as f64
    }

    /// A dead end has at most one open neighbor.
    pub fn is_dead_end(&self, pos: Position, body: &[Position]) -> bool {
        self.open_neighbors(pos, body) <= 1
    }

    fn open_neighbors(&self, pos: Position, body: &[Position]) -> usize {
        self.neighbors(pos)
            .into_iter()
            .filter(|p| !self.is_occupied(*p, body))
            .count()
    }

    /// Nearest cell with a nonzero reward by Manhattan distance, scanning
    /// week-major so equidistant candidates resolve deterministically to the
    /// first one found.
    pub fn nearest_reward(&self, from: Position) -> Option<Position> {
        let mut nearest = None;
        let mut min_distance = i32::MAX;

        for week in 0..self.total_weeks as i32 {
            for day in 0..DAYS_PER_WEEK as i32 {
                let pos = Position::new(week, day);
                if self.reward(pos) == 0 {
                    continue;
                }
                let distance = from.manhattan(pos);
                if distance < min_distance {
                    min_distance = distance;
                    nearest = Some(pos);
                }
            }
        }

        nearest
    }

    /// Zero out the cell at `pos`, returning the count it held.
    pub fn consume(&mut self, pos: Position) -> u32 {
        match self.flat_index(pos) {
            Some(index) if self.cells[index] > 0 => {
                let count = self.cells[index];
                self.cells[index] = 0;
                self.remaining_reward_cells -= 1;
                count
            }
            _ => 0,
        }
    }

    /// Number of reward cells not yet consumed.
    pub fn remaining_rewards(&self) -> usize {
        self.remaining_reward_cells
    }

    /// Number of reward cells the board started with.
    pub fn total_rewards(&self) -> usize {
        self.initial.iter().filter(|&&c| c > 0).count()
    }

    /// True once every reward cell is consumed, or the board never had any.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_reward_cells == 0
    }

    /// Restore every cell to its initial count.
    pub fn restore_all(&mut self) {
        self.cells.copy_from_slice(&self.initial);
        self.remaining_reward_cells = self.total_rewards();
    }

    /// First existing cell in week-major scan order; the episode start cell.
    pub fn first_free_cell(&self) -> Position {
        // A non-empty cell vector guarantees the offset cell of week 0 exists.
        Position::new(0, self.first_day_offset as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(weeks: usize, offset: usize, cells: Vec<u32>) -> Board {
        Board::new(weeks, offset, cells).unwrap()
    }

    fn empty_board(weeks: usize) -> Board {
        board(weeks, 0, vec![0; weeks * DAYS_PER_WEEK])
    }

    #[test]
    fn test_construction_rejects_degenerate_boards() {
        assert!(Board::new(0, 0, vec![1]).is_err());
        assert!(Board::new(1, 7, vec![1]).is_err());
        assert!(Board::new(1, 0, vec![]).is_err());
        assert!(Board::new(1, 3, vec![0; 5]).is_err());
    }

    #[test]
    fn test_bounds_with_offset() {
        let board = board(2, 3, vec![0; 11]);

        assert!(!board.in_bounds(Position::new(0, 0)));
        assert!(!board.in_bounds(Position::new(0, 2)));
        assert!(board.in_bounds(Position::new(0, 3)));
        assert!(board.in_bounds(Position::new(1, 6)));
        assert!(!board.in_bounds(Position::new(2, 0)));
        assert!(!board.in_bounds(Position::new(-1, 0)));
        assert!(!board.in_bounds(Position::new(0, 7)));
    }

    #[test]
    fn test_reward_lookup() {
        let mut cells = vec![0; 14];
        cells[3] = 4; // week 0, day 3
        let board = board(2, 0, cells);

        assert_eq!(board.reward(Position::new(0, 3)), 4);
        assert_eq!(board.reward(Position::new(0, 2)), 0);
        assert_eq!(board.reward(Position::new(-1, 3)), 0);
    }

    #[test]
    fn test_neighbors_order_and_bounds() {
        let board = empty_board(3);

        // Interior cell: all four, in right/left/down/up order.
        assert_eq!(
            board.neighbors(Position::new(1, 3)),
            vec![
                Position::new(2, 3),
                Position::new(0, 3),
                Position::new(1, 4),
                Position::new(1, 2)
            ]
        );

        // Corner cell: only right and down survive.
        assert_eq!(
            board.neighbors(Position::new(0, 0)),
            vec![Position::new(1, 0), Position::new(0, 1)]
        );
    }

    #[test]
    fn test_safety_counts_walls_as_unsafe() {
        let board = empty_board(3);

        assert_eq!(board.safety(Position::new(1, 3), &[]), 1.0);
        assert_eq!(board.safety(Position::new(0, 0), &[]), 0.5);

        let body = [Position::new(2, 3)];
        assert_eq!(board.safety(Position::new(1, 3), &body), 0.75);
    }

    #[test]
    fn test_dead_end_detection() {
        let board = empty_board(3);

        assert!(!board.is_dead_end(Position::new(0, 0), &[]));

        // Corner with one neighbor blocked leaves a single exit.
        let body = [Position::new(1, 0)];
        assert!(board.is_dead_end(Position::new(0, 0), &body));
    }

    #[test]
    fn test_nearest_reward_first_found_wins() {
        let mut cells = vec![0; 21];
        // Two rewards equidistant from (1, 1): (0, 1) and (1, 0) are both
        // one step away; week-major scan order finds (0, 1) first.
        cells[1] = 1; // week 0, day 1
        cells[7] = 1; // week 1, day 0
        let board = board(3, 0, cells);

        assert_eq!(
            board.nearest_reward(Position::new(1, 1)),
            Some(Position::new(0, 1))
        );
    }

    #[test]
    fn test_nearest_reward_empty_board() {
        assert_eq!(empty_board(2).nearest_reward(Position::new(0, 0)), None);
    }

    #[test]
    fn test_consume_and_exhaustion() {
        let mut cells = vec![0; 14];
        cells[0] = 2;
        cells[5] = 1;
        let mut board = board(2, 0, cells);

        assert_eq!(board.total_rewards(), 2);
        assert_eq!(board.remaining_rewards(), 2);
        assert!(!board.is_exhausted());

        assert_eq!(board.consume(Position::new(0, 0)), 2);
        assert_eq!(board.reward(Position::new(0, 0)), 0);
        assert_eq!(board.consume(Position::new(0, 0)), 0);
        assert_eq!(board.remaining_rewards(), 1);

        assert_eq!(board.consume(Position::new(0, 5)), 1);
        assert!(board.is_exhausted());

        board.restore_all();
        assert_eq!(board.remaining_rewards(), 2);
        assert_eq!(board.reward(Position::new(0, 0)), 2);
    }

    #[test]
    fn test_first_free_cell_honors_offset() {
        assert_eq!(empty_board(2).first_free_cell(), Position::new(0, 0));
        let board = board(2, 4, vec![0; 10]);
        assert_eq!(board.first_free_cell(), Position::new(0, 4));
        assert!(board.in_bounds(board.first_free_cell()));
    }
}
