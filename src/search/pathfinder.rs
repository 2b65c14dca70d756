use std::collections::{HashMap, HashSet};

use crate::game::{Board, Position};

use super::queue::PriorityQueue;

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    pos: Position,
    f: f64,
}

/// Composite step cost of entering `pos` while heading for `target`:
/// distance pulls toward the target, low safety pushes away, reward pulls in.
fn step_heuristic(board: &Board, body: &[Position], pos: Position, target: Position) -> f64 {
    let distance = pos.manhattan(target) as f64;
    let safety = board.safety(pos, body);
    let reward = board.reward(pos) as f64;
    (distance * 2.0 + (1.0 - safety) * 3.0 - reward) / 6.0
}

/// Safety-aware A* from `start` to `target`.
///
/// Returns the positions from the step after `start` through `target`, or
/// `None` when no route survives the safety constraints: occupied cells and
/// dead ends (other than the target itself) are never entered, and a
/// reconstructed route is discarded outright if any position on it turns out
/// to be a dead end.
pub fn find_path(
    start: Position,
    target: Position,
    board: &Board,
    body: &[Position],
) -> Option<Vec<Position>> {
    let mut queue = PriorityQueue::new(|a: &SearchNode, b: &SearchNode| a.f < b.f);
    let mut visited: HashSet<Position> = HashSet::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, f64> = HashMap::new();

    g_score.insert(start, 0.0);
    queue.push(SearchNode {
        pos: start,
        f: start.manhattan(target) as f64,
    });

    while let Some(current) = queue.pop() {
        if current.pos == target {
            let path = reconstruct(&came_from, current.pos);
            // Intermediate positions must not be dead ends; the target is
            // allowed to be one.
            let intermediate = &path[..path.len().saturating_sub(1)];
            if intermediate.iter().any(|&pos| board.is_dead_end(pos, body)) {
                return None;
            }
            return Some(path);
        }

        if !visited.insert(current.pos) {
            continue;
        }

        let mut neighbors = board.neighbors(current.pos);
        neighbors.sort_by(|&a, &b| {
            let safety_a = board.safety(a, body);
            let safety_b = board.safety(b, body);
            safety_b
                .partial_cmp(&safety_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.manhattan(target).cmp(&b.manhattan(target)))
        });

        for neighbor in neighbors {
            if board.is_occupied(neighbor, body) {
                continue;
            }
            if neighbor != target && board.is_dead_end(neighbor, body) {
                continue;
            }

            let tentative_g = g_score.get(&current.pos).copied().unwrap_or(0.0) + 1.0;
            let known_g = g_score.get(&neighbor).copied();
            if known_g.map_or(true, |g| tentative_g < g) {
                came_from.insert(neighbor, current.pos);
                g_score.insert(neighbor, tentative_g);

                let f = tentative_g + step_heuristic(board, body, neighbor, target);
                queue.push(SearchNode { pos: neighbor, f });
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Position, Position>, end: Position) -> Vec<Position> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        current = prev;
        path.push(current);
    }
    // The start cell itself is not part of the route.
    path.pop();
    path.reverse();
    path
}

/// The single best safe step out of `from`, ranked by the same
/// safety/distance/reward weighting the path search uses. The distance term
/// only applies when a target is being pursued. Ties resolve to the first
/// candidate in canonical direction order.
pub fn best_safe_step(
    from: Position,
    target: Option<Position>,
    board: &Board,
    body: &[Position],
) -> Option<Position> {
    let mut best: Option<(Position, f64)> = None;

    for neighbor in board.neighbors(from) {
        if board.is_occupied(neighbor, body) {
            continue;
        }

        let distance = target.map_or(0.0, |t| neighbor.manhattan(t) as f64);
        let safety = board.safety(neighbor, body);
        let reward = board.reward(neighbor) as f64;
        let score = (distance * 2.0 + (1.0 - safety) * 3.0 - reward) / 6.0;

        if best.map_or(true, |(_, s)| score < s) {
            best = Some((neighbor, score));
        }
    }

    best.map(|(pos, _)| pos)
}
