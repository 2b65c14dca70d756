//! Safety-aware path search
//!
//! A predicate-ordered priority queue and the A* variant built on it,
//! which weighs distance, local safety and cell rewards and refuses routes
//! through dead ends.

pub mod pathfinder;
pub mod queue;

pub use pathfinder::{best_safe_step, find_path};
pub use queue::PriorityQueue;
