//! Tabular Q-learning
//!
//! Provides:
//! - State encoding into a compact, order-independent key
//! - The transition reward model
//! - The Q-learning agent with its exploration schedule
//! - Snapshot persistence with rotation
//! - The learned-mode decision service

pub mod agent;
pub mod config;
pub mod persistence;
pub mod reward;
pub mod service;
pub mod state;

pub use agent::QLearningAgent;
pub use config::QLearningConfig;
pub use persistence::{
    snapshot_timestamp, FileSnapshotStore, LatestPointer, MemorySnapshotStore, SnapshotData,
    SnapshotStats, SnapshotStore,
};
pub use reward::reward;
pub use service::{build_request, DecisionRequest, DecisionResponse, DecisionService};
pub use state::{State, StateKey, MAX_DISTANCE};
