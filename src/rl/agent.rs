//! Tabular Q-learning agent
//!
//! Action values live in a single canonical `(state key, action) -> f64`
//! table. Entries appear lazily on first update; anything missing reads as
//! zero, so no lookup can fail. The exploration rate follows a decay
//! schedule with a floor that tightens as training progresses, and recovers
//! multiplicatively if it ever undershoots the floor.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};

use crate::game::Direction;
use crate::metrics::TrainingStats;

use super::config::QLearningConfig;
use super::persistence::{snapshot_timestamp, SnapshotData, SnapshotStats, SnapshotStore};
use super::state::{State, StateKey};

pub struct QLearningAgent {
    config: QLearningConfig,
    q_table: HashMap<(StateKey, Direction), f64>,
    learning_rate: f64,
    discount_factor: f64,
    exploration_rate: f64,
    stats: TrainingStats,
    rng: StdRng,
}

impl QLearningAgent {
    /// Fresh agent with the configured hyperparameters and an empty table.
    pub fn new(config: QLearningConfig) -> Self {
        let stats = TrainingStats::new(
            config.convergence_threshold,
            config.convergence_window,
            config.history_stride,
        );
        Self {
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            exploration_rate: config.exploration_rate,
            q_table: HashMap::new(),
            stats,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Restore the agent from the store's latest snapshot, or start fresh
    /// when nothing usable is there.
    pub fn restore(config: QLearningConfig, store: &dyn SnapshotStore) -> Self {
        match store
            .load()
            .and_then(|data| Self::try_from_snapshot(config.clone(), data))
        {
            Some(agent) => {
                println!(
                    "restored training data: {} states, {} actions, {} updates, exploration {:.3}",
                    agent.state_count(),
                    agent.total_actions(),
                    agent.stats.episode_count(),
                    agent.exploration_rate,
                );
                agent
            }
            None => {
                println!("no usable training data found, starting fresh");
                Self::new(config)
            }
        }
    }

    /// Rebuild an agent from snapshot data.
    ///
    /// Restored hyperparameters are clamped to safe minimums so a
    /// long-trained agent does not resume with near-zero exploration, and
    /// the stability counter is dampened to resume cautiously. A snapshot
    /// with an out-of-range action index is rejected outright.
    pub fn try_from_snapshot(config: QLearningConfig, data: SnapshotData) -> Option<Self> {
        let mut q_table = HashMap::new();
        for (key, actions) in &data.q_table {
            for &(index, value) in actions {
                let action = Direction::from_index(index as usize)?;
                q_table.insert((*key, action), value);
            }
        }

        let stats = TrainingStats::from_parts(
            config.convergence_threshold,
            config.convergence_window,
            config.history_stride,
            data.stats.episode_count,
            data.stats.reward_history.clone(),
            data.stats.convergence_status.stable_episodes.saturating_sub(2),
            data.stats.convergence_status.last_average_reward,
        );

        Some(Self {
            learning_rate: data.learning_rate.max(config.min_learning_rate),
            discount_factor: data.discount_factor,
            exploration_rate: data.exploration_rate.max(config.restored_exploration_floor),
            q_table,
            stats,
            config,
            rng: StdRng::from_entropy(),
        })
    }

    /// Stored action value, zero when never visited.
    pub fn q(&self, key: StateKey, action: Direction) -> f64 {
        self.q_table.get(&(key, action)).copied().unwrap_or(0.0)
    }

    /// Best action value available from a state, zero-defaulting every
    /// unvisited action.
    pub fn max_q(&self, key: StateKey) -> f64 {
        Direction::ALL
            .iter()
            .map(|&action| self.q(key, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Epsilon-greedy action selection.
    ///
    /// With probability epsilon the pick is uniform over `safe_actions`;
    /// otherwise the highest-valued safe action wins, ties resolving to the
    /// earliest candidate (callers pass candidates in canonical
    /// right/left/down/up order). An empty `safe_actions` falls back to a
    /// uniform pick over all four directions; the caller is expected to
    /// treat that situation as a terminal failure upstream.
    pub fn select_action(&mut self, state: &State, safe_actions: &[Direction]) -> Direction {
        if safe_actions.is_empty() || self.rng.gen::<f64>() < self.exploration_rate {
            return self.random_action(safe_actions);
        }

        let key = state.key();
        let mut best = safe_actions[0];
        let mut best_value = self.q(key, best);
        for &action in &safe_actions[1..] {
            let value = self.q(key, action);
            if value > best_value {
                best_value = value;
                best = action;
            }
        }
        best
    }

    fn random_action(&mut self, safe_actions: &[Direction]) -> Direction {
        let pool: &[Direction] = if safe_actions.is_empty() {
            &Direction::ALL
        } else {
            safe_actions
        };
        pool[self.rng.gen_range(0..pool.len())]
    }

    /// Bellman update for one transition, followed by the training
    /// bookkeeping: every completed history stride refreshes the
    /// exploration rate.
    pub fn update(&mut self, state: &State, action: Direction, next_state: &State, reward: f64) {
        let key = state.key();
        let current = self.q(key, action);
        let best_next = self.max_q(next_state.key());
        let updated =
            current + self.learning_rate * (reward + self.discount_factor * best_next - current);
        self.q_table.insert((key, action), updated);

        if self.stats.record(reward) {
            self.update_exploration_rate();
        }
    }

    /// Move the exploration rate toward a floor interpolated against
    /// training progress: early in training the floor sits at the initial
    /// rate, converging linearly on the configured minimum over the
    /// progress horizon. Decay above the floor, recover below it.
    fn update_exploration_rate(&mut self) {
        let progress =
            (self.stats.episode_count() as f64 / self.config.progress_horizon as f64).min(1.0);
        let floor = self.config.min_exploration_rate
            + (self.config.exploration_rate - self.config.min_exploration_rate) * (1.0 - progress);

        if self.exploration_rate > floor {
            self.exploration_rate =
                (self.exploration_rate * self.config.exploration_decay).max(floor);
        } else {
            self.exploration_rate =
                (self.exploration_rate * self.config.exploration_recovery).min(floor);
        }
    }

    /// Whether the trailing reward window has settled.
    pub fn check_convergence(&self) -> bool {
        self.stats.check_convergence()
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Number of distinct states visited.
    pub fn state_count(&self) -> usize {
        self.q_table
            .keys()
            .map(|(key, _)| *key)
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// Number of `(state, action)` entries stored.
    pub fn total_actions(&self) -> usize {
        self.q_table.len()
    }

    /// Serialize the learned state, grouped per state key in a stable
    /// order.
    pub fn snapshot(&self) -> SnapshotData {
        let mut grouped: BTreeMap<StateKey, Vec<(u8, f64)>> = BTreeMap::new();
        for (&(key, action), &value) in &self.q_table {
            grouped
                .entry(key)
                .or_default()
                .push((action.index() as u8, value));
        }
        for actions in grouped.values_mut() {
            actions.sort_by_key(|(index, _)| *index);
        }

        let state_count = grouped.len();
        SnapshotData {
            q_table: grouped.into_iter().collect(),
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            exploration_rate: self.exploration_rate,
            timestamp: snapshot_timestamp(),
            stats: SnapshotStats {
                episode_count: self.stats.episode_count(),
                reward_history: self.stats.reward_history().to_vec(),
                state_count,
                total_actions: self.q_table.len(),
                convergence_status: self.stats.convergence_status(),
            },
        }
    }
}
