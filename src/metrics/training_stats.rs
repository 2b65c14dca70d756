//! Training statistics tracking for the Q-learning agent
//!
//! Tracks episode counts, a per-stride reward history, and the stability
//! signals the convergence check and the exploration schedule feed on.

use serde::{Deserialize, Serialize};

/// Convergence summary persisted alongside the Q-table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceStatus {
    /// Consecutive reward-history entries that moved less than the
    /// convergence threshold.
    pub stable_episodes: u32,
    /// Most recent per-stride average reward; `None` until one full stride
    /// has completed.
    pub last_average_reward: Option<f64>,
    /// Whether the trailing reward window's variance is under the threshold.
    pub has_converged: bool,
}

/// Reward bookkeeping for the agent.
///
/// Every update call feeds one reward in; every `stride` calls the trailing
/// mean is pushed into the history, and the stability counters advance.
///
/// # Example
///
/// ```rust
/// use contrib_snake::metrics::TrainingStats;
///
/// let mut stats = TrainingStats::new(0.01, 100, 10);
/// for _ in 0..10 {
///     stats.record(1.0);
/// }
/// assert_eq!(stats.reward_history(), &[1.0]);
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    episode_count: u64,
    window_reward: f64,
    reward_history: Vec<f64>,
    stable_episodes: u32,
    last_average_reward: Option<f64>,
    convergence_threshold: f64,
    convergence_window: usize,
    history_stride: u64,
}

impl TrainingStats {
    pub fn new(convergence_threshold: f64, convergence_window: usize, history_stride: u64) -> Self {
        Self {
            episode_count: 0,
            window_reward: 0.0,
            reward_history: Vec::new(),
            stable_episodes: 0,
            last_average_reward: None,
            convergence_threshold,
            convergence_window,
            history_stride,
        }
    }

    /// Rebuild the tracker from persisted values.
    pub fn from_parts(
        convergence_threshold: f64,
        convergence_window: usize,
        history_stride: u64,
        episode_count: u64,
        reward_history: Vec<f64>,
        stable_episodes: u32,
        last_average_reward: Option<f64>,
    ) -> Self {
        Self {
            episode_count,
            window_reward: 0.0,
            reward_history,
            stable_episodes,
            last_average_reward,
            convergence_threshold,
            convergence_window,
            history_stride,
        }
    }

    /// Feed one reward in.
    ///
    /// Returns `true` when this call completed a stride and pushed a new
    /// entry into the reward history.
    pub fn record(&mut self, reward: f64) -> bool {
        self.episode_count += 1;
        self.window_reward += reward;

        if self.episode_count % self.history_stride != 0 {
            return false;
        }

        let average = self.window_reward / self.history_stride as f64;
        self.reward_history.push(average);
        self.window_reward = 0.0;

        match self.last_average_reward {
            Some(last) if (average - last).abs() < self.convergence_threshold => {
                self.stable_episodes += 1;
            }
            _ => self.stable_episodes = 0,
        }
        self.last_average_reward = Some(average);

        true
    }

    /// Whether the trailing window of reward averages has settled: variance
    /// below the threshold, with at least a full window of history.
    pub fn check_convergence(&self) -> bool {
        if self.reward_history.len() < self.convergence_window {
            return false;
        }

        let recent = &self.reward_history[self.reward_history.len() - self.convergence_window..];
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let variance =
            recent.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / recent.len() as f64;

        variance < self.convergence_threshold
    }

    pub fn episode_count(&self) -> u64 {
        self.episode_count
    }

    pub fn reward_history(&self) -> &[f64] {
        &self.reward_history
    }

    pub fn stable_episodes(&self) -> u32 {
        self.stable_episodes
    }

    pub fn last_average_reward(&self) -> Option<f64> {
        self.last_average_reward
    }

    /// Snapshot of the convergence signals.
    pub fn convergence_status(&self) -> ConvergenceStatus {
        ConvergenceStatus {
            stable_episodes: self.stable_episodes,
            last_average_reward: self.last_average_reward,
            has_converged: self.check_convergence(),
        }
    }

    /// Format a one-line summary of the current statistics.
    pub fn format_summary(&self) -> String {
        format!(
            "Updates: {} | History: {} | Avg: {} | Stable: {} | Converged: {}",
            self.episode_count,
            self.reward_history.len(),
            self.last_average_reward
                .map_or_else(|| "-".to_string(), |r| format!("{:.3}", r)),
            self.stable_episodes,
            self.check_convergence(),
        )
    }
}
