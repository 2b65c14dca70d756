//! Q-learning hyperparameter configuration

use serde::{Deserialize, Serialize};

/// Configuration for the tabular Q-learning agent.
///
/// Default values are the ones the agent was originally tuned with for the
/// contribution-board environment.
///
/// # Example
///
/// ```rust
/// use contrib_snake::rl::QLearningConfig;
///
/// // Use default hyperparameters
/// let config = QLearningConfig::default();
///
/// // Or customize specific parameters
/// let config = QLearningConfig {
///     learning_rate: 0.1,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QLearningConfig {
    /// Learning rate (alpha) for the Bellman update.
    ///
    /// Default: 0.2
    pub learning_rate: f64,

    /// Discount factor (gamma) for future rewards.
    ///
    /// Values closer to 1.0 make the agent more far-sighted.
    ///
    /// Default: 0.9
    pub discount_factor: f64,

    /// Initial exploration rate (epsilon) for epsilon-greedy selection.
    ///
    /// Default: 0.3
    pub exploration_rate: f64,

    /// Lower bound the exploration floor decays toward as training
    /// progresses.
    ///
    /// Default: 0.1
    pub min_exploration_rate: f64,

    /// Multiplicative decay applied while the exploration rate sits above
    /// its current floor.
    ///
    /// Default: 0.995
    pub exploration_decay: f64,

    /// Multiplicative recovery applied while the exploration rate has
    /// fallen below its current floor, so exploration never collapses
    /// permanently.
    ///
    /// Default: 1.05
    pub exploration_recovery: f64,

    /// Number of episodes regarded as one full training cycle when
    /// interpolating the exploration floor.
    ///
    /// Default: 1000
    pub progress_horizon: u64,

    /// Lower bound applied to a restored learning rate.
    ///
    /// Default: 0.1
    pub min_learning_rate: f64,

    /// Lower bound applied to a restored exploration rate, keeping a
    /// long-trained agent from settling into zero exploration.
    ///
    /// Default: 0.15
    pub restored_exploration_floor: f64,

    /// Variance threshold under which the trailing reward window counts as
    /// converged; also bounds the step between consecutive window averages
    /// regarded as stable.
    ///
    /// Default: 0.01
    pub convergence_threshold: f64,

    /// Number of reward-history entries examined by the convergence check.
    ///
    /// Default: 100
    pub convergence_window: usize,

    /// Number of update calls folded into one reward-history entry.
    ///
    /// Default: 10
    pub history_stride: u64,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            discount_factor: 0.9,
            exploration_rate: 0.3,
            min_exploration_rate: 0.1,
            exploration_decay: 0.995,
            exploration_recovery: 1.05,
            progress_horizon: 1000,
            min_learning_rate: 0.1,
            restored_exploration_floor: 0.15,
            convergence_threshold: 0.01,
            convergence_window: 100,
            history_stride: 10,
        }
    }
}

impl QLearningConfig {
    /// Validate configuration parameters.
    ///
    /// # Returns
    ///
    /// `Ok(())` if all parameters are valid, `Err(String)` with an error
    /// message otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.learning_rate <= 0.0 || self.learning_rate > 1.0 {
            return Err(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(format!(
                "discount_factor must be in [0, 1], got {}",
                self.discount_factor
            ));
        }

        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(format!(
                "exploration_rate must be in [0, 1], got {}",
                self.exploration_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.min_exploration_rate) {
            return Err(format!(
                "min_exploration_rate must be in [0, 1], got {}",
                self.min_exploration_rate
            ));
        }

        if self.exploration_decay <= 0.0 || self.exploration_decay >= 1.0 {
            return Err(format!(
                "exploration_decay must be in (0, 1), got {}",
                self.exploration_decay
            ));
        }

        if self.exploration_recovery <= 1.0 {
            return Err(format!(
                "exploration_recovery must exceed 1, got {}",
                self.exploration_recovery
            ));
        }

        if self.progress_horizon == 0 {
            return Err("progress_horizon must be at least 1".to_string());
        }

        if self.min_learning_rate <= 0.0 {
            return Err(format!(
                "min_learning_rate must be positive, got {}",
                self.min_learning_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.restored_exploration_floor) {
            return Err(format!(
                "restored_exploration_floor must be in [0, 1], got {}",
                self.restored_exploration_floor
            ));
        }

        if self.convergence_threshold <= 0.0 {
            return Err(format!(
                "convergence_threshold must be positive, got {}",
                self.convergence_threshold
            ));
        }

        if self.convergence_window == 0 {
            return Err("convergence_window must be at least 1".to_string());
        }

        if self.history_stride == 0 {
            return Err("history_stride must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QLearningConfig::default();
        assert_eq!(config.learning_rate, 0.2);
        assert_eq!(config.discount_factor, 0.9);
        assert_eq!(config.exploration_rate, 0.3);
        assert_eq!(config.min_exploration_rate, 0.1);
        assert_eq!(config.exploration_decay, 0.995);
        assert_eq!(config.history_stride, 10);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(QLearningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_learning_rate_out_of_range() {
        let mut config = QLearningConfig::default();
        config.learning_rate = 0.0;
        assert!(config.validate().is_err());

        config.learning_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_discount_out_of_range() {
        let mut config = QLearningConfig::default();
        config.discount_factor = 1.5;
        assert!(config.validate().is_err());

        config.discount_factor = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_decay_must_shrink() {
        let mut config = QLearningConfig::default();
        config.exploration_decay = 1.0;
        assert!(config.validate().is_err());

        config.exploration_decay = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_recovery_must_grow() {
        let mut config = QLearningConfig::default();
        config.exploration_recovery = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_windows() {
        let mut config = QLearningConfig::default();
        config.convergence_window = 0;
        assert!(config.validate().is_err());

        let mut config = QLearningConfig::default();
        config.history_stride = 0;
        assert!(config.validate().is_err());

        let mut config = QLearningConfig::default();
        config.progress_horizon = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_config() {
        let config = QLearningConfig {
            learning_rate: 0.5,
            exploration_rate: 0.2,
            ..Default::default()
        };
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.discount_factor, 0.9); // From default
        assert!(config.validate().is_ok());
    }
}
