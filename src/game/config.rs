use serde::{Deserialize, Serialize};

/// Configuration for the decision loop's growth arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard cap on total body length, head included.
    pub max_body_length: usize,
    /// Segments gained per reward count on an eaten cell.
    pub growth_per_count: usize,
    /// Cap on segments gained from a single cell.
    pub growth_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_body_length: 30,
            growth_per_count: 2,
            growth_cap: 8,
        }
    }
}

impl EngineConfig {
    /// Check that all parameters are in valid ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_body_length == 0 {
            return Err("max_body_length must be at least 1".to_string());
        }
        if self.growth_per_count == 0 {
            return Err("growth_per_count must be at least 1".to_string());
        }
        if self.growth_cap == 0 {
            return Err("growth_cap must be at least 1".to_string());
        }
        Ok(())
    }
}
