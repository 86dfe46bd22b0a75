//! Agent configuration and metrics shared by learning agents

use serde::{Deserialize, Serialize};

/// Configuration common to value-based agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// Batch size for training
    pub batch_size: usize,
    /// Buffer size for experience replay
    pub buffer_size: usize,
    /// Hard target network sync every N environment steps
    pub target_update_freq: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            gamma: 0.99,
            batch_size: 32,
            buffer_size: 10_000,
            target_update_freq: 1_000,
        }
    }
}

impl AgentConfig {
    /// Reject values the learning algorithm cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(crate::RLError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(crate::RLError::Config(format!(
                "gamma must lie in [0, 1], got {}",
                self.gamma
            )));
        }
        if self.batch_size == 0 {
            return Err(crate::RLError::Config("batch_size must be positive".to_string()));
        }
        if self.buffer_size < self.batch_size {
            return Err(crate::RLError::Config(format!(
                "buffer_size ({}) must hold at least one batch ({})",
                self.buffer_size, self.batch_size
            )));
        }
        if self.target_update_freq == 0 {
            return Err(crate::RLError::Config(
                "target_update_freq must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Agent metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Total steps taken
    pub total_steps: u64,
    /// Total episodes
    pub total_episodes: u64,
    /// Current exploration rate
    pub epsilon: f64,
    /// Average score over recent episodes
    pub avg_episode_reward: f64,
    /// Average loss over recent training steps
    pub loss: Option<f32>,
    /// Transitions resident in the replay buffer
    pub buffer_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            AgentConfig { gamma: 1.5, ..AgentConfig::default() },
            AgentConfig { batch_size: 0, ..AgentConfig::default() },
            AgentConfig { buffer_size: 4, batch_size: 8, ..AgentConfig::default() },
            AgentConfig { target_update_freq: 0, ..AgentConfig::default() },
            AgentConfig { learning_rate: f64::NAN, ..AgentConfig::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(crate::RLError::Config(_))));
        }
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AgentConfig = serde_json::from_str(r#"{"batch_size": 64}"#).unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.buffer_size, AgentConfig::default().buffer_size);
    }
}
