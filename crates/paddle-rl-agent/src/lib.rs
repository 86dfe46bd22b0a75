//! Dueling Double-DQN agent for the paddle-ball trainer
//!
//! This crate provides the learning side of the system:
//! - A fixed-capacity replay buffer with FIFO eviction
//! - A dueling action-value network with its own backward pass
//! - Epsilon-greedy exploration on an exponential schedule
//! - The DQN trainer with a hard-synced target network
//! - The episode loop, training history and checkpoints

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod buffer;
pub mod checkpoint;
pub mod dqn;
pub mod exploration;
pub mod history;
pub mod network;
pub mod optim;

// Re-export agents
pub use agent::{DQNAgent, TrainingContext};
pub use dqn::{bootstrap_targets, double_q_targets, smooth_l1, DQNConfig, DQNTrainer, TrainerStats};

// Re-export utilities
pub use buffer::ReplayBuffer;
pub use checkpoint::{Checkpoint, CHECKPOINT_VERSION};
pub use exploration::{DecayingEpsilon, EpsilonGreedy, EpsilonSchedule, FixedEpsilon};
pub use history::{EpisodeSummary, TrainingHistory};
pub use optim::Adam;

// Re-export network components
pub use network::{combine_dueling, Dense, DuelingNetwork, DuelingParameters, ForwardCache, NetworkConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Checkpoint, DQNAgent, DQNConfig, EpisodeSummary, ReplayBuffer, TrainingHistory,
    };
    pub use paddle_rl_core::prelude::*;
}
