//! Core reinforcement learning traits and types for the paddle-ball trainer
//!
//! This crate provides the foundational abstractions shared by the agent and
//! the environments: discrete actions, stacked-frame observations, the
//! environment contract, transitions and the action-value estimator trait.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod action;
pub mod agent;
pub mod environment;
pub mod error;
pub mod observation;
pub mod reward;
pub mod trajectory;
pub mod value;

// Re-export core traits and types
pub use action::{DiscreteAction, DiscreteSpace};
pub use agent::{AgentConfig, AgentMetrics};
pub use environment::{Environment, Step, StepInfo};
pub use error::{RLError, Result};
pub use observation::{batch_observations, FrameShape, Observation, StackedFrames};
pub use reward::Reward;
pub use trajectory::Transition;
pub use value::{argmax, max_value, ActionValueEstimator};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionValueEstimator, DiscreteAction, DiscreteSpace, Environment, FrameShape,
        Observation, Result, Reward, StackedFrames, Step, Transition,
    };
}
