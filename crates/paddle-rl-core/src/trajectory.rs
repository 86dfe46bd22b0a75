//! Single-step experience records

use serde::{Deserialize, Serialize};

use crate::{DiscreteAction, Reward, StackedFrames};

/// One environment step, as stored in the replay buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation the action was taken in
    pub state: StackedFrames,
    /// Action taken
    pub action: DiscreteAction,
    /// Reward received
    pub reward: Reward,
    /// Observation after the action
    pub next_state: StackedFrames,
    /// Whether the episode ended on this step
    pub terminal: bool,
}

impl Transition {
    /// Create a new transition
    #[must_use]
    pub fn new(
        state: StackedFrames,
        action: DiscreteAction,
        reward: Reward,
        next_state: StackedFrames,
        terminal: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
        }
    }
}
