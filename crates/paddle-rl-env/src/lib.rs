//! Environments for the paddle-ball trainer
//!
//! This crate provides:
//! - The paddle-ball game rendering raw RGB frames
//! - Grayscale conversion and downsampling
//! - Frame stacking and time-limit wrappers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod paddle;
pub mod preprocess;
pub mod wrappers;

use serde::{Deserialize, Serialize};

// Re-export environments
pub use paddle::{PaddleBallEnv, PaddleConfig, RawFrame, DOWN, STAY, UP};
pub use preprocess::{to_gray, GrayFrame, Preprocess, PreprocessConfig};
pub use wrappers::{FrameStack, TimeLimit};

// Re-export core types
pub use paddle_rl_core::{Environment, Observation, Reward, StackedFrames, Step};

/// The full observation pipeline the agent trains on
pub type PaddleStack = TimeLimit<FrameStack<Preprocess<PaddleBallEnv>>>;

/// Game, preprocessing and wrapper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Game parameters
    pub game: PaddleConfig,
    /// Preprocessing parameters
    pub preprocess: PreprocessConfig,
    /// Number of stacked frames
    pub frame_stack: usize,
    /// Steps after which an episode is truncated
    pub max_episode_steps: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            game: PaddleConfig::default(),
            preprocess: PreprocessConfig::default(),
            frame_stack: 4,
            max_episode_steps: 20_000,
        }
    }
}

/// Build the paddle-ball game wrapped for training
pub fn make_paddle_env(config: &EnvConfig, seed: Option<u64>) -> paddle_rl_core::Result<PaddleStack> {
    let game = PaddleBallEnv::new(config.game.clone(), seed)?;
    let gray = Preprocess::new(game, config.preprocess.clone())?;
    let stacked = FrameStack::new(gray, config.frame_stack)?;
    Ok(TimeLimit::new(stacked, config.max_episode_steps.max(1)))
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{make_paddle_env, EnvConfig, PaddleBallEnv, PaddleStack, TimeLimit, FrameStack};
    pub use paddle_rl_core::prelude::*;
}
