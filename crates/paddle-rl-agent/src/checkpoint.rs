//! Versioned snapshots of a training run

use std::path::Path;

use chrono::{DateTime, Utc};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::TrainingContext;
use crate::buffer::ReplayBuffer;
use crate::dqn::{DQNConfig, TrainerStats};
use crate::history::TrainingHistory;
use crate::network::DuelingParameters;
use crate::optim::Adam;
use paddle_rl_core::{FrameShape, RLError, Result};

/// Format version written by this build
pub const CHECKPOINT_VERSION: u32 = 2;

/// Everything needed to resume a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
    /// Run configuration
    pub config: DQNConfig,
    /// Observation shape the networks read
    pub frame_shape: FrameShape,
    /// Size of the action space
    pub num_actions: usize,
    /// Online network parameters
    pub online: DuelingParameters,
    /// Target network parameters
    pub target: DuelingParameters,
    /// Adam moments
    pub optimizer: Adam,
    /// Update and sync counters
    pub trainer: TrainerStats,
    /// Replay buffer contents
    pub buffer: ReplayBuffer,
    /// Step and episode counters
    pub context: TrainingContext,
    /// Statistics so far
    pub history: TrainingHistory,
    /// Agent random stream at the snapshot's step boundary
    pub rng: ChaCha8Rng,
}

impl Checkpoint {
    /// Check version and internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.version != CHECKPOINT_VERSION {
            return Err(RLError::Checkpoint(format!(
                "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                self.version
            )));
        }
        self.config.validate()?;
        self.buffer.validate()?;
        let network = self.config.network_config(self.frame_shape, self.num_actions);
        if !self.online.matches(&network) || !self.target.matches(&network) {
            return Err(RLError::Checkpoint(
                "stored parameters do not match the configured network".to_string(),
            ));
        }
        if !self.optimizer.matches(&network) {
            return Err(RLError::Checkpoint(
                "optimizer moments do not match the configured network".to_string(),
            ));
        }
        if self.buffer.iter().any(|t| {
            t.state.frame_shape() != self.frame_shape
                || t.next_state.frame_shape() != self.frame_shape
        }) {
            return Err(RLError::Checkpoint(
                "replay buffer holds observations of another shape".to_string(),
            ));
        }
        Ok(())
    }

    /// Write as JSON, replacing `path` atomically
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec(self)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        info!(
            path = %path.display(),
            step = self.context.step,
            episode = self.context.episode,
            bytes = bytes.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Read and validate a checkpoint written by [`Checkpoint::save`]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let checkpoint: Self = serde_json::from_slice(&bytes)?;
        checkpoint.validate()?;
        info!(
            path = %path.display(),
            step = checkpoint.context.step,
            episode = checkpoint.context.episode,
            "checkpoint loaded"
        );
        Ok(checkpoint)
    }
}
