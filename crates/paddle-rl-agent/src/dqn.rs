//! Deep Q-Network trainer: bootstrap targets, Huber loss, Adam step, target sync

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::buffer::ReplayBuffer;
use crate::network::{DuelingNetwork, NetworkConfig};
use crate::optim::Adam;
use paddle_rl_core::{
    argmax, batch_observations, max_value, ActionValueEstimator, AgentConfig, FrameShape,
    RLError, Result, Transition,
};

/// DQN-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DQNConfig {
    /// Base agent configuration
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Exploration floor
    pub epsilon_end: f64,
    /// Per-step decay rate, ε = max(epsilon_end, epsilon_decay^step)
    pub epsilon_decay: f64,
    /// Element-wise gradient bound
    pub grad_clip: f32,
    /// Steps within an episode before training starts
    pub warmup_steps: usize,
    /// Shared feature layer widths
    pub hidden_dims: Vec<usize>,
    /// Hidden width of each dueling head
    pub head_dim: usize,
    /// Select next actions with the online network instead of the target
    pub double_dqn: bool,
    /// Seed for every random draw of a run
    pub seed: Option<u64>,
}

impl Default for DQNConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            epsilon_end: 0.02,
            epsilon_decay: 0.9995,
            grad_clip: 1.0,
            warmup_steps: 4,
            hidden_dims: vec![128],
            head_dim: 64,
            double_dqn: false,
            seed: None,
        }
    }
}

impl DQNConfig {
    /// Reject values the trainer cannot run with
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if !(0.0..=1.0).contains(&self.epsilon_end) {
            return Err(RLError::Config(format!(
                "epsilon_end must lie in [0, 1], got {}",
                self.epsilon_end
            )));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(RLError::Config(format!(
                "epsilon_decay must lie in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        if !(self.grad_clip.is_finite() && self.grad_clip > 0.0) {
            return Err(RLError::Config(format!(
                "grad_clip must be positive, got {}",
                self.grad_clip
            )));
        }
        if self.head_dim == 0 || self.hidden_dims.contains(&0) {
            return Err(RLError::Config(
                "network layer widths must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Network shape for observations of `shape` and `num_actions` actions
    #[must_use]
    pub fn network_config(&self, shape: FrameShape, num_actions: usize) -> NetworkConfig {
        NetworkConfig {
            input_dim: shape.len(),
            hidden_dims: self.hidden_dims.clone(),
            head_dim: self.head_dim,
            num_actions,
        }
    }
}

/// Counters kept by the trainer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerStats {
    /// Gradient updates applied
    pub updates: u64,
    /// Hard target syncs performed
    pub syncs: u64,
}

/// Owns the online and target networks and the optimizer
#[derive(Debug, Clone)]
pub struct DQNTrainer {
    config: DQNConfig,
    shape: FrameShape,
    online: DuelingNetwork,
    target: DuelingNetwork,
    optimizer: Adam,
    stats: TrainerStats,
}

impl DQNTrainer {
    /// Fresh online network; the target starts as an exact copy
    pub fn new<R: Rng + ?Sized>(
        config: DQNConfig,
        shape: FrameShape,
        num_actions: usize,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let online = DuelingNetwork::new(config.network_config(shape, num_actions), rng)?;
        let target = online.clone();
        #[allow(clippy::cast_possible_truncation)]
        let optimizer = Adam::new(config.base.learning_rate as f32, online.parameters());
        Ok(Self {
            config,
            shape,
            online,
            target,
            optimizer,
            stats: TrainerStats::default(),
        })
    }

    /// Reassemble a trainer from restored state
    pub fn from_parts(
        config: DQNConfig,
        shape: FrameShape,
        online: DuelingNetwork,
        target: DuelingNetwork,
        optimizer: Adam,
        stats: TrainerStats,
    ) -> Result<Self> {
        config.validate()?;
        let expected = config.network_config(shape, online.num_actions());
        if online.config() != &expected || target.config() != &expected {
            return Err(RLError::Checkpoint(
                "network shapes do not match the configuration".to_string(),
            ));
        }
        Ok(Self {
            config,
            shape,
            online,
            target,
            optimizer,
            stats,
        })
    }

    /// One training call at global step `step`
    ///
    /// A buffer holding fewer than `batch_size` transitions makes this a
    /// no-op returning a loss of 0.0.
    pub fn train_step<R: Rng + ?Sized>(
        &mut self,
        buffer: &ReplayBuffer,
        step: u64,
        rng: &mut R,
    ) -> Result<f32> {
        let batch_size = self.config.base.batch_size;
        if buffer.len() < batch_size {
            debug!(len = buffer.len(), batch_size, "buffer below batch size, skipping update");
            return Ok(0.0);
        }

        if step % self.config.base.target_update_freq as u64 == 0 {
            self.sync_target()?;
        }

        let batch = buffer.sample(batch_size, rng)?;
        self.update_on_batch(&batch)
    }

    /// Gradient step on one batch; returns the mean Huber loss
    pub fn update_on_batch(&mut self, batch: &[&Transition]) -> Result<f32> {
        let num_actions = self.online.num_actions();
        if let Some(bad) = batch.iter().find(|t| t.action.index() >= num_actions) {
            return Err(RLError::InvalidAction {
                action: bad.action.index(),
                num_actions,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let gamma = self.config.base.gamma as f32;
        let targets = if self.config.double_dqn {
            double_q_targets(&self.online, &self.target, batch, gamma, self.shape)?
        } else {
            bootstrap_targets(&self.target, batch, gamma, self.shape)?
        };

        let states = batch_observations(batch.iter().map(|t| &t.state), self.shape)?;
        let cache = self.online.forward(states.view())?;
        let taken: Array1<f32> = batch
            .iter()
            .enumerate()
            .map(|(i, t)| cache.q[[i, t.action.index()]])
            .collect();

        let (loss, d_taken) = smooth_l1(taken.view(), targets.view());
        if !loss.is_finite() {
            error!(loss, "non-finite loss");
            return Err(RLError::NonFinite(format!("loss ({loss})")));
        }

        let mut d_q = Array2::zeros(cache.q.raw_dim());
        for (i, t) in batch.iter().enumerate() {
            d_q[[i, t.action.index()]] = d_taken[i];
        }
        let mut grads = self.online.backward(&cache, d_q.view())?;
        if !grads.all_finite() {
            error!(loss, "non-finite gradients");
            return Err(RLError::NonFinite("gradients".to_string()));
        }
        grads.clamp(self.config.grad_clip);
        self.optimizer.step(self.online.parameters_mut(), &grads)?;

        self.stats.updates += 1;
        debug!(update = self.stats.updates, loss, "applied gradient update");
        Ok(loss)
    }

    /// Hard copy online parameters into the target network
    pub fn sync_target(&mut self) -> Result<()> {
        self.target.copy_from(&self.online)?;
        self.stats.syncs += 1;
        debug!(sync = self.stats.syncs, update = self.stats.updates, "target network synced");
        Ok(())
    }

    /// Network used for action selection and updated by the optimizer
    #[must_use]
    pub fn online(&self) -> &DuelingNetwork {
        &self.online
    }

    /// Periodically synced copy used for bootstrap targets
    #[must_use]
    pub fn target(&self) -> &DuelingNetwork {
        &self.target
    }

    /// Optimizer state
    #[must_use]
    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }

    /// Trainer configuration
    #[must_use]
    pub fn config(&self) -> &DQNConfig {
        &self.config
    }

    /// Observation shape the networks read
    #[must_use]
    pub fn frame_shape(&self) -> FrameShape {
        self.shape
    }

    /// Update and sync counters
    #[must_use]
    pub fn stats(&self) -> TrainerStats {
        self.stats
    }
}

/// `y = r + γ max_a target(s', a)` for live rows, `y = r` for terminal rows
pub fn bootstrap_targets<E>(
    target: &E,
    batch: &[&Transition],
    gamma: f32,
    shape: FrameShape,
) -> Result<Array1<f32>>
where
    E: ActionValueEstimator + ?Sized,
{
    with_bootstrap(batch, gamma, shape, |next| {
        let q = target.evaluate(next)?;
        Ok(q.rows().into_iter().map(max_value).collect())
    })
}

/// `y = r + γ target(s', argmax_a online(s', a))` for live rows, `y = r` for terminal rows
pub fn double_q_targets<O, T>(
    online: &O,
    target: &T,
    batch: &[&Transition],
    gamma: f32,
    shape: FrameShape,
) -> Result<Array1<f32>>
where
    O: ActionValueEstimator + ?Sized,
    T: ActionValueEstimator + ?Sized,
{
    with_bootstrap(batch, gamma, shape, |next| {
        let selector = online.evaluate(next)?;
        let evaluator = target.evaluate(next)?;
        Ok(selector
            .rows()
            .into_iter()
            .zip(evaluator.rows())
            .map(|(sel, eval)| eval[argmax(sel)])
            .collect())
    })
}

/// Terminal rows are never handed to `next_values`
fn with_bootstrap<F>(
    batch: &[&Transition],
    gamma: f32,
    shape: FrameShape,
    next_values: F,
) -> Result<Array1<f32>>
where
    F: FnOnce(ArrayView2<'_, f32>) -> Result<Vec<f32>>,
{
    let mut targets: Array1<f32> = batch.iter().map(|t| t.reward.as_f32()).collect();
    let live: Vec<usize> = (0..batch.len()).filter(|&i| !batch[i].terminal).collect();
    if live.is_empty() {
        return Ok(targets);
    }

    let next = batch_observations(live.iter().map(|&i| &batch[i].next_state), shape)?;
    let values = next_values(next.view())?;
    if values.len() != live.len() {
        return Err(RLError::DimensionMismatch {
            expected: live.len(),
            actual: values.len(),
        });
    }
    for (&i, v) in live.iter().zip(values) {
        targets[i] += gamma * v;
    }
    Ok(targets)
}

/// Mean smooth-L1 loss (β = 1) and its gradient with respect to `predictions`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn smooth_l1(predictions: ArrayView1<'_, f32>, targets: ArrayView1<'_, f32>) -> (f32, Array1<f32>) {
    let n = predictions.len().max(1) as f32;
    let diff = &predictions - &targets;
    let loss = diff
        .iter()
        .map(|d| if d.abs() < 1.0 { 0.5 * d * d } else { d.abs() - 0.5 })
        .sum::<f32>()
        / n;
    let grad = diff.mapv(|d| d.clamp(-1.0, 1.0) / n);
    (loss, grad)
}
