//! DQN agent and episode loop

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::ReplayBuffer;
use crate::checkpoint::{Checkpoint, CHECKPOINT_VERSION};
use crate::dqn::{DQNConfig, DQNTrainer};
use crate::exploration::{DecayingEpsilon, EpsilonGreedy};
use crate::history::{EpisodeSummary, TrainingHistory};
use crate::network::DuelingNetwork;
use paddle_rl_core::{
    ActionValueEstimator, AgentMetrics, DiscreteAction, DiscreteSpace, Environment, FrameShape,
    RLError, Result, StackedFrames, Transition,
};

/// Episodes averaged for the running score and loss in logs and metrics
const RECENT_WINDOW: usize = 100;

/// Run-wide counters; ε is derived from `step`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingContext {
    /// Environment steps taken while training
    pub step: u64,
    /// Training episodes finished
    pub episode: u64,
    /// Exploration rate at `step`
    pub epsilon: f64,
}

impl Default for TrainingContext {
    fn default() -> Self {
        Self {
            step: 0,
            episode: 0,
            epsilon: 1.0,
        }
    }
}

/// Dueling DQN agent with experience replay and a target network
#[derive(Debug)]
pub struct DQNAgent {
    trainer: DQNTrainer,
    buffer: ReplayBuffer,
    policy: EpsilonGreedy<DecayingEpsilon>,
    context: TrainingContext,
    history: TrainingHistory,
    rng: ChaCha8Rng,
}

impl DQNAgent {
    /// Create an agent for observations of `shape` over `action_space`
    pub fn new(config: DQNConfig, shape: FrameShape, action_space: DiscreteSpace) -> Result<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let trainer = DQNTrainer::new(config.clone(), shape, action_space.n, &mut rng)?;
        let buffer = ReplayBuffer::new(config.base.buffer_size)?;
        let policy = EpsilonGreedy::new(schedule(&config), action_space);

        info!(
            parameters = trainer.online().parameters().parameter_count(),
            actions = action_space.n,
            ?shape,
            double_dqn = config.double_dqn,
            "created DQN agent"
        );

        Ok(Self {
            trainer,
            buffer,
            policy,
            context: TrainingContext::default(),
            history: TrainingHistory::default(),
            rng,
        })
    }

    /// Create an agent sized for `env`
    pub fn for_environment<E>(config: DQNConfig, env: &E) -> Result<Self>
    where
        E: Environment<Observation = StackedFrames> + ?Sized,
    {
        let shape = FrameShape::from_dims(&env.observation_shape())?;
        Self::new(config, shape, env.action_space())
    }

    /// Resume from a snapshot
    ///
    /// The random stream continues where the snapshot left it, so a resumed
    /// run matches an uninterrupted one step for step.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self> {
        checkpoint.validate()?;
        let Checkpoint {
            config,
            frame_shape,
            num_actions,
            online,
            target,
            optimizer,
            trainer,
            buffer,
            context,
            history,
            rng,
            ..
        } = checkpoint;

        let network = config.network_config(frame_shape, num_actions);
        let online = DuelingNetwork::from_parameters(network.clone(), online)?;
        let target = DuelingNetwork::from_parameters(network, target)?;
        let policy = EpsilonGreedy::new(schedule(&config), DiscreteSpace::new(num_actions));
        let trainer =
            DQNTrainer::from_parts(config, frame_shape, online, target, optimizer, trainer)?;

        info!(step = context.step, episode = context.episode, "restored DQN agent");
        Ok(Self {
            trainer,
            buffer,
            policy,
            context,
            history,
            rng,
        })
    }

    /// Snapshot the full training state
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            created_at: Utc::now(),
            config: self.trainer.config().clone(),
            frame_shape: self.trainer.frame_shape(),
            num_actions: self.trainer.online().num_actions(),
            online: self.trainer.online().parameters().clone(),
            target: self.trainer.target().parameters().clone(),
            optimizer: self.trainer.optimizer().clone(),
            trainer: self.trainer.stats(),
            buffer: self.buffer.clone(),
            context: self.context,
            history: self.history.clone(),
            rng: self.rng.clone(),
        }
    }

    /// Epsilon-greedy action at the current step
    pub fn act(&mut self, observation: &StackedFrames) -> Result<DiscreteAction> {
        self.context.epsilon = self.policy.epsilon(self.context.step);
        self.policy
            .select_action(self.trainer.online(), observation, self.context.step, &mut self.rng)
    }

    /// Store a transition in the replay buffer
    pub fn remember(&mut self, transition: Transition) -> Result<()> {
        self.policy.action_space().check(transition.action)?;
        let shape = self.trainer.frame_shape();
        for frames in [&transition.state, &transition.next_state] {
            if frames.frame_shape() != shape {
                return Err(RLError::DimensionMismatch {
                    expected: shape.len(),
                    actual: frames.as_slice().len(),
                });
            }
        }
        self.buffer.push(transition);
        Ok(())
    }

    /// One trainer call at the current step; `None` when no update was made
    pub fn train_step(&mut self) -> Result<Option<f32>> {
        let before = self.trainer.stats().updates;
        let loss = self
            .trainer
            .train_step(&self.buffer, self.context.step, &mut self.rng)?;
        Ok((self.trainer.stats().updates > before).then_some(loss))
    }

    /// Play one episode, storing every transition and learning after warm-up
    pub fn run_episode<E>(&mut self, env: &mut E) -> Result<EpisodeSummary>
    where
        E: Environment<Observation = StackedFrames> + ?Sized,
    {
        let started_at = Utc::now();
        let warmup = self.trainer.config().warmup_steps;
        let (mut observation, _) = env.reset()?;
        let mut score = 0.0;
        let mut length = 0usize;
        let mut losses = Vec::new();

        let truncated = loop {
            let action = self.act(&observation)?;
            let step = env.step(action)?;
            score += step.reward.0;
            length += 1;

            let state = std::mem::replace(&mut observation, step.observation.clone());
            self.remember(Transition::new(
                state,
                action,
                step.reward,
                step.observation,
                step.done,
            ))?;
            self.context.step += 1;

            let loss = if length > warmup { self.train_step()? } else { None };
            losses.extend(loss);
            self.history.record_step(self.context.epsilon, loss);

            if step.done || step.truncated {
                break step.truncated && !step.done;
            }
        };

        self.context.episode += 1;
        let summary = EpisodeSummary {
            id: uuid::Uuid::new_v4().to_string(),
            episode: self.context.episode,
            score,
            length,
            mean_loss: mean(&losses),
            epsilon: self.context.epsilon,
            truncated,
            started_at,
            ended_at: Utc::now(),
        };
        self.history.record_episode(summary.clone());

        info!(
            episode = summary.episode,
            score = summary.score,
            length = summary.length,
            epsilon = summary.epsilon,
            mean_loss = ?summary.mean_loss,
            recent_score = ?self.history.recent_mean_score(RECENT_WINDOW),
            buffer = self.buffer.len(),
            "episode finished"
        );
        Ok(summary)
    }

    /// Run `episodes` training episodes
    pub fn train<E>(&mut self, env: &mut E, episodes: usize) -> Result<Vec<EpisodeSummary>>
    where
        E: Environment<Observation = StackedFrames> + ?Sized,
    {
        (0..episodes).map(|_| self.run_episode(env)).collect()
    }

    /// Greedy episodes with no exploration, no buffer inserts and no learning
    pub fn evaluate<E>(&self, env: &mut E, episodes: usize) -> Result<Vec<EpisodeSummary>>
    where
        E: Environment<Observation = StackedFrames> + ?Sized,
    {
        let policy = EpsilonGreedy::greedy(self.policy.action_space());
        // Never drawn from at ε = 0
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut summaries = Vec::with_capacity(episodes);
        for episode in 1..=episodes as u64 {
            let started_at = Utc::now();
            let (mut observation, _) = env.reset()?;
            let mut score = 0.0;
            let mut length = 0usize;
            let truncated = loop {
                let action =
                    policy.select_action(self.trainer.online(), &observation, 0, &mut rng)?;
                let step = env.step(action)?;
                score += step.reward.0;
                length += 1;
                if step.done || step.truncated {
                    break step.truncated && !step.done;
                }
                observation = step.observation;
            };

            debug!(episode, score, length, "evaluation episode finished");
            summaries.push(EpisodeSummary {
                id: uuid::Uuid::new_v4().to_string(),
                episode,
                score,
                length,
                mean_loss: None,
                epsilon: 0.0,
                truncated,
                started_at,
                ended_at: Utc::now(),
            });
        }
        Ok(summaries)
    }

    /// Snapshot of the run's counters
    #[must_use]
    pub fn metrics(&self) -> AgentMetrics {
        AgentMetrics {
            total_steps: self.context.step,
            total_episodes: self.context.episode,
            epsilon: self.policy.epsilon(self.context.step),
            avg_episode_reward: self.history.recent_mean_score(RECENT_WINDOW).unwrap_or(0.0),
            loss: self.history.recent_mean_loss(RECENT_WINDOW),
            buffer_len: self.buffer.len(),
        }
    }

    /// Step and episode counters
    #[must_use]
    pub fn context(&self) -> &TrainingContext {
        &self.context
    }

    /// Recorded statistics
    #[must_use]
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Replay buffer
    #[must_use]
    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// Trainer holding the online and target networks
    #[must_use]
    pub fn trainer(&self) -> &DQNTrainer {
        &self.trainer
    }
}

fn schedule(config: &DQNConfig) -> DecayingEpsilon {
    DecayingEpsilon::new(config.epsilon_end, config.epsilon_decay)
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f32]) -> Option<f32> {
    (!values.is_empty()).then(|| values.iter().sum::<f32>() / values.len() as f32)
}
