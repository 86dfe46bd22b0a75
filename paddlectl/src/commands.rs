// Command implementations for paddlectl

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use paddle_rl_agent::{Checkpoint, DQNAgent, DQNConfig, EpisodeSummary};
use paddle_rl_core::{Environment, FrameShape};
use paddle_rl_env::{make_paddle_env, EnvConfig};

/// Everything a run needs, as read from `--config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Learning parameters
    pub agent: DQNConfig,
    /// Game and preprocessing parameters
    pub env: EnvConfig,
}

pub struct TrainOptions {
    pub episodes: usize,
    pub config: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
    pub checkpoint_every: usize,
    pub history: Option<PathBuf>,
    pub seed: Option<u64>,
}

async fn load_run_config(path: Option<&Path>) -> Result<RunConfig> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: RunConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    config.agent.validate()?;
    Ok(config)
}

/// Game seed derived from the run seed so the two streams differ
fn env_seed(seed: Option<u64>) -> Option<u64> {
    seed.map(|s| s.wrapping_add(1))
}

pub async fn train(options: TrainOptions) -> Result<()> {
    let mut run = load_run_config(options.config.as_deref()).await?;
    if options.seed.is_some() {
        run.agent.seed = options.seed;
    }

    let mut env = make_paddle_env(&run.env, env_seed(run.agent.seed))?;
    let mut agent = match &options.resume {
        Some(path) => {
            let checkpoint = Checkpoint::load(path)
                .await
                .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
            if options.config.is_some() {
                warn!("resuming: the checkpoint's agent configuration replaces the config file's");
            }
            check_shape(&env, checkpoint.frame_shape)?;
            DQNAgent::from_checkpoint(checkpoint)?
        }
        None => DQNAgent::for_environment(run.agent.clone(), &env)?,
    };

    println!("🤖 Starting training");
    println!("   Episodes: {}", options.episodes);
    println!("   Observation: {:?}", env.observation_shape());
    println!("   Starting at episode {}", agent.context().episode + 1);

    let every = options.checkpoint_every.max(1);
    for i in 1..=options.episodes {
        agent.run_episode(&mut env)?;
        if let Some(path) = &options.checkpoint {
            if i % every == 0 || i == options.episodes {
                agent.checkpoint().save(path).await?;
            }
        }
    }

    if let Some(path) = &options.history {
        let json = serde_json::to_vec_pretty(agent.history())?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write history {}", path.display()))?;
        info!(path = %path.display(), "history written");
    }

    let metrics = agent.metrics();
    println!("\n✅ Training finished");
    println!("   Total steps: {}", metrics.total_steps);
    println!("   Total episodes: {}", metrics.total_episodes);
    println!("   Epsilon: {:.4}", metrics.epsilon);
    println!("   Recent mean score: {:.2}", metrics.avg_episode_reward);
    if let Some(loss) = metrics.loss {
        println!("   Recent mean loss: {loss:.5}");
    }
    if let Some(best) = agent.history().best_score() {
        println!("   Best score: {best:.0}");
    }
    Ok(())
}

pub async fn evaluate(
    checkpoint: &Path,
    episodes: usize,
    config: Option<&Path>,
    seed: Option<u64>,
) -> Result<()> {
    let run = load_run_config(config).await?;
    let checkpoint = Checkpoint::load(checkpoint)
        .await
        .with_context(|| format!("Failed to load checkpoint {}", checkpoint.display()))?;
    let mut env = make_paddle_env(&run.env, env_seed(seed))?;
    check_shape(&env, checkpoint.frame_shape)?;
    let agent = DQNAgent::from_checkpoint(checkpoint)?;

    let results = agent.evaluate(&mut env, episodes)?;
    println!("🎮 Greedy evaluation over {episodes} episodes\n");
    for r in &results {
        println!(
            "   Episode {:>3}: score {:>4.0}  length {:>6}{}",
            r.episode,
            r.score,
            r.length,
            if r.truncated { "  (time limit)" } else { "" }
        );
    }
    if let Some(mean) = mean_score(&results) {
        println!("\n   Mean score: {mean:.2}");
    }
    Ok(())
}

pub fn print_default_config() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&RunConfig::default())?);
    Ok(())
}

fn check_shape<E: Environment>(env: &E, expected: FrameShape) -> Result<()> {
    let actual = FrameShape::from_dims(&env.observation_shape())?;
    if actual != expected {
        bail!(
            "checkpoint expects {expected:?} observations but the configured game produces {actual:?}"
        );
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean_score(results: &[EpisodeSummary]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    Some(results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let json = serde_json::to_string(&RunConfig::default()).unwrap();
        let parsed: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.agent, DQNConfig::default());
        assert_eq!(parsed.env, EnvConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let parsed: RunConfig =
            serde_json::from_str(r#"{"agent": {"gamma": 0.9}, "env": {"frame_stack": 2}}"#).unwrap();
        assert_eq!(parsed.agent.base.gamma, 0.9);
        assert_eq!(parsed.agent.head_dim, DQNConfig::default().head_dim);
        assert_eq!(parsed.env.frame_stack, 2);
        assert_eq!(parsed.env.game, EnvConfig::default().game);
    }

    #[test]
    fn test_env_seed_differs_from_agent_seed() {
        assert_eq!(env_seed(Some(7)), Some(8));
        assert_eq!(env_seed(None), None);
    }
}
