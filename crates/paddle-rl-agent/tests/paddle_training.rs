//! Training and evaluation on the paddle-ball pipeline

use paddle_rl_agent::{DQNAgent, DQNConfig};
use paddle_rl_core::{AgentConfig, Environment};
use paddle_rl_env::{make_paddle_env, EnvConfig, PaddleConfig, PreprocessConfig};

fn env_config(max_episode_steps: usize) -> EnvConfig {
    EnvConfig {
        game: PaddleConfig {
            width: 20,
            height: 20,
            points_to_win: 2,
            ..PaddleConfig::default()
        },
        preprocess: PreprocessConfig { downsample: 2 },
        frame_stack: 3,
        max_episode_steps,
    }
}

fn agent_config(double_dqn: bool) -> DQNConfig {
    DQNConfig {
        base: AgentConfig {
            batch_size: 16,
            buffer_size: 200,
            target_update_freq: 20,
            learning_rate: 5e-4,
            ..AgentConfig::default()
        },
        hidden_dims: vec![32],
        head_dim: 16,
        warmup_steps: 10,
        double_dqn,
        seed: Some(3),
        ..DQNConfig::default()
    }
}

#[test]
fn test_training_episodes_on_paddle_ball() {
    let mut env = make_paddle_env(&env_config(400), Some(1)).unwrap();
    assert_eq!(env.observation_shape(), vec![3, 10, 10]);
    let mut agent = DQNAgent::for_environment(agent_config(false), &env).unwrap();

    let summaries = agent.train(&mut env, 3).unwrap();
    let total: usize = summaries.iter().map(|s| s.length).sum();

    assert_eq!(agent.context().step, total as u64);
    assert_eq!(agent.buffer().len(), total.min(200));
    assert!(agent.trainer().stats().updates > 0);
    assert!(agent.trainer().stats().syncs > 0);
    for s in &summaries {
        assert!(s.length <= 400);
        assert!(s.score.abs() <= 2.0);
        assert!(s.ended_at >= s.started_at);
    }

    let metrics = agent.metrics();
    assert_eq!(metrics.total_episodes, 3);
    assert!(metrics.epsilon < 1.0);
    assert!(metrics.loss.is_some_and(f32::is_finite));
}

#[test]
fn test_truncated_transitions_are_not_terminal() {
    let mut env = make_paddle_env(&env_config(15), Some(2)).unwrap();
    let mut agent = DQNAgent::for_environment(agent_config(false), &env).unwrap();

    let summary = agent.run_episode(&mut env).unwrap();
    // The first point cannot come before step 20
    assert!(summary.truncated);
    assert_eq!(summary.length, 15);
    assert!(agent.buffer().iter().all(|t| !t.terminal));
}

#[test]
fn test_double_dqn_variant_trains() {
    let mut env = make_paddle_env(&env_config(200), Some(4)).unwrap();
    let mut agent = DQNAgent::for_environment(agent_config(true), &env).unwrap();
    agent.train(&mut env, 2).unwrap();
    assert!(agent.trainer().online().parameters().all_finite());
    assert!(agent.history().losses.iter().all(|l| l.is_finite()));
}

#[test]
fn test_greedy_evaluation_is_side_effect_free() {
    let mut env = make_paddle_env(&env_config(100), Some(5)).unwrap();
    let mut agent = DQNAgent::for_environment(agent_config(false), &env).unwrap();
    agent.train(&mut env, 1).unwrap();
    let before = agent.checkpoint();

    let results = agent.evaluate(&mut env, 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].episode, 1);
    assert!(results.iter().all(|r| r.epsilon == 0.0 && r.length <= 100));

    let after = agent.checkpoint();
    assert_eq!(after.online, before.online);
    assert_eq!(after.context, before.context);
    assert_eq!(after.history, before.history);
}
