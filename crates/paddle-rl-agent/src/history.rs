//! Training statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Episode identifier
    pub id: String,
    /// Episode index within the run
    pub episode: u64,
    /// Cumulative reward
    pub score: f64,
    /// Number of environment steps
    pub length: usize,
    /// Mean loss over the updates made during the episode
    pub mean_loss: Option<f32>,
    /// Exploration rate when the episode ended
    pub epsilon: f64,
    /// Whether a time limit cut the episode short
    pub truncated: bool,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub ended_at: DateTime<Utc>,
}

/// Append-only record of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Loss of every update, in order
    pub losses: Vec<f32>,
    /// Exploration rate at every environment step
    pub epsilons: Vec<f64>,
    /// Finished episodes
    pub episodes: Vec<EpisodeSummary>,
}

impl TrainingHistory {
    /// Record one environment step
    pub fn record_step(&mut self, epsilon: f64, loss: Option<f32>) {
        self.epsilons.push(epsilon);
        if let Some(loss) = loss {
            self.losses.push(loss);
        }
    }

    /// Record a finished episode
    pub fn record_episode(&mut self, summary: EpisodeSummary) {
        self.episodes.push(summary);
    }

    /// Mean score of the last `window` episodes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn recent_mean_score(&self, window: usize) -> Option<f64> {
        let start = self.episodes.len().saturating_sub(window);
        let recent = &self.episodes[start..];
        if recent.is_empty() {
            return None;
        }
        Some(recent.iter().map(|e| e.score).sum::<f64>() / recent.len() as f64)
    }

    /// Mean loss of the last `window` updates
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn recent_mean_loss(&self, window: usize) -> Option<f32> {
        let start = self.losses.len().saturating_sub(window);
        let recent = &self.losses[start..];
        if recent.is_empty() {
            return None;
        }
        Some(recent.iter().sum::<f32>() / recent.len() as f32)
    }

    /// Best episode score so far
    #[must_use]
    pub fn best_score(&self) -> Option<f64> {
        self.episodes.iter().map(|e| e.score).reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn summary(episode: u64, score: f64) -> EpisodeSummary {
        let now = Utc::now();
        EpisodeSummary {
            id: format!("ep-{episode}"),
            episode,
            score,
            length: 10,
            mean_loss: None,
            epsilon: 1.0,
            truncated: false,
            started_at: now,
            ended_at: now,
        }
    }

    #[test]
    fn test_empty_history_has_no_means() {
        let history = TrainingHistory::default();
        assert_eq!(history.recent_mean_score(10), None);
        assert_eq!(history.recent_mean_loss(10), None);
        assert_eq!(history.best_score(), None);
    }

    #[test]
    fn test_recent_windows() {
        let mut history = TrainingHistory::default();
        for (i, score) in [-3.0, -1.0, 2.0, 4.0].into_iter().enumerate() {
            history.record_episode(summary(i as u64, score));
        }
        history.record_step(0.9, None);
        history.record_step(0.8, Some(2.0));
        history.record_step(0.7, Some(4.0));

        assert_relative_eq!(history.recent_mean_score(2).unwrap(), 3.0);
        assert_relative_eq!(history.recent_mean_score(100).unwrap(), 0.5);
        assert_relative_eq!(history.recent_mean_loss(1).unwrap(), 4.0);
        assert_relative_eq!(history.recent_mean_loss(5).unwrap(), 3.0);
        assert_eq!(history.epsilons.len(), 3);
        assert_eq!(history.best_score(), Some(4.0));
    }
}
