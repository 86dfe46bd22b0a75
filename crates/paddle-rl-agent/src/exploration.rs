//! Epsilon-greedy action selection

use rand::Rng;
use serde::{Deserialize, Serialize};

use paddle_rl_core::{ActionValueEstimator, DiscreteAction, DiscreteSpace, Result, StackedFrames};

/// Exploration rate as a function of the global step count
pub trait EpsilonSchedule: Send + Sync {
    /// ε at `step`, in `[0, 1]`
    fn epsilon(&self, step: u64) -> f64;
}

/// `max(floor, rate^step)`: full exploration at step 0, then geometric decay
/// down to `floor`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayingEpsilon {
    /// Lowest rate ever returned
    pub floor: f64,
    /// Per-step multiplier
    pub rate: f64,
}

impl DecayingEpsilon {
    /// Decay by `rate` per step, never below `floor`
    #[must_use]
    pub fn new(floor: f64, rate: f64) -> Self {
        Self { floor, rate }
    }
}

impl EpsilonSchedule for DecayingEpsilon {
    #[allow(clippy::cast_precision_loss)]
    fn epsilon(&self, step: u64) -> f64 {
        self.rate.powf(step as f64).max(self.floor)
    }
}

/// Step-independent rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedEpsilon(pub f64);

impl EpsilonSchedule for FixedEpsilon {
    fn epsilon(&self, _step: u64) -> f64 {
        self.0
    }
}

/// Random action with probability ε(step), otherwise the online estimator's argmax
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<S = DecayingEpsilon> {
    schedule: S,
    action_space: DiscreteSpace,
}

impl<S: EpsilonSchedule> EpsilonGreedy<S> {
    /// Create a selector over `action_space` driven by `schedule`
    pub fn new(schedule: S, action_space: DiscreteSpace) -> Self {
        Self {
            schedule,
            action_space,
        }
    }

    /// Exploration rate at global step `step`
    pub fn epsilon(&self, step: u64) -> f64 {
        self.schedule.epsilon(step)
    }

    /// Actions this selector chooses from
    pub fn action_space(&self) -> DiscreteSpace {
        self.action_space
    }

    /// Choose an action for `observation`
    ///
    /// The estimator is only evaluated when the draw falls on the greedy side.
    /// At ε = 0 nothing is drawn from `rng`.
    pub fn select_action<E, R>(
        &self,
        estimator: &E,
        observation: &StackedFrames,
        step: u64,
        rng: &mut R,
    ) -> Result<DiscreteAction>
    where
        E: ActionValueEstimator + ?Sized,
        R: Rng + ?Sized,
    {
        let epsilon = self.epsilon(step);
        if epsilon > 0.0 && rng.gen::<f64>() < epsilon {
            Ok(self.action_space.sample(rng))
        } else {
            let action = estimator.greedy_action(observation)?;
            self.action_space.check(action)
        }
    }
}

impl EpsilonGreedy<FixedEpsilon> {
    /// Always pick the best-valued action
    pub fn greedy(action_space: DiscreteSpace) -> Self {
        Self::new(FixedEpsilon(0.0), action_space)
    }
}
