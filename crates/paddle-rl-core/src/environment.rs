//! Environment traits and types

use serde::{Deserialize, Serialize};

use crate::{DiscreteAction, DiscreteSpace, Observation, Reward};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Step<O> {
    /// Observation from the environment
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode is done
    pub done: bool,
    /// Whether the episode was truncated (e.g., time limit)
    pub truncated: bool,
    /// Additional info from the environment
    pub info: StepInfo,
}

impl<O> Step<O> {
    /// Whether this step ends the episode, for either reason
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.done || self.truncated
    }

    /// Replace the observation, keeping everything else
    pub fn map_observation<P>(self, f: impl FnOnce(O) -> P) -> Step<P> {
        Step {
            observation: f(self.observation),
            reward: self.reward,
            done: self.done,
            truncated: self.truncated,
            info: self.info,
        }
    }
}

/// Additional information from a step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Custom fields
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Attach a field
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Synchronous request/response environment with a discrete action space
pub trait Environment {
    /// Observation type
    type Observation: Observation;

    /// Get the action space
    fn action_space(&self) -> DiscreteSpace;

    /// Shape every observation from this environment has
    fn observation_shape(&self) -> Vec<usize>;

    /// Reset the environment
    fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)>;

    /// Take a step in the environment
    fn step(&mut self, action: DiscreteAction) -> crate::Result<Step<Self::Observation>>;

    /// Close the environment
    fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    type Observation = E::Observation;

    fn action_space(&self) -> DiscreteSpace {
        (**self).action_space()
    }

    fn observation_shape(&self) -> Vec<usize> {
        (**self).observation_shape()
    }

    fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)> {
        (**self).reset()
    }

    fn step(&mut self, action: DiscreteAction) -> crate::Result<Step<Self::Observation>> {
        (**self).step(action)
    }

    fn close(&mut self) -> crate::Result<()> {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameShape, StackedFrames};

    struct Countdown {
        left: usize,
    }

    impl Environment for Countdown {
        type Observation = StackedFrames;

        fn action_space(&self) -> DiscreteSpace {
            DiscreteSpace::new(2)
        }

        fn observation_shape(&self) -> Vec<usize> {
            vec![1, 1, 1]
        }

        fn reset(&mut self) -> crate::Result<(StackedFrames, StepInfo)> {
            self.left = 3;
            Ok((StackedFrames::zeros(FrameShape::new(1, 1, 1)), StepInfo::default()))
        }

        fn step(&mut self, action: DiscreteAction) -> crate::Result<Step<StackedFrames>> {
            self.action_space().check(action)?;
            self.left -= 1;
            Ok(Step {
                observation: StackedFrames::zeros(FrameShape::new(1, 1, 1)),
                reward: Reward(0.5),
                done: self.left == 0,
                truncated: false,
                info: StepInfo::default(),
            })
        }
    }

    #[test]
    fn test_boxed_environment_delegates() {
        let mut env: Box<dyn Environment<Observation = StackedFrames>> =
            Box::new(Countdown { left: 0 });
        assert_eq!(env.observation_shape(), vec![1, 1, 1]);
        env.reset().unwrap();
        let mut steps = 0;
        let mut total = Reward::default();
        loop {
            let step = env.step(DiscreteAction(1)).unwrap();
            steps += 1;
            total += step.reward;
            if step.is_terminal() {
                break;
            }
        }
        assert_eq!(steps, 3);
        assert_eq!(total, Reward(1.5));
    }

    #[test]
    fn test_invalid_action_propagates() {
        let mut env = Countdown { left: 0 };
        env.reset().unwrap();
        assert!(matches!(
            env.step(DiscreteAction(5)),
            Err(crate::RLError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_map_observation_keeps_signal() {
        let step = Step {
            observation: 2u8,
            reward: Reward(-1.0),
            done: false,
            truncated: true,
            info: StepInfo::default().with("k", 1),
        };
        let mapped = step.map_observation(|o| f32::from(o) * 0.5);
        assert_eq!(mapped.observation, 1.0);
        assert_eq!(mapped.reward, Reward(-1.0));
        assert!(mapped.truncated && mapped.is_terminal());
        assert_eq!(mapped.info.fields.len(), 1);
    }
}
