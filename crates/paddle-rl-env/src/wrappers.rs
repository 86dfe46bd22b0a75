//! Environment wrappers for common transformations

use std::collections::VecDeque;

use tracing::debug;

use crate::preprocess::GrayFrame;
use paddle_rl_core::{
    DiscreteAction, DiscreteSpace, Environment, FrameShape, RLError, Result, StackedFrames, Step,
    StepInfo,
};

/// Time limit wrapper
///
/// Marks the step that reaches `max_steps` as truncated. `done` is left
/// untouched, so the cut-off transition still bootstraps.
#[derive(Debug)]
pub struct TimeLimit<E> {
    /// Inner environment
    pub env: E,
    /// Maximum steps
    pub max_steps: usize,
    /// Current step count
    pub steps: usize,
}

impl<E> TimeLimit<E> {
    /// Create a new time limit wrapper
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }
}

impl<E> Environment for TimeLimit<E>
where
    E: Environment,
{
    type Observation = E::Observation;

    fn action_space(&self) -> DiscreteSpace {
        self.env.action_space()
    }

    fn observation_shape(&self) -> Vec<usize> {
        self.env.observation_shape()
    }

    fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.steps = 0;
        self.env.reset()
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<Self::Observation>> {
        self.steps += 1;
        let mut step = self.env.step(action)?;

        if self.steps >= self.max_steps && !step.done {
            debug!(steps = self.steps, "episode truncated by time limit");
            step.truncated = true;
        }

        Ok(step)
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }
}

/// Frame stacking wrapper for temporal information
///
/// Emits the last `depth` frames, oldest first. After a reset the first
/// frame fills every slot.
#[derive(Debug)]
pub struct FrameStack<E> {
    /// Inner environment
    pub env: E,
    depth: usize,
    frames: VecDeque<GrayFrame>,
}

impl<E> FrameStack<E>
where
    E: Environment<Observation = GrayFrame>,
{
    /// Create a new frame stack wrapper
    pub fn new(env: E, depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(RLError::Config("frame stack depth must be positive".to_string()));
        }
        Ok(Self {
            env,
            depth,
            frames: VecDeque::with_capacity(depth),
        })
    }

    /// Number of stacked frames
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn frame_shape(&self) -> FrameShape {
        let inner = self.env.observation_shape();
        FrameShape::new(self.depth, inner[1], inner[2])
    }

    fn stacked(&self) -> Result<StackedFrames> {
        let shape = self.frame_shape();
        let mut data = Vec::with_capacity(shape.len());
        for frame in &self.frames {
            data.extend_from_slice(&frame.data);
        }
        StackedFrames::new(data, shape)
    }
}

impl<E> Environment for FrameStack<E>
where
    E: Environment<Observation = GrayFrame>,
{
    type Observation = StackedFrames;

    fn action_space(&self) -> DiscreteSpace {
        self.env.action_space()
    }

    fn observation_shape(&self) -> Vec<usize> {
        let shape = self.frame_shape();
        vec![shape.channels, shape.height, shape.width]
    }

    fn reset(&mut self) -> Result<(StackedFrames, StepInfo)> {
        let (frame, info) = self.env.reset()?;
        self.frames.clear();
        self.frames.extend(std::iter::repeat(frame).take(self.depth));
        Ok((self.stacked()?, info))
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<StackedFrames>> {
        if self.frames.len() != self.depth {
            return Err(RLError::Environment(
                "frame stack stepped before reset".to_string(),
            ));
        }
        let step = self.env.step(action)?;
        let Step {
            observation,
            reward,
            done,
            truncated,
            info,
        } = step;
        self.frames.pop_front();
        self.frames.push_back(observation);
        Ok(Step {
            observation: self.stacked()?,
            reward,
            done,
            truncated,
            info,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paddle_rl_core::Reward;

    /// Frame `t` is a 1x2 image filled with `t`
    struct Ticker {
        t: usize,
        horizon: usize,
    }

    impl Ticker {
        fn frame(&self) -> GrayFrame {
            GrayFrame {
                width: 2,
                height: 1,
                data: vec![self.t as f32; 2],
            }
        }
    }

    impl Environment for Ticker {
        type Observation = GrayFrame;

        fn action_space(&self) -> DiscreteSpace {
            DiscreteSpace::new(1)
        }

        fn observation_shape(&self) -> Vec<usize> {
            vec![1, 1, 2]
        }

        fn reset(&mut self) -> Result<(GrayFrame, StepInfo)> {
            self.t = 0;
            Ok((self.frame(), StepInfo::default()))
        }

        fn step(&mut self, _action: DiscreteAction) -> Result<Step<GrayFrame>> {
            self.t += 1;
            Ok(Step {
                observation: self.frame(),
                reward: Reward(1.0),
                done: self.t >= self.horizon,
                truncated: false,
                info: StepInfo::default(),
            })
        }
    }

    fn ticker(horizon: usize) -> Ticker {
        Ticker { t: 0, horizon }
    }

    #[test]
    fn test_frame_stack_order() {
        let mut env = FrameStack::new(ticker(10), 3).unwrap();
        assert_eq!(env.observation_shape(), vec![3, 1, 2]);

        let (obs, _) = env.reset().unwrap();
        assert_eq!(obs.as_slice(), &[0.0; 6]);

        env.step(DiscreteAction(0)).unwrap();
        let step = env.step(DiscreteAction(0)).unwrap();
        assert_eq!(step.observation.as_slice(), &[0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);

        let step = env.step(DiscreteAction(0)).unwrap();
        assert_eq!(step.observation.as_slice(), &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(step.observation.frame_shape(), FrameShape::new(3, 1, 2));
    }

    #[test]
    fn test_frame_stack_requires_reset() {
        let mut env = FrameStack::new(ticker(10), 2).unwrap();
        assert!(matches!(env.step(DiscreteAction(0)), Err(RLError::Environment(_))));
        assert!(FrameStack::new(ticker(10), 0).is_err());
    }

    #[test]
    fn test_time_limit_truncates_without_done() {
        let mut env = TimeLimit::new(ticker(100), 3);
        env.reset().unwrap();
        assert!(!env.step(DiscreteAction(0)).unwrap().truncated);
        assert!(!env.step(DiscreteAction(0)).unwrap().truncated);
        let last = env.step(DiscreteAction(0)).unwrap();
        assert!(last.truncated);
        assert!(!last.done);
        assert!(last.is_terminal());

        env.reset().unwrap();
        assert_eq!(env.steps, 0);
    }

    #[test]
    fn test_time_limit_leaves_natural_end_alone() {
        let mut env = TimeLimit::new(ticker(2), 2);
        env.reset().unwrap();
        env.step(DiscreteAction(0)).unwrap();
        let last = env.step(DiscreteAction(0)).unwrap();
        assert!(last.done);
        assert!(!last.truncated);
    }
}
