//! Grayscale conversion and downsampling of raw frames

use serde::{Deserialize, Serialize};

use crate::paddle::RawFrame;
use paddle_rl_core::{
    DiscreteAction, DiscreteSpace, Environment, Observation, RLError, Result, Step, StepInfo,
};

/// Preprocessing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side of the square pixel block averaged into one output pixel
    pub downsample: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { downsample: 4 }
    }
}

/// Single-channel frame with intensities in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrayFrame {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// `height * width` intensities, row-major
    pub data: Vec<f32>,
}

impl Observation for GrayFrame {
    fn shape(&self) -> Vec<usize> {
        vec![1, self.height, self.width]
    }
}

/// ITU-R BT.601 luma scaled to `[0, 1]`
fn luma(rgb: &[u8]) -> f32 {
    (0.299 * f32::from(rgb[0]) + 0.587 * f32::from(rgb[1]) + 0.114 * f32::from(rgb[2])) / 255.0
}

/// Average `factor x factor` blocks of luma; trailing rows and columns that
/// do not fill a block are dropped
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_gray(frame: &RawFrame, factor: usize) -> GrayFrame {
    let factor = factor.max(1);
    let width = frame.width / factor;
    let height = frame.height / factor;
    let area = (factor * factor) as f32;
    let mut data = Vec::with_capacity(width * height);
    for by in 0..height {
        for bx in 0..width {
            let mut sum = 0.0;
            for y in by * factor..(by + 1) * factor {
                for x in bx * factor..(bx + 1) * factor {
                    let i = (y * frame.width + x) * 3;
                    sum += luma(&frame.pixels[i..i + 3]);
                }
            }
            data.push((sum / area).min(1.0));
        }
    }
    GrayFrame {
        width,
        height,
        data,
    }
}

/// Turns an RGB environment into a grayscale, downsampled one
#[derive(Debug)]
pub struct Preprocess<E> {
    /// Inner environment
    pub env: E,
    config: PreprocessConfig,
}

impl<E> Preprocess<E>
where
    E: Environment<Observation = RawFrame>,
{
    /// Wrap `env`; the frame must hold at least one full block
    pub fn new(env: E, config: PreprocessConfig) -> Result<Self> {
        if config.downsample == 0 {
            return Err(RLError::Config("downsample factor must be positive".to_string()));
        }
        let shape = env.observation_shape();
        match shape[..] {
            [h, w, 3] if h >= config.downsample && w >= config.downsample => {
                Ok(Self { env, config })
            }
            ref other => Err(RLError::Config(format!(
                "cannot downsample a {other:?} frame by {}",
                config.downsample
            ))),
        }
    }
}

impl<E> Environment for Preprocess<E>
where
    E: Environment<Observation = RawFrame>,
{
    type Observation = GrayFrame;

    fn action_space(&self) -> DiscreteSpace {
        self.env.action_space()
    }

    fn observation_shape(&self) -> Vec<usize> {
        let inner = self.env.observation_shape();
        let f = self.config.downsample;
        vec![1, inner[0] / f, inner[1] / f]
    }

    fn reset(&mut self) -> Result<(GrayFrame, StepInfo)> {
        let (frame, info) = self.env.reset()?;
        Ok((to_gray(&frame, self.config.downsample), info))
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<GrayFrame>> {
        let factor = self.config.downsample;
        Ok(self.env.step(action)?.map_observation(|frame| to_gray(&frame, factor)))
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }
}
