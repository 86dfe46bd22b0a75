//! Adam optimizer over dueling network parameters

use ndarray::{ArrayViewMut, Dimension, Zip};
use serde::{Deserialize, Serialize};

use crate::network::{DuelingParameters, NetworkConfig};
use paddle_rl_core::{RLError, Result};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Adam moment estimates, laid out like the parameters they update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f32,
    momentum: DuelingParameters,
    velocity: DuelingParameters,
    t: u64,
}

impl Adam {
    /// Zeroed moments shaped like `params`
    #[must_use]
    pub fn new(learning_rate: f32, params: &DuelingParameters) -> Self {
        Self {
            learning_rate,
            momentum: params.zeros_like(),
            velocity: params.zeros_like(),
            t: 0,
        }
    }

    /// Step size
    #[must_use]
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Updates applied so far
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Whether both moment estimates are laid out for `config`
    #[must_use]
    pub fn matches(&self, config: &NetworkConfig) -> bool {
        self.momentum.matches(config) && self.velocity.matches(config)
    }

    fn matches_layout(&self, params: &DuelingParameters) -> bool {
        self.momentum.same_layout(params) && self.velocity.same_layout(params)
    }

    /// Apply one bias-corrected Adam update of `grads` to `params`
    pub fn step(&mut self, params: &mut DuelingParameters, grads: &DuelingParameters) -> Result<()> {
        if !self.matches_layout(params) || !grads.same_layout(params) {
            return Err(RLError::DimensionMismatch {
                expected: params.parameter_count(),
                actual: grads.parameter_count(),
            });
        }

        self.t += 1;
        let exp = i32::try_from(self.t).unwrap_or(i32::MAX);
        let lr_t = self.learning_rate * (1.0 - BETA2.powi(exp)).sqrt() / (1.0 - BETA1.powi(exp));

        let layers = params
            .layers_mut()
            .zip(grads.layers())
            .zip(self.momentum.layers_mut().zip(self.velocity.layers_mut()));
        for ((p, g), (m, v)) in layers {
            update(p.weight.view_mut(), &g.weight, m.weight.view_mut(), v.weight.view_mut(), lr_t);
            update(p.bias.view_mut(), &g.bias, m.bias.view_mut(), v.bias.view_mut(), lr_t);
        }
        Ok(())
    }
}

fn update<D: Dimension>(
    param: ArrayViewMut<'_, f32, D>,
    grad: &ndarray::Array<f32, D>,
    momentum: ArrayViewMut<'_, f32, D>,
    velocity: ArrayViewMut<'_, f32, D>,
    lr_t: f32,
) {
    Zip::from(param)
        .and(grad)
        .and(momentum)
        .and(velocity)
        .for_each(|p, &g, m, v| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + EPSILON);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::DuelingNetwork;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn params() -> DuelingParameters {
        let config = NetworkConfig {
            input_dim: 3,
            hidden_dims: vec![4],
            head_dim: 2,
            num_actions: 2,
        };
        let mut rng = StdRng::seed_from_u64(0);
        DuelingNetwork::new(config, &mut rng).unwrap().parameters().clone()
    }

    #[test]
    fn test_first_step_moves_by_learning_rate_against_gradient() {
        let mut p = params();
        let before = p.clone();
        let mut grads = p.zeros_like();
        grads.value_out.bias[0] = 2.0;
        grads.trunk[0].weight[[1, 1]] = -0.5;

        let mut adam = Adam::new(0.01, &p);
        adam.step(&mut p, &grads).unwrap();

        assert_eq!(adam.steps(), 1);
        assert_abs_diff_eq!(p.value_out.bias[0], before.value_out.bias[0] - 0.01, epsilon = 1e-5);
        assert_abs_diff_eq!(
            p.trunk[0].weight[[1, 1]],
            before.trunk[0].weight[[1, 1]] + 0.01,
            epsilon = 1e-5
        );
        // Zero gradient leaves the parameter alone
        assert_eq!(p.advantage_out.weight, before.advantage_out.weight);
    }

    #[test]
    fn test_mismatched_gradients_rejected() {
        let mut p = params();
        let mut grads = p.zeros_like();
        grads.trunk.clear();
        let mut adam = Adam::new(0.01, &p);
        assert!(matches!(
            adam.step(&mut p, &grads),
            Err(RLError::DimensionMismatch { .. })
        ));
        assert_eq!(adam.steps(), 0);
    }

    #[test]
    fn test_equal_count_other_layout_rejected() {
        let mut p = params();
        // 3x4 trunk reshaped to 4x3 keeps the parameter count
        let mut moments = p.clone();
        moments.trunk[0].weight = ndarray::Array2::zeros((4, 3));
        assert_eq!(moments.parameter_count(), p.parameter_count());

        let mut adam = Adam::new(0.01, &moments);
        let grads = p.zeros_like();
        assert!(matches!(
            adam.step(&mut p, &grads),
            Err(RLError::DimensionMismatch { .. })
        ));
        assert_eq!(adam.steps(), 0);
    }
}
