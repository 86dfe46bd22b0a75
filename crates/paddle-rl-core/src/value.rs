//! Action-value estimation

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{DiscreteAction, StackedFrames};

/// Action value function Q(s, ·) over a batch of flattened observations
///
/// Implementations map a `(batch, features)` matrix to a `(batch, actions)`
/// matrix holding one estimate per discrete action.
pub trait ActionValueEstimator {
    /// Number of discrete actions the estimator scores
    fn num_actions(&self) -> usize;

    /// Batched forward pass
    fn evaluate(&self, observations: ArrayView2<'_, f32>) -> crate::Result<Array2<f32>>;

    /// Q-values for a single observation
    fn evaluate_one(&self, observation: &StackedFrames) -> crate::Result<Array1<f32>> {
        let data = observation.as_slice();
        let input = ArrayView2::from_shape((1, data.len()), data)?;
        let q = self.evaluate(input)?;
        Ok(q.row(0).to_owned())
    }

    /// Best-valued action for a single observation
    fn greedy_action(&self, observation: &StackedFrames) -> crate::Result<DiscreteAction> {
        let q = self.evaluate_one(observation)?;
        Ok(DiscreteAction(argmax(q.view())))
    }
}

/// Index of the largest value; ties resolve to the first index
#[must_use]
pub fn argmax(values: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Largest value in a row
#[must_use]
pub fn max_value(values: ArrayView1<'_, f32>) -> f32 {
    values.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v))
}
