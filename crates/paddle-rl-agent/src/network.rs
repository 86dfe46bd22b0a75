//! Dueling action-value network on `ndarray`
//!
//! A shared stack of fully connected ReLU layers turns a flattened
//! stacked-frame observation into a feature vector. Two heads read that
//! vector: the value head yields V(s), the advantage head yields A(s, a) for
//! every action. They combine as `Q(s,a) = V(s) + A(s,a) - mean_a' A(s,a')`.
//!
//! The network carries its own backward pass: [`DuelingNetwork::forward`]
//! keeps the activations a later [`DuelingNetwork::backward`] needs to turn a
//! gradient with respect to Q into gradients for every parameter.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use paddle_rl_core::{ActionValueEstimator, RLError, Result};

/// Shape of a dueling network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Flattened observation size
    pub input_dim: usize,
    /// Widths of the shared feature layers
    pub hidden_dims: Vec<usize>,
    /// Width of the hidden layer in each head
    pub head_dim: usize,
    /// Number of discrete actions
    pub num_actions: usize,
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.head_dim == 0 || self.num_actions == 0 {
            return Err(RLError::Config(format!(
                "network dimensions must be positive: {self:?}"
            )));
        }
        if self.hidden_dims.iter().any(|&d| d == 0) {
            return Err(RLError::Config(format!(
                "hidden layer widths must be positive: {:?}",
                self.hidden_dims
            )));
        }
        Ok(())
    }

    fn feature_dim(&self) -> usize {
        self.hidden_dims.last().copied().unwrap_or(self.input_dim)
    }
}

/// Fully connected layer, `y = x W + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    /// Weights, `(in, out)`
    pub weight: Array2<f32>,
    /// Biases, `(out,)`
    pub bias: Array1<f32>,
}

impl Dense {
    /// Xavier-uniform weights, zero biases
    fn xavier<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        Self {
            weight: Array2::from_shape_fn((in_dim, out_dim), |_| dist.sample(rng)),
            bias: Array1::zeros(out_dim),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            weight: Array2::zeros(self.weight.raw_dim()),
            bias: Array1::zeros(self.bias.raw_dim()),
        }
    }

    fn forward(&self, input: &ArrayView2<'_, f32>) -> Array2<f32> {
        input.dot(&self.weight) + &self.bias
    }

    /// Store this layer's gradients in `grad` and return the input gradient
    fn backward(&self, input: &Array2<f32>, d_out: &Array2<f32>, grad: &mut Dense) -> Array2<f32> {
        grad.weight = input.t().dot(d_out);
        grad.bias = d_out.sum_axis(Axis(0));
        d_out.dot(&self.weight.t())
    }

    fn dims(&self) -> (usize, usize) {
        self.weight.dim()
    }
}

/// Every parameter of a dueling network; gradients use the same layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelingParameters {
    /// Shared feature layers
    pub trunk: Vec<Dense>,
    /// Value head hidden layer
    pub value_hidden: Dense,
    /// Value head output, one unit
    pub value_out: Dense,
    /// Advantage head hidden layer
    pub advantage_hidden: Dense,
    /// Advantage head output, one unit per action
    pub advantage_out: Dense,
}

impl DuelingParameters {
    fn init<R: Rng + ?Sized>(config: &NetworkConfig, rng: &mut R) -> Self {
        let mut trunk = Vec::with_capacity(config.hidden_dims.len());
        let mut prev = config.input_dim;
        for &width in &config.hidden_dims {
            trunk.push(Dense::xavier(prev, width, rng));
            prev = width;
        }
        Self {
            trunk,
            value_hidden: Dense::xavier(prev, config.head_dim, rng),
            value_out: Dense::xavier(config.head_dim, 1, rng),
            advantage_hidden: Dense::xavier(prev, config.head_dim, rng),
            advantage_out: Dense::xavier(config.head_dim, config.num_actions, rng),
        }
    }

    /// Layers in a fixed order: trunk, value head, advantage head
    pub fn layers(&self) -> impl Iterator<Item = &Dense> + '_ {
        self.trunk.iter().chain([
            &self.value_hidden,
            &self.value_out,
            &self.advantage_hidden,
            &self.advantage_out,
        ])
    }

    /// Mutable layers, same order as [`Self::layers`]
    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut Dense> + '_ {
        self.trunk.iter_mut().chain([
            &mut self.value_hidden,
            &mut self.value_out,
            &mut self.advantage_hidden,
            &mut self.advantage_out,
        ])
    }

    /// Same layout, all zeros
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self {
            trunk: self.trunk.iter().map(Dense::zeros_like).collect(),
            value_hidden: self.value_hidden.zeros_like(),
            value_out: self.value_out.zeros_like(),
            advantage_hidden: self.advantage_hidden.zeros_like(),
            advantage_out: self.advantage_out.zeros_like(),
        }
    }

    /// Total number of scalars
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers().map(|l| l.weight.len() + l.bias.len()).sum()
    }

    /// Whether every scalar is finite
    #[must_use]
    pub fn all_finite(&self) -> bool {
        self.layers()
            .all(|l| l.weight.iter().chain(l.bias.iter()).all(|v| v.is_finite()))
    }

    /// Clamp every scalar to `[-bound, bound]`
    pub fn clamp(&mut self, bound: f32) {
        for layer in self.layers_mut() {
            layer.weight.mapv_inplace(|v| v.clamp(-bound, bound));
            layer.bias.mapv_inplace(|v| v.clamp(-bound, bound));
        }
    }

    /// Whether `other` has the same layers with the same shapes
    #[must_use]
    pub fn same_layout(&self, other: &Self) -> bool {
        self.trunk.len() == other.trunk.len()
            && self
                .layers()
                .zip(other.layers())
                .all(|(a, b)| a.dims() == b.dims() && a.bias.len() == b.bias.len())
    }

    /// Whether the layout matches what `config` would build
    #[must_use]
    pub fn matches(&self, config: &NetworkConfig) -> bool {
        let mut expected = Vec::with_capacity(config.hidden_dims.len() + 4);
        let mut prev = config.input_dim;
        for &width in &config.hidden_dims {
            expected.push((prev, width));
            prev = width;
        }
        expected.extend([
            (prev, config.head_dim),
            (config.head_dim, 1),
            (prev, config.head_dim),
            (config.head_dim, config.num_actions),
        ]);

        self.trunk.len() == config.hidden_dims.len()
            && self
                .layers()
                .zip(&expected)
                .all(|(l, &(i, o))| l.dims() == (i, o) && l.bias.len() == o)
    }
}

/// Activations kept from a forward pass
#[derive(Debug, Clone)]
pub struct ForwardCache {
    trunk_inputs: Vec<Array2<f32>>,
    features: Array2<f32>,
    value_hidden: Array2<f32>,
    advantage_hidden: Array2<f32>,
    /// State values, `(batch, 1)`
    pub value: Array2<f32>,
    /// Raw advantages before centering, `(batch, actions)`
    pub advantage: Array2<f32>,
    /// Action values, `(batch, actions)`
    pub q: Array2<f32>,
}

/// Dueling Q-network
#[derive(Debug, Clone, PartialEq)]
pub struct DuelingNetwork {
    config: NetworkConfig,
    params: DuelingParameters,
}

impl DuelingNetwork {
    /// Build a freshly initialized network
    pub fn new<R: Rng + ?Sized>(config: NetworkConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let params = DuelingParameters::init(&config, rng);
        Ok(Self { config, params })
    }

    /// Rebuild a network from stored parameters
    pub fn from_parameters(config: NetworkConfig, params: DuelingParameters) -> Result<Self> {
        config.validate()?;
        if !params.matches(&config) {
            return Err(RLError::Checkpoint(
                "stored parameters do not match the network shape".to_string(),
            ));
        }
        Ok(Self { config, params })
    }

    /// Network shape
    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Current parameters
    #[must_use]
    pub fn parameters(&self) -> &DuelingParameters {
        &self.params
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut DuelingParameters {
        &mut self.params
    }

    /// Overwrite every parameter with an exact copy of `source`'s
    pub fn copy_from(&mut self, source: &DuelingNetwork) -> Result<()> {
        if source.config != self.config {
            return Err(RLError::Config(
                "cannot copy parameters between differently shaped networks".to_string(),
            ));
        }
        self.params.clone_from(&source.params);
        Ok(())
    }

    /// Forward pass keeping the activations needed by [`Self::backward`]
    pub fn forward(&self, observations: ArrayView2<'_, f32>) -> Result<ForwardCache> {
        if observations.ncols() != self.config.input_dim {
            return Err(RLError::DimensionMismatch {
                expected: self.config.input_dim,
                actual: observations.ncols(),
            });
        }

        let mut trunk_inputs = Vec::with_capacity(self.params.trunk.len());
        let mut hidden = observations.to_owned();
        for layer in &self.params.trunk {
            let next = relu(layer.forward(&hidden.view()));
            trunk_inputs.push(hidden);
            hidden = next;
        }
        let features = hidden;

        let value_hidden = relu(self.params.value_hidden.forward(&features.view()));
        let value = self.params.value_out.forward(&value_hidden.view());
        let advantage_hidden = relu(self.params.advantage_hidden.forward(&features.view()));
        let advantage = self.params.advantage_out.forward(&advantage_hidden.view());
        let q = combine_dueling(&value, &advantage);

        Ok(ForwardCache {
            trunk_inputs,
            features,
            value_hidden,
            advantage_hidden,
            value,
            advantage,
            q,
        })
    }

    /// Gradients of `sum(d_q * Q)` with respect to every parameter
    pub fn backward(&self, cache: &ForwardCache, d_q: ArrayView2<'_, f32>) -> Result<DuelingParameters> {
        if d_q.dim() != cache.q.dim() {
            return Err(RLError::DimensionMismatch {
                expected: cache.q.len(),
                actual: d_q.len(),
            });
        }
        let rows = d_q.nrows();
        let mut grads = self.params.zeros_like();

        // dQ/dV = 1 for every action; dQ_j/dA_i = [i == j] - 1/K
        let d_value = d_q.sum_axis(Axis(1)).insert_axis(Axis(1));
        let d_mean = d_q
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(rows))
            .insert_axis(Axis(1));
        let d_advantage = &d_q - &d_mean;

        let mut d_vh = self
            .params
            .value_out
            .backward(&cache.value_hidden, &d_value, &mut grads.value_out);
        relu_backward(&mut d_vh, &cache.value_hidden);
        let mut d_features =
            self.params
                .value_hidden
                .backward(&cache.features, &d_vh, &mut grads.value_hidden);

        let mut d_ah = self.params.advantage_out.backward(
            &cache.advantage_hidden,
            &d_advantage,
            &mut grads.advantage_out,
        );
        relu_backward(&mut d_ah, &cache.advantage_hidden);
        d_features += &self.params.advantage_hidden.backward(
            &cache.features,
            &d_ah,
            &mut grads.advantage_hidden,
        );

        let mut d_hidden = d_features;
        for i in (0..self.params.trunk.len()).rev() {
            let output = cache.trunk_inputs.get(i + 1).unwrap_or(&cache.features);
            relu_backward(&mut d_hidden, output);
            d_hidden =
                self.params.trunk[i].backward(&cache.trunk_inputs[i], &d_hidden, &mut grads.trunk[i]);
        }

        Ok(grads)
    }

    /// Width of the shared feature vector
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.config.feature_dim()
    }
}

impl ActionValueEstimator for DuelingNetwork {
    fn num_actions(&self) -> usize {
        self.config.num_actions
    }

    fn evaluate(&self, observations: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        Ok(self.forward(observations)?.q)
    }
}

/// `Q = V + (A - mean(A))`, row by row
#[must_use]
pub fn combine_dueling(value: &Array2<f32>, advantage: &Array2<f32>) -> Array2<f32> {
    let mean = advantage
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(advantage.nrows()))
        .insert_axis(Axis(1));
    let mut q = advantage - &mean;
    q += value;
    q
}

fn relu(mut x: Array2<f32>) -> Array2<f32> {
    x.mapv_inplace(|v| v.max(0.0));
    x
}

fn relu_backward(grad: &mut Array2<f32>, output: &Array2<f32>) {
    Zip::from(grad).and(output).for_each(|g, &o| {
        if o <= 0.0 {
            *g = 0.0;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn config() -> NetworkConfig {
        NetworkConfig {
            input_dim: 6,
            hidden_dims: vec![8, 5],
            head_dim: 4,
            num_actions: 3,
        }
    }

    fn inputs(rows: usize, rng: &mut StdRng) -> Array2<f32> {
        Array2::from_shape_fn((rows, 6), |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn test_output_shape_and_dimension_check() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = DuelingNetwork::new(config(), &mut rng).unwrap();
        let q = net.evaluate(inputs(4, &mut rng).view()).unwrap();
        assert_eq!(q.dim(), (4, 3));

        let wrong = Array2::<f32>::zeros((2, 5));
        assert!(matches!(
            net.evaluate(wrong.view()),
            Err(RLError::DimensionMismatch { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_advantage_centering() {
        let mut rng = StdRng::seed_from_u64(2);
        let net = DuelingNetwork::new(config(), &mut rng).unwrap();
        let cache = net.forward(inputs(16, &mut rng).view()).unwrap();
        for (q_row, v) in cache.q.rows().into_iter().zip(cache.value.column(0)) {
            let mean_gap = q_row.iter().map(|q| q - v).sum::<f32>() / q_row.len() as f32;
            assert_abs_diff_eq!(mean_gap, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_combine_dueling_is_invariant_to_advantage_shift() {
        let value = Array2::from_shape_vec((1, 1), vec![2.0]).unwrap();
        let advantage = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 6.0]).unwrap();
        let shifted = &advantage + 10.0;
        let q = combine_dueling(&value, &advantage);
        assert_eq!(q, combine_dueling(&value, &shifted));
        assert_eq!(q.row(0).to_vec(), vec![0.0, 1.0, 5.0]);
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = DuelingNetwork::new(config(), &mut rng).unwrap();
        // Keep pre-activations away from the ReLU kink
        for layer in net.parameters_mut().layers_mut() {
            layer.bias.fill(0.1);
        }
        let x = inputs(3, &mut rng);
        let d_q: Array2<f32> = Array2::from_shape_fn((3, 3), |_| rng.gen_range(-1.0..1.0));

        let objective = |n: &DuelingNetwork| -> f64 {
            let q = n.evaluate(x.view()).unwrap();
            q.iter().zip(d_q.iter()).map(|(a, b)| f64::from(a * b)).sum()
        };

        let cache = net.forward(x.view()).unwrap();
        let grads = net.backward(&cache, d_q.view()).unwrap();

        let probes = [(0usize, 0usize, 1usize), (1, 2, 3), (3, 1, 0), (5, 3, 2)];
        let h = 1e-3f32;
        for &(layer, i, j) in &probes {
            let analytic = f64::from(grads.layers().nth(layer).unwrap().weight[[i, j]]);

            let mut plus = net.clone();
            plus.parameters_mut().layers_mut().nth(layer).unwrap().weight[[i, j]] += h;
            let mut minus = net.clone();
            minus.parameters_mut().layers_mut().nth(layer).unwrap().weight[[i, j]] -= h;
            let numeric = (objective(&plus) - objective(&minus)) / (2.0 * f64::from(h));

            assert_abs_diff_eq!(analytic, numeric, epsilon = 5e-3);
        }
    }

    #[test]
    fn test_copy_from_makes_identical_outputs() {
        let mut rng = StdRng::seed_from_u64(4);
        let online = DuelingNetwork::new(config(), &mut rng).unwrap();
        let mut target = DuelingNetwork::new(config(), &mut rng).unwrap();
        let x = inputs(5, &mut rng);
        assert_ne!(online.evaluate(x.view()).unwrap(), target.evaluate(x.view()).unwrap());

        target.copy_from(&online).unwrap();
        assert_eq!(target.parameters(), online.parameters());
        assert_eq!(online.evaluate(x.view()).unwrap(), target.evaluate(x.view()).unwrap());
    }

    #[test]
    fn test_from_parameters_rejects_other_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = DuelingNetwork::new(config(), &mut rng).unwrap();
        let other = NetworkConfig {
            num_actions: 4,
            ..config()
        };
        assert!(DuelingNetwork::from_parameters(other, net.parameters().clone()).is_err());
        assert!(DuelingNetwork::from_parameters(config(), net.parameters().clone()).is_ok());
    }

    #[test]
    fn test_clamp_and_finiteness() {
        let mut rng = StdRng::seed_from_u64(6);
        let net = DuelingNetwork::new(config(), &mut rng).unwrap();
        let mut params = net.parameters().clone();
        params.value_out.bias[0] = 5.0;
        params.clamp(1.0);
        assert_eq!(params.value_out.bias[0], 1.0);
        assert!(params.all_finite());
        params.trunk[0].weight[[0, 0]] = f32::NAN;
        assert!(!params.all_finite());
    }

    #[test]
    fn test_empty_trunk_uses_raw_features() {
        let mut rng = StdRng::seed_from_u64(7);
        let cfg = NetworkConfig {
            hidden_dims: vec![],
            ..config()
        };
        let net = DuelingNetwork::new(cfg, &mut rng).unwrap();
        assert_eq!(net.feature_dim(), 6);
        let cache = net.forward(inputs(2, &mut rng).view()).unwrap();
        let grads = net.backward(&cache, Array2::ones((2, 3)).view()).unwrap();
        assert!(grads.trunk.is_empty());
        assert_eq!(grads.parameter_count(), net.parameters().parameter_count());
    }
}
