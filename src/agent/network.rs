//! Q-value network
//!
//! Fully connected ReLU trunk with one of two heads:
//! - `Dueling`: state value V(s) and advantages A(s, ·), combined as
//!   Q(s, a) = V(s) + A(s, a) - max_a' A(s, a')
//! - `Plain`: a linear layer straight to Q(s, ·)
//!
//! Built on burn with the ndarray backend; `fit` runs burn autodiff and the
//! configured burn optimizer.

use std::fmt;
use std::str::FromStr;

use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Param};
use burn::nn::Linear;
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::{ElementConversion, TensorData};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::optimizer::{ModelOptimizer, OptimizerConfig};
use crate::error::AgentError;
use crate::game::{Action, ACTION_COUNT, OBS_SIZE};
use crate::service::Observation;

/// Backend used for training (autodiff over ndarray).
pub type TrainBackend = Autodiff<NdArray<f32>>;
/// Backend used for inference.
pub type InferBackend = NdArray<f32>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    Dueling,
    Plain,
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dueling" => Ok(Architecture::Dueling),
            "plain" => Ok(Architecture::Plain),
            other => Err(format!("unknown architecture: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_dim: usize,
    pub hidden_layers: Vec<usize>,
    pub action_count: usize,
    pub architecture: Architecture,
}

impl NetworkConfig {
    /// Network sized for the Blackjack observation and action space.
    pub fn blackjack(hidden_layers: Vec<usize>, architecture: Architecture) -> Self {
        Self {
            input_dim: OBS_SIZE,
            hidden_layers,
            action_count: ACTION_COUNT,
            architecture,
        }
    }
}

// ============================================================================
// Plain parameter form
// ============================================================================

/// One linear layer as plain data. Weights are row-major `[inputs, outputs]`,
/// the layout of burn's `Linear`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Dense {
    /// He-uniform initialisation, zero bias.
    pub fn he_uniform<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / inputs.max(1) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
        }
    }

    fn same_shape(&self, other: &Dense) -> bool {
        self.inputs == other.inputs
            && self.outputs == other.outputs
            && other.weights.len() == other.inputs * other.outputs
            && other.bias.len() == other.outputs
    }
}

/// Flattened layer parameters: trunk layers first, then the head
/// (value then advantage for dueling, the output layer for plain).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub layers: Vec<Dense>,
}

pub(crate) fn linear_from_dense<B: Backend>(dense: &Dense, device: &B::Device) -> Linear<B> {
    let weight = Tensor::<B, 2>::from_data(
        TensorData::new(dense.weights.clone(), [dense.inputs, dense.outputs]),
        device,
    );
    let bias = Tensor::<B, 1>::from_data(TensorData::new(dense.bias.clone(), [dense.outputs]), device);
    Linear {
        weight: Param::from_tensor(weight.require_grad()),
        bias: Some(Param::from_tensor(bias.require_grad())),
    }
}

fn tensor_error<E: fmt::Debug>(error: E) -> AgentError {
    AgentError::Tensor(format!("{error:?}"))
}

fn dense_from_linear<B: Backend>(linear: &Linear<B>) -> Result<Dense, AgentError> {
    let [inputs, outputs] = linear.weight.val().dims();
    let weights = linear
        .weight
        .val()
        .into_data()
        .to_vec::<f32>()
        .map_err(tensor_error)?;
    let bias = match &linear.bias {
        Some(bias) => bias.val().into_data().to_vec::<f32>().map_err(tensor_error)?,
        None => vec![0.0; outputs],
    };
    Ok(Dense {
        inputs,
        outputs,
        weights,
        bias,
    })
}

// ============================================================================
// Q-function capability
// ============================================================================

/// One supervised regression step: push Q(states[i], actions[i]) toward
/// targets[i].
pub struct FitBatch<'a> {
    pub states: &'a [Observation],
    pub actions: &'a [Action],
    pub targets: &'a [f32],
}

pub trait QFunction {
    fn input_dim(&self) -> usize;

    fn action_count(&self) -> usize;

    fn predict(&self, observation: &[f32]) -> Result<Vec<f32>, AgentError>;

    fn predict_batch(&self, observations: &[Observation]) -> Result<Vec<Vec<f32>>, AgentError> {
        observations.iter().map(|o| self.predict(o)).collect()
    }

    /// One gradient step on the mean squared error. Returns the loss before
    /// the update.
    fn fit(&mut self, batch: &FitBatch<'_>) -> Result<f32, AgentError>;

    fn parameters(&self) -> Result<Parameters, AgentError>;

    fn set_parameters(&mut self, parameters: &Parameters) -> Result<(), AgentError>;
}

// ============================================================================
// Model
// ============================================================================

#[derive(Module, Debug)]
pub struct QModel<B: Backend> {
    trunk: Vec<Linear<B>>,
    /// State-value head; present only for the dueling architecture.
    value: Option<Linear<B>>,
    /// Advantages (dueling) or Q-values (plain).
    output: Linear<B>,
}

impl<B: Backend> QModel<B> {
    fn hidden(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.trunk
            .iter()
            .fold(input, |x, layer| relu(layer.forward(x)))
    }

    /// State value (dueling only) and the raw output head.
    pub fn heads(&self, input: Tensor<B, 2>) -> (Option<Tensor<B, 2>>, Tensor<B, 2>) {
        let hidden = self.hidden(input);
        let value = self.value.as_ref().map(|v| v.forward(hidden.clone()));
        (value, self.output.forward(hidden))
    }

    /// Q-values, shape `[batch, actions]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        match self.heads(input) {
            (Some(value), advantage) => {
                let max_advantage = advantage.clone().max_dim(1);
                value + advantage - max_advantage
            }
            (None, q) => q,
        }
    }

    fn layers(&self) -> Vec<&Linear<B>> {
        let mut layers: Vec<&Linear<B>> = self.trunk.iter().collect();
        layers.extend(self.value.as_ref());
        layers.push(&self.output);
        layers
    }
}

fn build_model<B: Backend>(
    config: &NetworkConfig,
    layers: &[Dense],
    device: &B::Device,
) -> QModel<B> {
    let trunk_len = config.hidden_layers.len();
    let trunk = layers[..trunk_len]
        .iter()
        .map(|d| linear_from_dense(d, device))
        .collect();
    let (value, output) = match config.architecture {
        Architecture::Dueling => (
            Some(linear_from_dense(&layers[trunk_len], device)),
            linear_from_dense(&layers[trunk_len + 1], device),
        ),
        Architecture::Plain => (None, linear_from_dense(&layers[trunk_len], device)),
    };
    QModel {
        trunk,
        value,
        output,
    }
}

/// Layer shapes implied by a configuration, in `Parameters` order.
fn layer_shapes(config: &NetworkConfig) -> Vec<(usize, usize)> {
    let mut shapes = Vec::with_capacity(config.hidden_layers.len() + 2);
    let mut width = config.input_dim;
    for &units in &config.hidden_layers {
        shapes.push((width, units));
        width = units;
    }
    if config.architecture == Architecture::Dueling {
        shapes.push((width, 1));
    }
    shapes.push((width, config.action_count));
    shapes
}

// ============================================================================
// QNetwork
// ============================================================================

pub struct QNetwork {
    config: NetworkConfig,
    model: QModel<TrainBackend>,
    optimizer: ModelOptimizer<QModel<TrainBackend>, TrainBackend>,
    device: <TrainBackend as Backend>::Device,
}

impl QNetwork {
    /// Fresh network with He-uniform weights drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(
        config: NetworkConfig,
        optimizer: OptimizerConfig,
        rng: &mut R,
    ) -> Self {
        let layers: Vec<Dense> = layer_shapes(&config)
            .into_iter()
            .map(|(inputs, outputs)| Dense::he_uniform(inputs, outputs, rng))
            .collect();
        let device = Default::default();
        let model = build_model(&config, &layers, &device);
        Self {
            config,
            model,
            optimizer: ModelOptimizer::new(optimizer),
            device,
        }
    }

    /// Rebuild a network from stored parameters. Optimizer moments start
    /// fresh.
    pub fn from_parameters(
        config: NetworkConfig,
        optimizer: OptimizerConfig,
        parameters: &Parameters,
    ) -> Result<Self, AgentError> {
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = Self::new(config, optimizer, &mut rng);
        network.set_parameters(parameters)?;
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        self.optimizer.config()
    }

    fn check_input(&self, observation: &[f32]) -> Result<(), AgentError> {
        if observation.len() != self.config.input_dim {
            return Err(AgentError::ShapeMismatch {
                what: "observation",
                expected: self.config.input_dim,
                got: observation.len(),
            });
        }
        Ok(())
    }

    fn input_tensor<B: Backend>(&self, rows: &[&[f32]], device: &B::Device) -> Tensor<B, 2> {
        let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_data(
            TensorData::new(flat, [rows.len(), self.config.input_dim]),
            device,
        )
    }

    fn rows(tensor: Tensor<InferBackend, 2>, width: usize) -> Result<Vec<Vec<f32>>, AgentError> {
        let flat = tensor.into_data().to_vec::<f32>().map_err(tensor_error)?;
        Ok(flat.chunks(width).map(<[f32]>::to_vec).collect())
    }

    /// State value and raw advantages for a dueling network; `None` for a
    /// plain head.
    pub fn dueling_parts(&self, observation: &[f32]) -> Result<Option<(f32, Vec<f32>)>, AgentError> {
        self.check_input(observation)?;
        let model = self.model.valid();
        let input = self.input_tensor::<InferBackend>(&[observation], &self.device);
        match model.heads(input) {
            (Some(value), advantage) => {
                let v = value.into_scalar().elem::<f32>();
                let advantages = Self::rows(advantage, self.config.action_count)?;
                Ok(advantages.into_iter().next().map(|a| (v, a)))
            }
            (None, _) => Ok(None),
        }
    }
}

impl Clone for QNetwork {
    /// Copies the weights; the copy starts with fresh optimizer state.
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            model: self.model.clone(),
            optimizer: ModelOptimizer::new(self.optimizer.config()),
            device: self.device.clone(),
        }
    }
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

impl QFunction for QNetwork {
    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn action_count(&self) -> usize {
        self.config.action_count
    }

    fn predict(&self, observation: &[f32]) -> Result<Vec<f32>, AgentError> {
        self.check_input(observation)?;
        let mut rows = self.predict_rows(&[observation])?;
        rows.pop().ok_or(AgentError::EmptyBatch)
    }

    fn predict_batch(&self, observations: &[Observation]) -> Result<Vec<Vec<f32>>, AgentError> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<&[f32]> = observations.iter().map(|o| o.as_slice()).collect();
        for row in &rows {
            self.check_input(row)?;
        }
        self.predict_rows(&rows)
    }

    fn fit(&mut self, batch: &FitBatch<'_>) -> Result<f32, AgentError> {
        let n = batch.states.len();
        if n == 0 {
            return Err(AgentError::EmptyBatch);
        }
        for (what, len) in [("actions", batch.actions.len()), ("targets", batch.targets.len())] {
            if len != n {
                return Err(AgentError::ShapeMismatch {
                    what,
                    expected: n,
                    got: len,
                });
            }
        }
        let rows: Vec<&[f32]> = batch.states.iter().map(|s| s.as_slice()).collect();
        for row in &rows {
            self.check_input(row)?;
        }
        let action_count = self.config.action_count;
        if let Some(bad) = batch.actions.iter().find(|a| a.index() >= action_count) {
            return Err(AgentError::ActionOutOfRange {
                index: bad.index(),
                count: action_count,
            });
        }

        let states = self.input_tensor::<TrainBackend>(&rows, &self.device);
        let actions: Tensor<TrainBackend, 2, Int> = Tensor::from_data(
            TensorData::new(
                batch.actions.iter().map(|a| a.index() as i64).collect::<Vec<_>>(),
                [n, 1],
            ),
            &self.device,
        );
        let targets: Tensor<TrainBackend, 2> = Tensor::from_data(
            TensorData::new(batch.targets.to_vec(), [n, 1]),
            &self.device,
        );

        let taken = self.model.forward(states).gather(1, actions);
        let loss = (taken - targets).powf_scalar(2.0).mean();
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.optimizer.step(self.model.clone(), grads);

        Ok(loss_value)
    }

    fn parameters(&self) -> Result<Parameters, AgentError> {
        let layers = self
            .model
            .layers()
            .into_iter()
            .map(dense_from_linear)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Parameters { layers })
    }

    fn set_parameters(&mut self, parameters: &Parameters) -> Result<(), AgentError> {
        let shapes = layer_shapes(&self.config);
        if parameters.layers.len() != shapes.len() {
            return Err(AgentError::ShapeMismatch {
                what: "parameter layers",
                expected: shapes.len(),
                got: parameters.layers.len(),
            });
        }
        for (&(inputs, outputs), layer) in shapes.iter().zip(&parameters.layers) {
            let expected = Dense {
                inputs,
                outputs,
                weights: Vec::new(),
                bias: Vec::new(),
            };
            if !expected.same_shape(layer) {
                return Err(AgentError::ShapeMismatch {
                    what: "layer weights",
                    expected: inputs * outputs,
                    got: layer.weights.len(),
                });
            }
        }
        self.model = build_model(&self.config, &parameters.layers, &self.device);
        Ok(())
    }
}

impl QNetwork {
    fn predict_rows(&self, rows: &[&[f32]]) -> Result<Vec<Vec<f32>>, AgentError> {
        let model = self.model.valid();
        let input = self.input_tensor::<InferBackend>(rows, &self.device);
        Self::rows(model.forward(input), self.config.action_count)
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::encode_observation;

    fn network(architecture: Architecture, seed: u64) -> QNetwork {
        let mut rng = StdRng::seed_from_u64(seed);
        QNetwork::new(
            NetworkConfig::blackjack(vec![16, 16], architecture),
            OptimizerConfig::adam(1e-2),
            &mut rng,
        )
    }

    #[test]
    fn test_output_width_and_shape_errors() {
        let net = network(Architecture::Dueling, 1);
        let obs = encode_observation(15, 10, false, true);
        assert_eq!(net.predict(&obs).unwrap().len(), ACTION_COUNT);
        assert!(matches!(
            net.predict(&obs[..29]),
            Err(AgentError::ShapeMismatch { expected: 30, got: 29, .. })
        ));
    }

    #[test]
    fn test_batch_matches_single_predictions() {
        let net = network(Architecture::Plain, 9);
        let states = vec![
            encode_observation(8, 3, false, true),
            encode_observation(19, 1, true, false),
        ];
        let batch = net.predict_batch(&states).unwrap();
        assert_eq!(batch.len(), 2);
        for (state, row) in states.iter().zip(&batch) {
            let single = net.predict(state).unwrap();
            for (a, b) in single.iter().zip(row) {
                assert!((a - b).abs() < 1e-6);
            }
        }
        assert!(net.predict_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = network(Architecture::Dueling, 10);
        let b = network(Architecture::Dueling, 10);
        assert_eq!(a.parameters().unwrap(), b.parameters().unwrap());
    }

    #[test]
    fn test_dueling_max_q_equals_state_value() {
        let net = network(Architecture::Dueling, 2);
        for sum in 4..=21 {
            for card in 1..=10 {
                let obs = encode_observation(sum, card, false, true);
                let q = net.predict(&obs).unwrap();
                let (v, _) = net.dueling_parts(&obs).unwrap().unwrap();
                let max_q = q.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                assert!((max_q - v).abs() < 1e-5);
            }
        }
        assert!(network(Architecture::Plain, 2)
            .dueling_parts(&encode_observation(12, 2, false, true))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_argmax_ties_lowest_index() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[f32::NEG_INFINITY, 0.0, f32::NEG_INFINITY, 0.0]), 1);
        assert_eq!(argmax(&[0.5, 0.5, 0.5, 0.5]), 0);
    }

    #[test]
    fn test_set_parameters_copies_exactly() {
        let source = network(Architecture::Dueling, 3);
        let mut dest = network(Architecture::Dueling, 4);
        let obs = encode_observation(13, 4, true, true);
        assert_ne!(source.predict(&obs).unwrap(), dest.predict(&obs).unwrap());
        dest.set_parameters(&source.parameters().unwrap()).unwrap();
        assert_eq!(source.parameters().unwrap(), dest.parameters().unwrap());
        assert_eq!(source.predict(&obs).unwrap(), dest.predict(&obs).unwrap());
    }

    #[test]
    fn test_set_parameters_rejects_other_shapes() {
        let dueling = network(Architecture::Dueling, 5);
        let mut plain = network(Architecture::Plain, 5);
        assert!(plain.set_parameters(&dueling.parameters().unwrap()).is_err());

        let mut params = plain.parameters().unwrap();
        params.layers[0].weights.pop();
        assert!(matches!(
            plain.set_parameters(&params),
            Err(AgentError::ShapeMismatch { what: "layer weights", .. })
        ));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut net = network(Architecture::Dueling, 11);
        let copy = net.clone();
        let states = vec![encode_observation(20, 10, false, true)];
        net.fit(&FitBatch {
            states: &states,
            actions: &[Action::Stick],
            targets: &[1.0],
        })
        .unwrap();
        assert_ne!(net.parameters().unwrap(), copy.parameters().unwrap());
    }

    fn fit_reduces_loss(architecture: Architecture) {
        let mut net = network(architecture, 6);
        let states = vec![
            encode_observation(20, 10, false, true),
            encode_observation(12, 6, false, true),
            encode_observation(16, 1, true, false),
        ];
        let actions = vec![Action::Stick, Action::Hit, Action::Double];
        let targets = vec![0.5, -0.25, 1.0];
        let batch = FitBatch {
            states: &states,
            actions: &actions,
            targets: &targets,
        };
        let first = net.fit(&batch).unwrap();
        let mut last = first;
        for _ in 0..300 {
            last = net.fit(&batch).unwrap();
        }
        assert!(last < first * 0.1, "loss {first} -> {last}");
    }

    #[test]
    fn test_fit_reduces_loss_dueling() {
        fit_reduces_loss(Architecture::Dueling);
    }

    #[test]
    fn test_fit_reduces_loss_plain() {
        fit_reduces_loss(Architecture::Plain);
    }

    #[test]
    fn test_fit_returns_mean_squared_error() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut net = QNetwork::new(
            NetworkConfig::blackjack(vec![8], Architecture::Dueling),
            OptimizerConfig::sgd(0.0),
            &mut rng,
        );
        let states = vec![
            encode_observation(14, 7, false, true),
            encode_observation(9, 2, false, true),
        ];
        let actions = [Action::Hit, Action::Double];
        let targets = [0.3, -1.2];
        let expected: f32 = states
            .iter()
            .zip(actions.iter().zip(&targets))
            .map(|(s, (a, y))| (net.predict(s).unwrap()[a.index()] - y).powi(2))
            .sum::<f32>()
            / 2.0;
        let loss = net
            .fit(&FitBatch {
                states: &states,
                actions: &actions,
                targets: &targets,
            })
            .unwrap();
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_fit_validates_batch() {
        let mut net = network(Architecture::Plain, 7);
        let states = vec![encode_observation(20, 10, false, true)];
        let batch = FitBatch {
            states: &states,
            actions: &[],
            targets: &[1.0],
        };
        assert!(matches!(net.fit(&batch), Err(AgentError::ShapeMismatch { what: "actions", .. })));
        let empty = FitBatch {
            states: &[],
            actions: &[],
            targets: &[],
        };
        assert!(matches!(net.fit(&empty), Err(AgentError::EmptyBatch)));
    }
}
