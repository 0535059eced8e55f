//! Optimizer selection for the value network.
//!
//! The update rules themselves are burn's; this module maps the serialisable
//! configuration onto them and hides the concrete optimizer type.

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        learning_rate: f32,
    },
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
}

impl OptimizerConfig {
    pub fn sgd(learning_rate: f32) -> Self {
        OptimizerConfig::Sgd { learning_rate }
    }

    /// Adam with the usual moment decay rates.
    pub fn adam(learning_rate: f32) -> Self {
        OptimizerConfig::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        match *self {
            OptimizerConfig::Sgd { learning_rate } | OptimizerConfig::Adam { learning_rate, .. } => {
                learning_rate
            }
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam(1e-3)
    }
}

/// Object-safe view of a burn optimizer for one module type.
trait StepModule<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    fn step_module(&mut self, learning_rate: f64, module: M, grads: GradientsParams) -> M;
}

impl<M, B, O> StepModule<M, B> for O
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn step_module(&mut self, learning_rate: f64, module: M, grads: GradientsParams) -> M {
        self.step(learning_rate, module, grads)
    }
}

/// Configured optimizer bound to one module type.
pub struct ModelOptimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    config: OptimizerConfig,
    inner: Box<dyn StepModule<M, B>>,
}

impl<M, B> ModelOptimizer<M, B>
where
    B: AutodiffBackend + 'static,
    M: AutodiffModule<B> + 'static,
{
    pub fn new(config: OptimizerConfig) -> Self {
        let inner: Box<dyn StepModule<M, B>> = match config {
            OptimizerConfig::Sgd { .. } => Box::new(SgdConfig::new().init::<B, M>()),
            OptimizerConfig::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } => Box::new(
                AdamConfig::new()
                    .with_beta_1(beta1)
                    .with_beta_2(beta2)
                    .with_epsilon(epsilon)
                    .init::<B, M>(),
            ),
        };
        Self { config, inner }
    }

    pub fn config(&self) -> OptimizerConfig {
        self.config
    }

    /// Apply one update and return the updated module.
    pub fn step(&mut self, module: M, grads: GradientsParams) -> M {
        self.inner
            .step_module(self.config.learning_rate() as f64, module, grads)
    }
}
