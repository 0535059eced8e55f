//! Learning agent
//!
//! - `network`: Q-value network (dueling or plain head) and the `QFunction` trait
//! - `optimizer`: burn SGD or Adam, chosen by config
//! - `replay`: fixed-capacity experience replay
//! - `trainer`: epsilon-greedy selection and Double-DQN updates
//! - `runner`: episode loop, target sync schedule, greedy evaluation
//! - `strategy`: greedy strategy tables and their comparison
//! - `persistence`: JSON model files

pub mod network;
pub mod optimizer;
pub mod persistence;
pub mod replay;
pub mod runner;
pub mod strategy;
pub mod trainer;

pub use network::{argmax, Architecture, FitBatch, NetworkConfig, Parameters, QFunction, QNetwork};
pub use optimizer::{ModelOptimizer, OptimizerConfig};
pub use replay::{Batch, ReplayBuffer, Transition};
pub use runner::{evaluate, run_training, sweep_starts, TrainingReport};
pub use strategy::{Play, StrategyTable};
pub use trainer::{greedy_action, mask_invalid, td_target, Trainer};
