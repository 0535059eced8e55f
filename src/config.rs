//! Training run configuration
//!
//! Every field has a default, so a JSON config file only needs the values
//! it changes.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::agent::network::{Architecture, NetworkConfig};
use crate::agent::optimizer::OptimizerConfig;
use crate::error::{AgentError, ConfigError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<usize>,
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(default)]
    pub optimizer: OptimizerKind,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f32,

    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_warmup_transitions")]
    pub warmup_transitions: usize,
    #[serde(default = "default_train_every")]
    pub train_every: usize,
    #[serde(default = "default_target_sync_interval")]
    pub target_sync_interval: u64,

    #[serde(default = "default_episodes")]
    pub episodes: usize,
    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,
    #[serde(default = "default_epsilon_min")]
    pub epsilon_min: f64,
    #[serde(default = "default_epsilon_decay")]
    pub epsilon_decay: f64,
    #[serde(default = "default_sweep_starts")]
    pub sweep_starts: bool,
    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_log_every")]
    pub log_every: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_hidden_layers() -> Vec<usize> {
    vec![64, 64]
}

fn default_learning_rate() -> f32 {
    1e-3
}

fn default_discount_factor() -> f32 {
    0.95
}

fn default_replay_capacity() -> usize {
    50_000
}

fn default_batch_size() -> usize {
    64
}

fn default_warmup_transitions() -> usize {
    1_000
}

fn default_train_every() -> usize {
    1
}

fn default_target_sync_interval() -> u64 {
    500
}

fn default_episodes() -> usize {
    50_000
}

fn default_epsilon_start() -> f64 {
    1.0
}

fn default_epsilon_min() -> f64 {
    0.01
}

fn default_epsilon_decay() -> f64 {
    0.9995
}

fn default_sweep_starts() -> bool {
    true
}

fn default_log_every() -> usize {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model_dir() -> String {
    "models".to_string()
}

fn default_model_name() -> String {
    "blackjack".to_string()
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            hidden_layers: default_hidden_layers(),
            architecture: Architecture::default(),
            optimizer: OptimizerKind::default(),
            learning_rate: default_learning_rate(),
            discount_factor: default_discount_factor(),
            replay_capacity: default_replay_capacity(),
            batch_size: default_batch_size(),
            warmup_transitions: default_warmup_transitions(),
            train_every: default_train_every(),
            target_sync_interval: default_target_sync_interval(),
            episodes: default_episodes(),
            epsilon_start: default_epsilon_start(),
            epsilon_min: default_epsilon_min(),
            epsilon_decay: default_epsilon_decay(),
            sweep_starts: default_sweep_starts(),
            seed: 0,
            log_every: default_log_every(),
            log_level: default_log_level(),
            model_dir: default_model_dir(),
            model_name: default_model_name(),
        }
    }
}

fn check_non_zero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidProbability { field, value });
    }
    Ok(())
}

impl TrainerConfig {
    pub fn from_json(json: &str) -> Result<Self, AgentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, AgentError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_zero("replay_capacity", self.replay_capacity)?;
        check_non_zero("batch_size", self.batch_size)?;
        check_non_zero("train_every", self.train_every)?;
        check_non_zero("target_sync_interval", self.target_sync_interval as usize)?;
        check_non_zero("log_every", self.log_every)?;

        check_probability("discount_factor", self.discount_factor as f64)?;
        check_probability("epsilon_start", self.epsilon_start)?;
        check_probability("epsilon_min", self.epsilon_min)?;
        check_probability("epsilon_decay", self.epsilon_decay)?;

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidPositive {
                field: "learning_rate",
                value: self.learning_rate as f64,
            });
        }
        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return Err(ConfigError::EmptyNetwork);
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
            value: self.log_level.clone(),
        })
    }

    /// Exploration rate for an episode: exponential decay, floored at
    /// `epsilon_min`.
    pub fn epsilon_at(&self, episode: usize) -> f64 {
        let exponent = episode.min(i32::MAX as usize) as i32;
        (self.epsilon_start * self.epsilon_decay.powi(exponent)).max(self.epsilon_min)
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        match self.optimizer {
            OptimizerKind::Adam => OptimizerConfig::adam(self.learning_rate),
            OptimizerKind::Sgd => OptimizerConfig::sgd(self.learning_rate),
        }
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig::blackjack(self.hidden_layers.clone(), self.architecture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.hidden_layers, vec![64, 64]);
        assert_eq!(config.architecture, Architecture::Dueling);
        assert_eq!(config.replay_capacity, 50_000);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.target_sync_interval, 500);
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            TrainerConfig::from_json(r#"{"episodes": 10, "architecture": "plain", "optimizer": "sgd"}"#)
                .unwrap();
        assert_eq!(config.episodes, 10);
        assert_eq!(config.architecture, Architecture::Plain);
        assert_eq!(config.optimizer_config(), OptimizerConfig::sgd(1e-3));
        assert_eq!(config.discount_factor, 0.95);
        assert_eq!(config.model_name, "blackjack");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = TrainerConfig::default();

        let config = TrainerConfig {
            replay_capacity: 0,
            ..base.clone()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidNonZero {
                field: "replay_capacity",
                value: 0
            })
        );

        let config = TrainerConfig {
            batch_size: 0,
            ..base.clone()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNonZero { field: "batch_size", .. })
        ));

        let config = TrainerConfig {
            discount_factor: 1.5,
            ..base.clone()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability { field: "discount_factor", .. })
        ));

        let config = TrainerConfig {
            epsilon_start: -0.1,
            ..base.clone()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability { field: "epsilon_start", .. })
        ));

        let config = TrainerConfig {
            hidden_layers: vec![],
            ..base.clone()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyNetwork));

        let config = TrainerConfig {
            log_level: "loud".to_string(),
            ..base
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));
    }

    #[test]
    fn test_epsilon_schedule() {
        let config = TrainerConfig {
            epsilon_start: 1.0,
            epsilon_min: 0.1,
            epsilon_decay: 0.5,
            ..TrainerConfig::default()
        };
        assert_eq!(config.epsilon_at(0), 1.0);
        assert_eq!(config.epsilon_at(1), 0.5);
        assert_eq!(config.epsilon_at(2), 0.25);
        assert_eq!(config.epsilon_at(10), 0.1);
        assert_eq!(config.epsilon_at(usize::MAX), 0.1);
    }
}
