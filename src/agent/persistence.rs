//! Saving and loading trained networks as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::network::{NetworkConfig, Parameters, QFunction, QNetwork};
use super::optimizer::OptimizerConfig;
use crate::error::AgentError;

/// On-disk form of a network. Optimizer moments are not kept; a loaded
/// network resumes with fresh optimizer state.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedNetwork {
    pub config: NetworkConfig,
    pub optimizer: OptimizerConfig,
    pub parameters: Parameters,
}

/// `<dir>/<name>/<name>_<h1>_<h2>...json`, one suffix per hidden layer.
pub fn model_path(dir: &Path, name: &str, hidden_layers: &[usize]) -> PathBuf {
    let mut file = name.to_string();
    for units in hidden_layers {
        file.push_str(&format!("_{units}"));
    }
    file.push_str(".json");
    dir.join(name).join(file)
}

pub fn save(network: &QNetwork, dir: &Path, name: &str) -> Result<PathBuf, AgentError> {
    let path = model_path(dir, name, &network.config().hidden_layers);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let saved = SavedNetwork {
        config: network.config().clone(),
        optimizer: network.optimizer_config(),
        parameters: network.parameters()?,
    };
    fs::write(&path, serde_json::to_string(&saved)?)?;
    info!(path = %path.display(), "model saved");
    Ok(path)
}

pub fn load(path: &Path) -> Result<QNetwork, AgentError> {
    let saved: SavedNetwork = serde_json::from_str(&fs::read_to_string(path)?)?;
    let network = QNetwork::from_parameters(saved.config, saved.optimizer, &saved.parameters)?;
    info!(path = %path.display(), "model loaded");
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::network::Architecture;
    use crate::service::encode_observation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_model_path_layout() {
        let path = model_path(Path::new("models"), "bj", &[64, 32]);
        assert_eq!(path, PathBuf::from("models/bj/bj_64_32.json"));
    }

    #[test]
    fn test_save_load_round_trip_exact() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let network = QNetwork::new(
            NetworkConfig::blackjack(vec![12, 8], Architecture::Dueling),
            OptimizerConfig::sgd(0.01),
            &mut rng,
        );

        let path = save(&network, dir.path(), "test").unwrap();
        assert!(path.ends_with("test/test_12_8.json"));

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.parameters().unwrap(), network.parameters().unwrap());
        assert_eq!(loaded.config(), network.config());
        assert_eq!(loaded.optimizer_config(), OptimizerConfig::sgd(0.01));
        let obs = encode_observation(17, 1, true, true);
        assert_eq!(loaded.predict(&obs).unwrap(), network.predict(&obs).unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("missing.json")),
            Err(AgentError::Io(_))
        ));
    }
}
