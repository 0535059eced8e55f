use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("dealer card must be a rank in 1..=10 (got {rank})")]
    InvalidRank { rank: u8 },
    #[error("no starting hand has sum {player_sum:?} with usable ace {usable_ace:?}")]
    UnsatisfiableDeal {
        player_sum: Option<u8>,
        usable_ace: Option<bool>,
    },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("cannot sample from an empty replay buffer")]
    EmptyReplayBuffer,
    #[error("{what} has width {got} (expected {expected})")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("action index {index} is out of range (action count {count})")]
    ActionOutOfRange { index: usize, count: usize },
    #[error("batch is empty")]
    EmptyBatch,
    #[error("every action is invalid")]
    NoValidAction,
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tensor data error: {0}")]
    Tensor(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: usize },
    #[error("{field} must be in [0, 1] (got {value})")]
    InvalidProbability { field: &'static str, value: f64 },
    #[error("{field} must be finite and > 0 (got {value})")]
    InvalidPositive { field: &'static str, value: f64 },
    #[error("hidden_layers must contain at least one non-zero layer")]
    EmptyNetwork,
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
}
