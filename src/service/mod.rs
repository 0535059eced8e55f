//! Environment service layer
//!
//! Episode state management, observation building and the invalid-action set.

pub mod action_mask;
pub mod observation;
pub mod state;

pub use action_mask::{invalid_actions, invalid_actions_from_state};
pub use observation::{encode_observation, observation_from_state, Observation};
pub use state::{EnvState, ResetConstraints, Stage, StepResult};

#[cfg(test)]
mod integration_tests;
