//! Blackjack environment with a Double-DQN learner.
//!
//! - `game`: card and reward rules
//! - `service`: the episode environment
//! - `agent`: networks, replay, training and strategy tables
//! - `config`: training run configuration

pub mod agent;
pub mod config;
pub mod error;
pub mod game;
pub mod service;
