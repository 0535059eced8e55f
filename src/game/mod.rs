//! Game core
//!
//! Blackjack rule definitions:
//! - `constants`: rule, reward, observation and action constants
//! - `cards`: cards, infinite-replacement deck, hand evaluation
//! - `actions`: player actions and action sets
//! - `reward`: per-step reward rules
//!
//! Episode state lives in `service`; this module only holds pure rules.

pub mod actions;
pub mod cards;
pub mod constants;
pub mod reward;

pub use actions::{Action, ActionSet};
pub use cards::{best_sum, hand_sum, has_usable_ace, is_bust, Card};
pub use constants::*;
pub use reward::{step_reward, Outcome};
