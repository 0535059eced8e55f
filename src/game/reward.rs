//! Reward assignment
//!
//! Rewards are evaluated once per step, in this order:
//!
//! | Condition                                                  | Reward |
//! |------------------------------------------------------------|--------|
//! | surrender                                                  | -0.5   |
//! | done, player bust or dealer (not bust) above player        | -1     |
//! | done, dealer bust or player (not bust) above dealer        | +1     |
//! | anything else (push, hand still running)                   | 0      |
//!
//! A double multiplies the result by two.

use super::actions::Action;
use super::constants::{
    BLACKJACK, DOUBLE_MULTIPLIER, REWARD_LOSS, REWARD_PUSH, REWARD_SURRENDER, REWARD_WIN,
};

/// Final totals of one step, as seen by the reward rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub action: Action,
    pub player_sum: u8,
    pub dealer_sum: u8,
    pub done: bool,
}

pub fn step_reward(outcome: &Outcome) -> f32 {
    let Outcome { action, player_sum, dealer_sum, done } = *outcome;
    let player_bust = player_sum > BLACKJACK;
    let dealer_bust = dealer_sum > BLACKJACK;

    let reward = if action == Action::Surrender {
        REWARD_SURRENDER
    } else if done && (player_bust || (!dealer_bust && dealer_sum > player_sum)) {
        REWARD_LOSS
    } else if done && (dealer_bust || (!player_bust && player_sum > dealer_sum)) {
        REWARD_WIN
    } else {
        REWARD_PUSH
    };

    if action == Action::Double {
        reward * DOUBLE_MULTIPLIER
    } else {
        reward
    }
}
