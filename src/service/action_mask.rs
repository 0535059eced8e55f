//! Invalid-action set

use super::state::EnvState;
use crate::game::{Action, ActionSet, BLACKJACK};

/// Highest total at which standing can never beat drawing.
const MUST_DRAW_MAX: u8 = 11;

/// Invalid actions for a table position.
pub fn invalid_actions(player_sum: u8, first_round: bool) -> ActionSet {
    let mut invalid = ActionSet::empty();

    // Double and Surrender only on the first decision
    if !first_round {
        invalid.insert(Action::Double);
        invalid.insert(Action::Surrender);
    }

    if player_sum == BLACKJACK {
        invalid.insert(Action::Hit);
        invalid.insert(Action::Double);
        invalid.insert(Action::Surrender);
    } else if player_sum <= MUST_DRAW_MAX {
        // No card can bust the hand, so standing is never right
        invalid.insert(Action::Stick);
    }

    invalid
}

/// Invalid actions for the current state.
pub fn invalid_actions_from_state(state: &EnvState) -> ActionSet {
    invalid_actions(state.player_sum, state.first_round)
}

// ============================================================================
// Unit tests
// ============================================================================
