//! Observation building
//!
//! Fixed-width feature vector:
//! - player best-sum one-hot (18 bins, 21+ share the last bin)
//! - dealer up card one-hot (10 bins)
//! - usable ace flag
//! - first round flag

use super::state::EnvState;
use crate::game::{
    DEALER_CARD_BINS, DEALER_CARD_OFFSET, FIRST_ROUND_INDEX, OBS_SIZE, PLAYER_SUM_BINS,
    PLAYER_SUM_OFFSET, USABLE_ACE_INDEX,
};

pub type Observation = [f32; OBS_SIZE];

/// Encode a table position.
///
/// Sums above 21 are clamped into the last bin; sums below 4 never occur in
/// play and are clamped into the first.
pub fn encode_observation(
    player_sum: u8,
    dealer_card: u8,
    usable_ace: bool,
    first_round: bool,
) -> Observation {
    let mut data = [0.0; OBS_SIZE];

    let sum_bin = (player_sum.saturating_sub(PLAYER_SUM_OFFSET) as usize).min(PLAYER_SUM_BINS - 1);
    data[sum_bin] = 1.0;

    let card_bin = (dealer_card.saturating_sub(1) as usize).min(DEALER_CARD_BINS - 1);
    data[DEALER_CARD_OFFSET + card_bin] = 1.0;

    data[USABLE_ACE_INDEX] = if usable_ace { 1.0 } else { 0.0 };
    data[FIRST_ROUND_INDEX] = if first_round { 1.0 } else { 0.0 };

    data
}

/// Build the observation for the current state.
pub fn observation_from_state(state: &EnvState) -> Observation {
    let dealer_card = state.dealer_up_card().map(|c| c.rank).unwrap_or(1);
    encode_observation(
        state.player_sum,
        dealer_card,
        state.usable_ace,
        state.first_round,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(block: &[f32]) -> usize {
        block.iter().filter(|&&v| v == 1.0).count()
    }

    #[test]
    fn test_layout() {
        let obs = encode_observation(4, 1, false, true);
        assert_eq!(obs.len(), 30);
        assert_eq!(obs[0], 1.0);
        assert_eq!(obs[DEALER_CARD_OFFSET], 1.0);
        assert_eq!(obs[USABLE_ACE_INDEX], 0.0);
        assert_eq!(obs[FIRST_ROUND_INDEX], 1.0);
    }

    #[test]
    fn test_one_hot_blocks() {
        for sum in 4..=30 {
            for card in 1..=10 {
                let obs = encode_observation(sum, card, sum % 2 == 0, false);
                assert_eq!(ones(&obs[..PLAYER_SUM_BINS]), 1);
                assert_eq!(ones(&obs[DEALER_CARD_OFFSET..USABLE_ACE_INDEX]), 1);
                assert_eq!(obs[DEALER_CARD_OFFSET + card as usize - 1], 1.0);
            }
        }
    }

    #[test]
    fn test_bust_sums_share_last_bin() {
        let at_21 = encode_observation(21, 5, false, false);
        let bust = encode_observation(26, 5, false, false);
        assert_eq!(at_21, bust);
        assert_eq!(at_21[PLAYER_SUM_BINS - 1], 1.0);
    }

    #[test]
    fn test_state_observation_matches_encoder() {
        let mut state = EnvState::new(21);
        state.reset(Default::default()).unwrap();
        let expected = encode_observation(
            state.player_sum,
            state.dealer[0].rank,
            state.usable_ace,
            true,
        );
        assert_eq!(state.observation(), expected);
    }
}
