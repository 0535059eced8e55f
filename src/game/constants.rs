//! Game constants

// ============================================================================
// Rule constants
// ============================================================================

/// Deck multiset for one suit cycle: A, 2..9 and four ten-valued cards.
/// Cards are drawn with replacement, so this is also the draw distribution.
pub const DECK: [u8; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10];

pub const ACE: u8 = 1;
pub const TEN: u8 = 10;
pub const MIN_RANK: u8 = 1;
pub const MAX_RANK: u8 = 10;

pub const BLACKJACK: u8 = 21;
pub const DEALER_STANDS_ON: u8 = 17;     // stands on soft 17 too
pub const SOFT_ACE_BONUS: u8 = 10;       // Ace counted as 11 instead of 1

// ============================================================================
// Reward constants
// ============================================================================

pub const REWARD_WIN: f32 = 1.0;
pub const REWARD_LOSS: f32 = -1.0;
pub const REWARD_PUSH: f32 = 0.0;
pub const REWARD_SURRENDER: f32 = -0.5;
pub const DOUBLE_MULTIPLIER: f32 = 2.0;

// ============================================================================
// Observation constants
// ============================================================================

pub const PLAYER_SUM_OFFSET: u8 = 4;     // lowest two-card sum (2 + 2)
pub const PLAYER_SUM_BINS: usize = 18;   // sums 4..=20, last bin holds 21+
pub const DEALER_CARD_BINS: usize = 10;  // ranks 1..=10
pub const FLAG_FEATURES: usize = 2;      // usable ace, first round

pub const OBS_SIZE: usize = PLAYER_SUM_BINS + DEALER_CARD_BINS + FLAG_FEATURES;

// ============================================================================
// Action constants
// ============================================================================

pub const ACTION_STICK: usize = 0;
pub const ACTION_HIT: usize = 1;
pub const ACTION_DOUBLE: usize = 2;
pub const ACTION_SURRENDER: usize = 3;

pub const ACTION_COUNT: usize = 4;

// Observation layout:
// [0..18]:  player best-sum one-hot, min(sum - 4, 17)
// [18..28]: dealer visible card one-hot, rank - 1
// [28]:     usable ace
// [29]:     first round
pub const DEALER_CARD_OFFSET: usize = PLAYER_SUM_BINS;
pub const USABLE_ACE_INDEX: usize = PLAYER_SUM_BINS + DEALER_CARD_BINS;
pub const FIRST_ROUND_INDEX: usize = USABLE_ACE_INDEX + 1;
