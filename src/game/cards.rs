//! Card, deck and hand evaluation

use rand::Rng;

use super::constants::{ACE, BLACKJACK, DECK, MAX_RANK, MIN_RANK, SOFT_ACE_BONUS, TEN};

/// Ten-valued cards are folded into rank 10, so a card is just its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card {
    pub rank: u8, // 1..=10 (Ace = 1)
}

impl Card {
    pub fn new(rank: u8) -> Option<Self> {
        (MIN_RANK..=MAX_RANK).contains(&rank).then_some(Self { rank })
    }

    pub fn is_ace(&self) -> bool {
        self.rank == ACE
    }

    pub fn is_ten(&self) -> bool {
        self.rank == TEN
    }

    /// Draw one card with replacement.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::draw_from(&DECK, rng)
    }

    /// Draw uniformly from a slice of the deck multiset.
    ///
    /// `pool` must be a non-empty slice of `DECK`; every caller passes a
    /// constant sub-slice.
    pub(crate) fn draw_from<R: Rng + ?Sized>(pool: &[u8], rng: &mut R) -> Self {
        let rank = pool[rng.gen_range(0..pool.len())];
        Self { rank }
    }

    /// Dealer hole card for a given up card, excluding a natural.
    pub fn draw_hole_card<R: Rng + ?Sized>(up: Card, rng: &mut R) -> Self {
        if up.is_ace() {
            // No ten under an Ace
            Self::draw_from(&DECK[..9], rng)
        } else if up.is_ten() {
            // No Ace under a ten
            Self::draw_from(&DECK[1..], rng)
        } else {
            Self::draw(rng)
        }
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ace() {
            write!(f, "A")
        } else {
            write!(f, "{}", self.rank)
        }
    }
}

/// Hard total: every Ace counted as 1.
pub fn hand_sum(hand: &[Card]) -> u8 {
    hand.iter().map(|c| c.rank).sum()
}

/// An Ace can count as 11 without busting.
pub fn has_usable_ace(hand: &[Card]) -> bool {
    hand.iter().any(Card::is_ace) && hand_sum(hand) + SOFT_ACE_BONUS <= BLACKJACK
}

/// Soft total when an Ace is usable, hard total otherwise.
pub fn best_sum(hand: &[Card]) -> u8 {
    if has_usable_ace(hand) {
        hand_sum(hand) + SOFT_ACE_BONUS
    } else {
        hand_sum(hand)
    }
}

pub fn is_bust(hand: &[Card]) -> bool {
    best_sum(hand) > BLACKJACK
}

// ============================================================================
// Unit tests
// ============================================================================
