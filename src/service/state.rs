//! Episode state management

use std::fmt;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use tracing::warn;

use super::action_mask::invalid_actions_from_state;
use super::observation::{observation_from_state, Observation};
use crate::error::EnvError;
use crate::game::{
    best_sum, has_usable_ace, step_reward, Action, ActionSet, Card, Outcome, BLACKJACK, DECK,
    DEALER_STANDS_ON,
};

/// Episode stage, derived from the state flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    FirstRound,
    Resolving,
    Terminal,
}

/// Optional constraints on the opening deal, used for sweeps over starting
/// configurations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetConstraints {
    pub player_sum: Option<u8>,
    pub dealer_card: Option<u8>,
    pub usable_ace: Option<bool>,
}

impl ResetConstraints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn player_sum(mut self, sum: u8) -> Self {
        self.player_sum = Some(sum);
        self
    }

    pub fn dealer_card(mut self, rank: u8) -> Self {
        self.dealer_card = Some(rank);
        self
    }

    pub fn usable_ace(mut self, usable: bool) -> Self {
        self.usable_ace = Some(usable);
        self
    }

    fn accepts(&self, hand: &[Card]) -> bool {
        let sum = best_sum(hand);
        sum < BLACKJACK
            && self.player_sum.map_or(true, |s| s == sum)
            && self.usable_ace.map_or(true, |u| u == has_usable_ace(hand))
    }
}

/// Result of a valid step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub invalid_actions: ActionSet,
}

/// Blackjack environment state for one episode.
pub struct EnvState {
    pub rng: StdRng,

    // Hands
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    pub player_sum: u8,
    pub dealer_sum: u8,
    pub usable_ace: bool,

    // Episode flags
    pub dealer_visible: bool,
    pub first_round: bool,
    pub done: bool,
    pub reward: f32,
}

impl EnvState {
    pub fn new(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            player: Vec::new(),
            dealer: Vec::new(),
            player_sum: 0,
            dealer_sum: 0,
            usable_ace: false,
            dealer_visible: false,
            first_round: false,
            // Nothing to step until the first reset
            done: true,
            reward: 0.0,
        }
    }

    pub fn stage(&self) -> Stage {
        if self.player.is_empty() {
            Stage::NotStarted
        } else if self.done {
            Stage::Terminal
        } else if self.first_round {
            Stage::FirstRound
        } else {
            Stage::Resolving
        }
    }

    /// The dealer's up card. Only meaningful after a reset.
    pub fn dealer_up_card(&self) -> Option<Card> {
        self.dealer.first().copied()
    }

    pub fn invalid_actions(&self) -> ActionSet {
        invalid_actions_from_state(self)
    }

    pub fn observation(&self) -> Observation {
        observation_from_state(self)
    }

    /// Start a new episode.
    ///
    /// The player's pair is searched over every two-card combination in
    /// random order, so the search is bounded and either finds a deal or
    /// proves the constraints unsatisfiable. Starting 21s are never dealt.
    pub fn reset(
        &mut self,
        constraints: ResetConstraints,
    ) -> Result<(Observation, ActionSet), EnvError> {
        let forced_up = constraints
            .dealer_card
            .map(|rank| Card::new(rank).ok_or(EnvError::InvalidRank { rank }))
            .transpose()?;

        let player = self.deal_player(&constraints).ok_or_else(|| {
            warn!(
                player_sum = ?constraints.player_sum,
                usable_ace = ?constraints.usable_ace,
                "starting deal constraints cannot be met"
            );
            EnvError::UnsatisfiableDeal {
                player_sum: constraints.player_sum,
                usable_ace: constraints.usable_ace,
            }
        })?;

        let up = forced_up.unwrap_or_else(|| Card::draw(&mut self.rng));
        let hole = Card::draw_hole_card(up, &mut self.rng);

        self.player_sum = best_sum(&player);
        self.usable_ace = has_usable_ace(&player);
        self.player = player;
        self.dealer = vec![up, hole];
        self.dealer_sum = best_sum(&self.dealer);
        self.dealer_visible = false;
        self.first_round = true;
        self.done = false;
        self.reward = 0.0;

        Ok((self.observation(), self.invalid_actions()))
    }

    fn deal_player(&mut self, constraints: &ResetConstraints) -> Option<Vec<Card>> {
        let mut pairs: Vec<(u8, u8)> = DECK
            .iter()
            .flat_map(|&a| DECK.iter().map(move |&b| (a, b)))
            .collect();
        pairs.shuffle(&mut self.rng);

        pairs
            .into_iter()
            .map(|(a, b)| vec![Card { rank: a }, Card { rank: b }])
            .find(|hand| constraints.accepts(hand))
    }

    /// Apply one action.
    ///
    /// Returns `None` without touching the state when the episode is over or
    /// when Double/Surrender is requested after the first round. Other
    /// invalid actions are not re-checked here; callers consult
    /// [`EnvState::invalid_actions`] first.
    pub fn step(&mut self, action: Action) -> Option<StepResult> {
        if self.done || (!self.first_round && action.first_round_only()) {
            return None;
        }

        if action.draws() {
            self.player.push(Card::draw(&mut self.rng));
            self.player_sum = best_sum(&self.player);
            self.usable_ace = has_usable_ace(&self.player);
        }

        if matches!(action, Action::Double | Action::Stick) && self.player_sum <= BLACKJACK {
            while self.dealer_sum < DEALER_STANDS_ON {
                self.dealer.push(Card::draw(&mut self.rng));
                self.dealer_sum = best_sum(&self.dealer);
            }
            self.dealer_visible = true;
        }

        self.done = self.player_sum > BLACKJACK || action != Action::Hit;
        self.first_round = false;
        self.reward = step_reward(&Outcome {
            action,
            player_sum: self.player_sum,
            dealer_sum: self.dealer_sum,
            done: self.done,
        });

        Some(StepResult {
            observation: self.observation(),
            reward: self.reward,
            done: self.done,
            invalid_actions: self.invalid_actions(),
        })
    }
}

fn join_cards(cards: &[Card]) -> String {
    cards.iter().map(Card::to_string).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for EnvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dealer_visible {
            writeln!(f, "Dealer: {}", join_cards(&self.dealer))?;
            writeln!(f, "-> {}", self.dealer_sum)?;
        } else if let Some(up) = self.dealer_up_card() {
            writeln!(f, "Dealer: {}, ?", up)?;
        }

        if !self.player.is_empty() {
            writeln!(f, "\nPlayer: {}", join_cards(&self.player))?;
            if self.usable_ace && !self.done {
                let hard: u8 = self.player.iter().map(|c| c.rank).sum();
                writeln!(f, "-> {}/{}\n", hard, self.player_sum)?;
            } else {
                writeln!(f, "-> {}\n", self.player_sum)?;
            }
        }

        if self.stage() == Stage::Terminal {
            let winner = if self.reward > 0.0 {
                "Player"
            } else if self.reward < 0.0 {
                "Dealer"
            } else {
                "None"
            };
            writeln!(f, "Winner: {}", winner)?;
        }
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
