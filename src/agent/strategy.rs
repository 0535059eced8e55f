//! Strategy tables
//!
//! A strategy table lists one play per (player sum, usable ace, dealer card)
//! cell. Hard rows cover sums 4..=21, soft rows 12..=21; columns are the
//! dealer's up card A, 2..=10.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::network::QFunction;
use super::trainer::greedy_action;
use crate::error::AgentError;
use crate::game::{Action, BLACKJACK, DEALER_CARD_BINS, PLAYER_SUM_OFFSET};
use crate::service::{encode_observation, invalid_actions};

pub const HARD_MIN: u8 = PLAYER_SUM_OFFSET;
pub const SOFT_MIN: u8 = 12;
pub const HARD_ROWS: usize = (BLACKJACK - HARD_MIN) as usize + 1;
pub const SOFT_ROWS: usize = (BLACKJACK - SOFT_MIN) as usize + 1;

pub type Row = [Play; DEALER_CARD_BINS];

/// A table cell: the first-round action, with the action to fall back to
/// once doubling or surrendering is no longer allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Play {
    #[serde(rename = "S")]
    Stick,
    #[serde(rename = "H")]
    Hit,
    #[serde(rename = "DS")]
    DoubleElseStick,
    #[serde(rename = "DH")]
    DoubleElseHit,
    #[serde(rename = "RS")]
    SurrenderElseStick,
    #[serde(rename = "RH")]
    SurrenderElseHit,
}

impl Play {
    /// Combine a first-round action with its later-round fallback. The
    /// fallback is ignored for Stick and Hit.
    pub fn from_actions(primary: Action, fallback: Action) -> Self {
        let fallback_hits = fallback == Action::Hit;
        match (primary, fallback_hits) {
            (Action::Stick, _) => Play::Stick,
            (Action::Hit, _) => Play::Hit,
            (Action::Double, false) => Play::DoubleElseStick,
            (Action::Double, true) => Play::DoubleElseHit,
            (Action::Surrender, false) => Play::SurrenderElseStick,
            (Action::Surrender, true) => Play::SurrenderElseHit,
        }
    }

    pub fn primary(self) -> Action {
        match self {
            Play::Stick => Action::Stick,
            Play::Hit => Action::Hit,
            Play::DoubleElseStick | Play::DoubleElseHit => Action::Double,
            Play::SurrenderElseStick | Play::SurrenderElseHit => Action::Surrender,
        }
    }

    pub fn fallback(self) -> Action {
        match self {
            Play::Stick | Play::DoubleElseStick | Play::SurrenderElseStick => Action::Stick,
            Play::Hit | Play::DoubleElseHit | Play::SurrenderElseHit => Action::Hit,
        }
    }

    /// The action to take given whether this is the first decision.
    pub fn action(self, first_round: bool) -> Action {
        if first_round {
            self.primary()
        } else {
            self.fallback()
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Play::Stick => "S",
            Play::Hit => "H",
            Play::DoubleElseStick => "DS",
            Play::DoubleElseHit => "DH",
            Play::SurrenderElseStick => "RS",
            Play::SurrenderElseHit => "RH",
        }
    }

    /// 1 for the same play, 0.5 when only the primary or only the fallback
    /// agrees, 0 otherwise.
    pub fn similarity(self, other: Play) -> f64 {
        if self == other {
            1.0
        } else if self.primary() == other.primary() || self.fallback() == other.fallback() {
            0.5
        } else {
            0.0
        }
    }
}

impl fmt::Display for Play {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyTable {
    pub hard: Vec<Row>,
    pub soft: Vec<Row>,
}

impl Default for StrategyTable {
    /// Stick everywhere.
    fn default() -> Self {
        Self {
            hard: vec![[Play::Stick; DEALER_CARD_BINS]; HARD_ROWS],
            soft: vec![[Play::Stick; DEALER_CARD_BINS]; SOFT_ROWS],
        }
    }
}

impl StrategyTable {
    /// Greedy plays of `q` for every cell.
    pub fn from_q_function<Q: QFunction + ?Sized>(q: &Q) -> Result<Self, AgentError> {
        let mut table = Self::default();
        for (row, sum) in (HARD_MIN..=BLACKJACK).enumerate() {
            for card in 1..=DEALER_CARD_BINS as u8 {
                table.hard[row][card as usize - 1] = greedy_play(q, sum, card, false)?;
            }
        }
        for (row, sum) in (SOFT_MIN..=BLACKJACK).enumerate() {
            for card in 1..=DEALER_CARD_BINS as u8 {
                table.soft[row][card as usize - 1] = greedy_play(q, sum, card, true)?;
            }
        }
        Ok(table)
    }

    fn check_shape(&self) -> Result<(), AgentError> {
        for (what, rows, expected) in [
            ("hard rows", self.hard.len(), HARD_ROWS),
            ("soft rows", self.soft.len(), SOFT_ROWS),
        ] {
            if rows != expected {
                return Err(AgentError::ShapeMismatch {
                    what,
                    expected,
                    got: rows,
                });
            }
        }
        Ok(())
    }

    /// Play for a cell. Sums past either end of a table are clamped to its
    /// first or last row; dealer cards outside 1..=10 are clamped too.
    pub fn play(&self, player_sum: u8, dealer_card: u8, usable_ace: bool) -> Play {
        let (rows, min) = if usable_ace {
            (&self.soft, SOFT_MIN)
        } else {
            (&self.hard, HARD_MIN)
        };
        let row = (player_sum.saturating_sub(min) as usize).min(rows.len().saturating_sub(1));
        let column = (dealer_card.clamp(1, DEALER_CARD_BINS as u8) - 1) as usize;
        rows.get(row).map_or(Play::Stick, |r| r[column])
    }

    pub fn action(
        &self,
        player_sum: u8,
        dealer_card: u8,
        usable_ace: bool,
        first_round: bool,
    ) -> Action {
        self.play(player_sum, dealer_card, usable_ace).action(first_round)
    }

    /// Mean cell similarity over both tables, in [0, 1].
    pub fn match_score(&self, other: &StrategyTable) -> f64 {
        let cells: Vec<f64> = self
            .hard
            .iter()
            .zip(&other.hard)
            .chain(self.soft.iter().zip(&other.soft))
            .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| x.similarity(*y)))
            .collect();
        if cells.is_empty() {
            return 0.0;
        }
        cells.iter().sum::<f64>() / cells.len() as f64
    }

    pub fn to_json(&self) -> Result<String, AgentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, AgentError> {
        let table: StrategyTable = serde_json::from_str(json)?;
        table.check_shape()?;
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, AgentError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

fn greedy_play<Q: QFunction + ?Sized>(
    q: &Q,
    player_sum: u8,
    dealer_card: u8,
    usable_ace: bool,
) -> Result<Play, AgentError> {
    let first = encode_observation(player_sum, dealer_card, usable_ace, true);
    let primary = greedy_action(&q.predict(&first)?, invalid_actions(player_sum, true))?;
    if !primary.first_round_only() {
        return Ok(Play::from_actions(primary, primary));
    }
    let later = encode_observation(player_sum, dealer_card, usable_ace, false);
    let fallback = greedy_action(&q.predict(&later)?, invalid_actions(player_sum, false))?;
    Ok(Play::from_actions(primary, fallback))
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, rows: &[Row], min: u8) -> fmt::Result {
    writeln!(f, "{title}:")?;
    write!(f, "  ")?;
    for card in 1..=DEALER_CARD_BINS {
        if card == 1 {
            write!(f, " {:>3}", "A")?;
        } else {
            write!(f, " {:>3}", format!("{card:02}"))?;
        }
    }
    writeln!(f)?;
    for (i, row) in rows.iter().enumerate() {
        write!(f, "{:02}", min as usize + i)?;
        for play in row {
            write!(f, " {:>3}", play.symbol())?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for StrategyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_section(f, "Hard", &self.hard, HARD_MIN)?;
        writeln!(f)?;
        write_section(f, "Soft", &self.soft, SOFT_MIN)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
