//! Player actions and action sets

use serde::{Deserialize, Serialize};

use super::constants::{ACTION_COUNT, ACTION_DOUBLE, ACTION_HIT, ACTION_STICK, ACTION_SURRENDER};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Stick = 0,
    Hit = 1,
    Double = 2,
    Surrender = 3,
}

impl Action {
    pub const ALL: [Action; ACTION_COUNT] =
        [Action::Stick, Action::Hit, Action::Double, Action::Surrender];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            ACTION_STICK => Some(Action::Stick),
            ACTION_HIT => Some(Action::Hit),
            ACTION_DOUBLE => Some(Action::Double),
            ACTION_SURRENDER => Some(Action::Surrender),
            _ => None,
        }
    }

    /// Player draws a card with this action.
    pub fn draws(self) -> bool {
        matches!(self, Action::Hit | Action::Double)
    }

    /// Only legal on the first decision of a hand.
    pub fn first_round_only(self) -> bool {
        matches!(self, Action::Double | Action::Surrender)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Stick => "stick",
            Action::Hit => "hit",
            Action::Double => "double",
            Action::Surrender => "surrender",
        };
        f.write_str(name)
    }
}

/// Set of actions stored as a bitmask over action indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSet(u8);

impl ActionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self((1 << ACTION_COUNT) - 1)
    }

    pub fn insert(&mut self, action: Action) {
        self.0 |= 1 << action.index();
    }

    pub fn with(mut self, action: Action) -> Self {
        self.insert(action);
        self
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0 & (1 << action.index()) != 0
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < ACTION_COUNT && self.0 & (1 << index) != 0
    }

    pub fn union(self, other: ActionSet) -> Self {
        Self(self.0 | other.0)
    }

    /// Actions not in this set.
    pub fn complement(self) -> Self {
        Self(!self.0 & Self::all().0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(move |a| self.contains(*a))
    }

    /// 1.0 for members, 0.0 otherwise.
    pub fn to_mask(&self) -> [f32; ACTION_COUNT] {
        let mut mask = [0.0; ACTION_COUNT];
        for action in self.iter() {
            mask[action.index()] = 1.0;
        }
        mask
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut set = ActionSet::empty();
        for action in iter {
            set.insert(action);
        }
        set
    }
}
