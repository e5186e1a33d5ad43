use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::event::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionStatus {
    #[default]
    Unknown,
    Winning,
    Tie,
    Losing,
}

/// One outcome viewers can back, keyed by what they type to pick it.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice<K> {
    pub key: K,
    pub label: String,
    pub status: OptionStatus,
    backers: HashSet<UserId>,
}

/// Vote options are picked by an exact argument string.
pub type VoteOption = Choice<String>;

/// Bet options are picked by an exact numeric value.
pub type BetOption = Choice<f64>;

impl<K> Choice<K> {
    pub fn new(key: K, label: &str) -> Self {
        Self {
            key,
            label: label.to_string(),
            status: OptionStatus::Unknown,
            backers: HashSet::new(),
        }
    }

    /// Returns false if the viewer already backed this option.
    pub fn register(&mut self, viewer: UserId) -> bool {
        self.backers.insert(viewer)
    }

    pub fn count(&self) -> usize {
        self.backers.len()
    }

    pub fn backed_by(&self, viewer: UserId) -> bool {
        self.backers.contains(&viewer)
    }

    pub fn backers(&self) -> impl Iterator<Item = UserId> + '_ {
        self.backers.iter().copied()
    }

    pub fn reset(&mut self) {
        self.backers.clear();
        self.status = OptionStatus::Unknown;
    }
}

impl VoteOption {
    pub fn vote(argument: &str) -> Self {
        Self::new(argument.to_string(), argument)
    }
}

impl BetOption {
    pub fn bet(value: f64) -> Self {
        Self::new(value, &value.to_string())
    }
}
