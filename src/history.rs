use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::event::UserId;

/// Seconds elapsed on the engine clock.
pub type Timestamp = f64;

/// How often a single viewer may use an action.
///
/// Configured as a single number: `0` for unlimited reuse, a positive number of
/// seconds to wait between uses, or a negative number for "once until the history
/// is cleared".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub enum Cooldown {
    #[default]
    Unlimited,
    Seconds(f64),
    Once,
}

impl From<f64> for Cooldown {
    fn from(secs: f64) -> Self {
        if secs > 0.0 {
            Cooldown::Seconds(secs)
        } else if secs < 0.0 {
            Cooldown::Once
        } else {
            Cooldown::Unlimited
        }
    }
}

impl From<Cooldown> for f64 {
    fn from(cooldown: Cooldown) -> Self {
        match cooldown {
            Cooldown::Unlimited => 0.0,
            Cooldown::Seconds(secs) => secs,
            Cooldown::Once => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub viewer: UserId,
    pub entered_at: Timestamp,
}

/// Viewers that recently used an action, oldest first.
///
/// Entries are appended with a monotonic clock and the cooldown is the same for all
/// of them, so insertion order is chronological order and expiry only ever needs to
/// look at the front of the queue.
#[derive(Debug, Clone, Default)]
pub struct ViewerHistory {
    cooldown: Cooldown,
    entries: VecDeque<HistoryEntry>,
}

impl ViewerHistory {
    pub fn new(cooldown: Cooldown) -> Self {
        Self {
            cooldown,
            entries: VecDeque::new(),
        }
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Cooldown) {
        self.cooldown = cooldown;
    }

    pub fn contains(&self, viewer: UserId) -> bool {
        self.entries.iter().any(|e| e.viewer == viewer)
    }

    pub fn add(&mut self, viewer: UserId, now: Timestamp) {
        if self.cooldown == Cooldown::Unlimited {
            return;
        }
        self.entries.push_back(HistoryEntry {
            viewer,
            entered_at: now,
        });
    }

    /// Drops entries that entered strictly before `cutoff`, stopping at the first one
    /// that did not.
    pub fn expire(&mut self, cutoff: Timestamp) {
        while let Some(front) = self.entries.front() {
            if front.entered_at >= cutoff {
                return;
            }
            self.entries.pop_front();
        }
    }

    /// Applies the cooldown window relative to `now`. "Once" entries never expire.
    pub fn refresh(&mut self, now: Timestamp) {
        if let Cooldown::Seconds(secs) = self.cooldown {
            self.expire(now - secs);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Checks whether `viewer` may act and, when `record` is set, books the slot in
    /// the same step. Callers hold `&mut self`, so two evaluations for the same
    /// viewer can never both be granted.
    pub fn can_act(&mut self, viewer: UserId, now: Timestamp, record: bool) -> bool {
        if self.cooldown == Cooldown::Unlimited {
            return true;
        }

        self.refresh(now);
        if self.contains(viewer) {
            return false;
        }

        if record {
            self.add(viewer, now);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
