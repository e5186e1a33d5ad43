use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Command,
    PlainMessage,
    BitsDonation,
    Subscription,
    Raid,
    Reward,
    Follow,
    ViewerJoin,
    ViewerLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubKind {
    Plain,
    Resub,
    Prime,
    Gifted,
}

/// Typed part of an incoming event, kept around so actions can look at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// `name` is lower-cased with the command prefix already stripped.
    Command { name: String, args: Vec<String> },
    PlainMessage,
    BitsDonation { bits: u64 },
    Subscription { sub: SubKind },
    Raid { viewers: u64 },
    Reward { title: String },
    Follow,
    ViewerJoin,
    ViewerLeave,
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::Command { .. } => EventKind::Command,
            Payload::PlainMessage => EventKind::PlainMessage,
            Payload::BitsDonation { .. } => EventKind::BitsDonation,
            Payload::Subscription { .. } => EventKind::Subscription,
            Payload::Raid { .. } => EventKind::Raid,
            Payload::Reward { .. } => EventKind::Reward,
            Payload::Follow => EventKind::Follow,
            Payload::ViewerJoin => EventKind::ViewerJoin,
            Payload::ViewerLeave => EventKind::ViewerLeave,
        }
    }
}

/// One external occurrence, dispatched once and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message: String,
    pub payload: Payload,
}

impl ChatEvent {
    pub fn new(sender_id: UserId, sender_name: &str, message: &str, payload: Payload) -> Self {
        Self {
            sender_id,
            sender_name: sender_name.to_string(),
            message: message.to_string(),
            payload,
        }
    }

    pub fn command(sender_id: UserId, sender_name: &str, text: &str, prefix: &str) -> Option<Self> {
        let (name, args) = parse_command(text, prefix)?;
        Some(Self::new(sender_id, sender_name, text, Payload::Command { name, args }))
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Everything after the first whitespace, which is what command-driven actions
    /// get as the viewer's message.
    pub fn tail(&self) -> &str {
        match self.message.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim_start(),
            None => "",
        }
    }
}

/// Splits `!name arg1 arg2` into a lower-cased name and its arguments.
pub fn parse_command(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    let args = words.map(str::to_string).collect();
    Some((name, args))
}
