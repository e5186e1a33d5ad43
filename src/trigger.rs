use regex::{Regex, RegexBuilder};

use crate::{
    error::{Error, Result},
    event::{ChatEvent, Payload, SubKind},
};

pub const NEW_VIEWER_MESSAGE: &str = "New viewer - no message";
pub const VIEWER_LEFT_MESSAGE: &str = "Viewer left - no message";
pub const RAID_MESSAGE: &str = "Channel is raided. Trigger not bound to specific user.";

#[derive(Debug, Clone)]
pub enum TextMode {
    Equals,
    Contains,
    StartsWith,
    /// Case-insensitive regular expression.
    Matches(Regex),
}

impl TextMode {
    pub fn pattern(pattern: &str) -> Result<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(TextMode::Matches)
            .map_err(|source| Error::Pattern {
                pattern: pattern.to_string(),
                source,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubFilter {
    pub plain: bool,
    pub resub: bool,
    pub prime: bool,
    pub gifted: bool,
}

impl Default for SubFilter {
    fn default() -> Self {
        Self {
            plain: true,
            resub: true,
            prime: true,
            gifted: true,
        }
    }
}

impl SubFilter {
    pub fn accepts(&self, sub: SubKind) -> bool {
        match sub {
            SubKind::Plain => self.plain,
            SubKind::Resub => self.resub,
            SubKind::Prime => self.prime,
            SubKind::Gifted => self.gifted,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TriggerKind {
    /// Name without prefix, compared case-insensitively.
    Command { name: String },
    Message { text: String, mode: TextMode },
    AllMessages,
    Bits { min: u64, max: u64 },
    Subscription(SubFilter),
    Raid,
    /// `None` matches any redeemed reward.
    Reward { title: Option<String> },
    Follow,
    Joined,
    Left,
}

impl TriggerKind {
    pub fn command(name: &str) -> Self {
        TriggerKind::Command {
            name: name.trim().to_lowercase(),
        }
    }

    /// Negative bounds are clamped to zero and an inverted range is swapped.
    pub fn bits(min: i64, max: i64) -> Self {
        let min = min.max(0) as u64;
        let max = max.max(0) as u64;
        TriggerKind::Bits {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TriggerKind::Command { .. } => "command",
            TriggerKind::Message { .. } => "chat message",
            TriggerKind::AllMessages => "all messages",
            TriggerKind::Bits { .. } => "bits donation",
            TriggerKind::Subscription(_) => "new subscriber",
            TriggerKind::Raid => "channel raid",
            TriggerKind::Reward { .. } => "custom reward",
            TriggerKind::Follow => "new follower",
            TriggerKind::Joined => "new viewer",
            TriggerKind::Left => "viewer left",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub enabled: bool,
    pub kind: TriggerKind,
}

impl From<TriggerKind> for Trigger {
    fn from(kind: TriggerKind) -> Self {
        Self::new(kind)
    }
}

impl Trigger {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            enabled: true,
            kind,
        }
    }

    pub fn command_name(&self) -> Option<&str> {
        match &self.kind {
            TriggerKind::Command { name } if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    pub fn watches_presence(&self) -> bool {
        matches!(self.kind, TriggerKind::Joined | TriggerKind::Left)
    }

    /// Returns the viewer's message as the actions should see it when `event` fires
    /// this trigger.
    pub fn matches<'a>(&self, event: &'a ChatEvent) -> Option<&'a str> {
        if !self.enabled {
            return None;
        }

        let text = event.message.as_str();
        let is_chat = matches!(
            event.payload,
            Payload::Command { .. } | Payload::PlainMessage | Payload::BitsDonation { .. }
        );

        match (&self.kind, &event.payload) {
            (TriggerKind::Command { name }, Payload::Command { name: got, .. }) => {
                name.eq_ignore_ascii_case(got).then(|| event.tail())
            }
            (TriggerKind::Message { text: wanted, mode }, _) if is_chat => {
                text_matches(mode, text, wanted).then_some(text)
            }
            (TriggerKind::AllMessages, _) if is_chat => Some(text),
            (TriggerKind::Bits { min, max }, Payload::BitsDonation { bits }) => {
                (*min..=*max).contains(bits).then_some(text)
            }
            (TriggerKind::Subscription(filter), Payload::Subscription { sub }) => {
                filter.accepts(*sub).then_some(text)
            }
            (TriggerKind::Raid, Payload::Raid { .. }) => Some(or_default(text, RAID_MESSAGE)),
            (TriggerKind::Reward { title }, Payload::Reward { title: got }) => match title {
                Some(title) if !title.eq_ignore_ascii_case(got) => None,
                _ => Some(text),
            },
            (TriggerKind::Follow, Payload::Follow) => Some(text),
            (TriggerKind::Joined, Payload::ViewerJoin) => Some(or_default(text, NEW_VIEWER_MESSAGE)),
            (TriggerKind::Left, Payload::ViewerLeave) => Some(or_default(text, VIEWER_LEFT_MESSAGE)),
            _ => None,
        }
    }
}

fn or_default<'a>(text: &'a str, default: &'static str) -> &'a str {
    if text.is_empty() {
        default
    } else {
        text
    }
}

fn text_matches(mode: &TextMode, text: &str, wanted: &str) -> bool {
    match mode {
        TextMode::Equals => text.to_lowercase() == wanted.to_lowercase(),
        TextMode::Contains => text.to_lowercase().contains(&wanted.to_lowercase()),
        TextMode::StartsWith => text.to_lowercase().starts_with(&wanted.to_lowercase()),
        TextMode::Matches(re) => re.is_match(text),
    }
}
