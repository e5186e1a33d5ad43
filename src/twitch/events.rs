use std::{collections::HashSet, sync::Arc};

use tokio::sync::RwLock;
use twitch_irc::message::{Badge, ServerMessage, UserNoticeEvent};

use crate::{
    context::RuntimeContext,
    event::{ChatEvent, Payload, SubKind, UserId},
    presence::PresenceSource,
    restriction::{ChannelRoster, Role},
};

/// Logins currently in the channel, as reported by JOIN and PART.
#[derive(Debug, Clone, Default)]
pub struct ChannelPresence(Arc<RwLock<HashSet<String>>>);

impl ChannelPresence {
    pub async fn join(&self, login: &str) {
        self.0.write().await.insert(login.to_lowercase());
    }

    pub async fn part(&self, login: &str) {
        self.0.write().await.remove(&login.to_lowercase());
    }
}

impl PresenceSource for ChannelPresence {
    async fn present(&self) -> anyhow::Result<HashSet<String>> {
        Ok(self.0.read().await.clone())
    }
}

/// What one IRC message means for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Event {
        event: ChatEvent,
        roles: Vec<Role>,
        login: String,
    },
    Joined(String),
    Parted(String),
    Ignored,
}

pub fn observe(message: &ServerMessage, channel: &str, prefix: &str) -> Observed {
    match message {
        ServerMessage::Privmsg(msg) if msg.channel_login == channel => {
            let Some(id) = user_id(&msg.sender.id) else {
                return Observed::Ignored;
            };
            let name = &msg.sender.name;
            let text = &msg.message_text;

            let event = match (ChatEvent::command(id, name, text, prefix), msg.bits) {
                (Some(command), _) => command,
                (None, Some(bits)) => ChatEvent::new(id, name, text, Payload::BitsDonation { bits }),
                (None, None) => ChatEvent::new(id, name, text, Payload::PlainMessage),
            };
            Observed::Event {
                event,
                roles: roles(&msg.badges),
                login: msg.sender.login.clone(),
            }
        }
        ServerMessage::UserNotice(msg) if msg.channel_login == channel => {
            let Some(id) = user_id(&msg.sender.id) else {
                return Observed::Ignored;
            };
            let payload = match &msg.event {
                UserNoticeEvent::SubOrResub {
                    is_resub, sub_plan, ..
                } => {
                    let sub = if sub_plan == "Prime" {
                        SubKind::Prime
                    } else if *is_resub {
                        SubKind::Resub
                    } else {
                        SubKind::Plain
                    };
                    Payload::Subscription { sub }
                }
                UserNoticeEvent::SubGift { .. } => Payload::Subscription {
                    sub: SubKind::Gifted,
                },
                UserNoticeEvent::Raid { viewer_count, .. } => Payload::Raid {
                    viewers: *viewer_count,
                },
                _ => return Observed::Ignored,
            };

            let text = msg.message_text.as_deref().unwrap_or_default();
            Observed::Event {
                event: ChatEvent::new(id, &msg.sender.name, text, payload),
                roles: roles(&msg.badges),
                login: msg.sender.login.clone(),
            }
        }
        ServerMessage::Join(msg) if msg.channel_login == channel => {
            Observed::Joined(msg.user_login.clone())
        }
        ServerMessage::Part(msg) if msg.channel_login == channel => {
            Observed::Parted(msg.user_login.clone())
        }
        _ => Observed::Ignored,
    }
}

/// Records who sent a message: their login, and the roles their current badges
/// carry. Roles missing from the badges are taken away.
pub fn record_sender(
    ctx: &mut RuntimeContext,
    channel: &str,
    id: UserId,
    login: &str,
    roles: &[Role],
) {
    ctx.directory.record_login(id, login);
    let roster = ctx
        .roster
        .get_or_insert_with(|| ChannelRoster::for_channel(channel));
    if roster.set_roles(login, roles) {
        log::debug!("{login} now has roles {roles:?}");
    }
}

fn roles(badges: &[Badge]) -> Vec<Role> {
    badges.iter().filter_map(|b| Role::from_badge(&b.name)).collect()
}

fn user_id(id: &str) -> Option<UserId> {
    match id.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            log::trace!("ignoring message without a user id ('{id}')");
            None
        }
    }
}
