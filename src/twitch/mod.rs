//! Thin adapter between Twitch chat (through `twitch-irc`) and the engine.

mod chat;
mod events;

pub use chat::{connect, ChatSender, Connection};
pub use events::{observe, record_sender, ChannelPresence, Observed};
