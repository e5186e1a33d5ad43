//! Chat trigger/action engine for Twitch streams.
//!
//! Incoming chat events go through the triggers of every [`Feature`]; a matching
//! trigger runs all the feature's actions, each guarded by its own cooldown history,
//! role restriction and open/close timer.

pub mod action;
pub mod bus;
pub mod config;
pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod feature;
pub mod history;
pub mod presence;
pub mod restriction;
pub mod secrets;
pub mod tally;
pub mod trigger;
pub mod twitch;

pub use action::{Action, ActionKind, Rejection};
pub use config::Settings;
pub use context::RuntimeContext;
pub use engine::Engine;
pub use error::{Error, Result};
pub use event::{ChatEvent, Payload, UserId};
pub use feature::Feature;
pub use trigger::{Trigger, TriggerKind};
