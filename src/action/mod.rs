//! Reactions executed when one of a feature's triggers fires.
//!
//! Every [`Action`] carries the same open/close timer, per-viewer cooldown history
//! and role restriction. What it actually does is described by its [`ActionKind`].

pub mod bet;
pub mod log;
pub mod pool;
pub mod reply;
pub mod vote;

use chrono::Local;
use thiserror::Error;

use self::{
    bet::BetSession,
    log::LogAction,
    pool::ViewerPool,
    vote::VoteSession,
};
use crate::{
    bus::{ChannelMessage, Invocation},
    context::RuntimeContext,
    event::{ChatEvent, Payload, UserId},
    history::{Cooldown, Timestamp, ViewerHistory},
    restriction::Restriction,
};

/// Why an invocation did not take effect. Never surfaced to chat.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("action is closed")]
    Closed,
    #[error("viewer lacks the required role")]
    Restricted,
    #[error("viewer is on cooldown")]
    Cooldown,
    #[error("pool is full")]
    PoolFull,
    #[error("viewer is already in the pool")]
    AlreadyInPool,
    #[error("no argument given")]
    MissingArgument,
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
}

/// A trigger match, as handed to every action of the feature.
#[derive(Debug, Clone, Copy)]
pub struct Fired<'a> {
    /// Kind of trigger that matched, for diagnostics.
    pub source: &'static str,
    pub sender_id: UserId,
    /// The viewer's message as the trigger sees it (command arguments for commands).
    pub message: &'a str,
    pub event: &'a ChatEvent,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    Broadcast { channel: String },
    Reply { template: String },
    Invoke { topic: String },
    Log(LogAction),
    Pool(ViewerPool),
    Vote(VoteSession),
    Bet(BetSession),
    Help,
    CommandList,
}

impl ActionKind {
    pub fn default_cooldown(&self) -> Cooldown {
        match self {
            ActionKind::Reply { .. } => Cooldown::Seconds(15.0),
            ActionKind::Vote(_) | ActionKind::Bet(_) => Cooldown::Once,
            ActionKind::Help | ActionKind::CommandList => Cooldown::Seconds(8.0),
            _ => Cooldown::Unlimited,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Broadcast { .. } => "broadcast",
            ActionKind::Reply { .. } => "reply",
            ActionKind::Invoke { .. } => "invoke",
            ActionKind::Log(_) => "log",
            ActionKind::Pool(_) => "pool",
            ActionKind::Vote(_) => "vote",
            ActionKind::Bet(_) => "bet",
            ActionKind::Help => "help",
            ActionKind::CommandList => "command list",
        }
    }
}

/// What a session action pulled out of the event before the cooldown check.
enum Registration {
    None,
    Vote(String),
    Bet(f64),
}

#[derive(Debug, Clone)]
pub struct Action {
    pub open_on_start: bool,
    /// Seconds the action stays open once opened; `0` keeps it open indefinitely.
    pub duration: f64,
    pub restriction: Restriction,
    pub kind: ActionKind,
    open: bool,
    remaining: f64,
    history: ViewerHistory,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            open_on_start: true,
            duration: 0.0,
            restriction: Restriction::default(),
            history: ViewerHistory::new(kind.default_cooldown()),
            kind,
            open: false,
            remaining: 0.0,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Cooldown) -> Self {
        self.history.set_cooldown(cooldown);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = restriction;
        self
    }

    pub fn opened_on_start(mut self, open: bool) -> Self {
        self.open_on_start = open;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn cooldown(&self) -> Cooldown {
        self.history.cooldown()
    }

    pub fn history(&self) -> &ViewerHistory {
        &self.history
    }

    pub fn initialize(&mut self) {
        self.remaining = self.duration;
        self.open = self.open_on_start;
        self.history.clear();
        match &mut self.kind {
            ActionKind::Vote(session) => session.reset(),
            ActionKind::Bet(session) => session.reset(),
            _ => {}
        }
    }

    pub fn deinitialize(&mut self) {
        self.remaining = self.duration;
        self.open = false;
        self.history.clear();
        match &mut self.kind {
            ActionKind::Pool(pool) => pool.clear(),
            ActionKind::Vote(session) => session.clear(),
            ActionKind::Bet(session) => session.clear(),
            _ => {}
        }
    }

    pub fn update(&mut self, dt: f64, now: Timestamp) {
        if !self.open {
            return;
        }
        self.history.refresh(now);
        if self.duration <= 0.0 {
            return;
        }

        self.remaining -= dt;
        if self.remaining <= 0.0 {
            ::log::debug!("{} action timed out", self.kind.name());
            self.close_session();
        }
    }

    /// Runs the action for one trigger match.
    ///
    /// Checks run in this order: open, the variant's own precheck (pool admission,
    /// session argument), role restriction, then the cooldown history. Only a viewer
    /// who passes everything before the history is recorded in it, so a refused
    /// attempt never costs them their cooldown slot. Keep the history check last.
    pub fn invoke(&mut self, fired: &Fired, ctx: &RuntimeContext) -> Result<(), Rejection> {
        if !self.open {
            return Err(Rejection::Closed);
        }

        let registration = self.precheck(fired)?;

        if !self
            .restriction
            .has_privilege(fired.sender_id, &ctx.directory, ctx.roster.as_ref())
        {
            return Err(Rejection::Restricted);
        }
        if !self.history.can_act(fired.sender_id, ctx.now(), true) {
            return Err(Rejection::Cooldown);
        }

        self.execute(fired, registration, ctx)
    }

    /// Checks that only depend on the action's own state and the event, run before
    /// the viewer is recorded in the history.
    fn precheck(&self, fired: &Fired) -> Result<Registration, Rejection> {
        match &self.kind {
            ActionKind::Pool(pool) => {
                pool.admits(fired.sender_id)?;
                Ok(Registration::None)
            }
            ActionKind::Vote(session) => {
                let argument = session_argument(fired).ok_or(Rejection::MissingArgument)?;
                session.accepts(&argument)?;
                Ok(Registration::Vote(argument))
            }
            ActionKind::Bet(session) => {
                let argument = session_argument(fired).ok_or(Rejection::MissingArgument)?;
                let value = session.parse_value(&argument)?;
                session.accepts(value)?;
                Ok(Registration::Bet(value))
            }
            _ => Ok(Registration::None),
        }
    }

    fn execute(
        &mut self,
        fired: &Fired,
        registration: Registration,
        ctx: &RuntimeContext,
    ) -> Result<(), Rejection> {
        let sender = ctx.directory.resolve(fired.sender_id);

        match (&mut self.kind, registration) {
            (ActionKind::Broadcast { channel }, _) => {
                let delivered = ctx
                    .broadcaster
                    .publish(channel, ChannelMessage::new(channel, &sender, fired.message));
                ::log::trace!("broadcast on '{channel}' reached {delivered} receivers");
            }
            (ActionKind::Reply { template }, _) => {
                ctx.say(reply::format_message(template, Local::now(), &sender, fired.message));
            }
            (ActionKind::Invoke { topic }, _) => {
                let invocation = Invocation {
                    sender_id: fired.sender_id,
                    message: fired.message.to_string(),
                    event: fired.event.clone(),
                };
                ctx.handlers.publish(topic, invocation);
            }
            (ActionKind::Log(action), _) => action.emit(fired, ctx),
            (ActionKind::Pool(pool), _) => {
                pool.enqueue(fired.sender_id)?;
                ::log::debug!("{sender} joined the pool ({} waiting)", pool.len());
            }
            (ActionKind::Vote(session), Registration::Vote(argument)) => {
                session.register(fired.sender_id, &argument)?;
                ::log::debug!("{sender} voted for '{argument}'");
            }
            (ActionKind::Bet(session), Registration::Bet(value)) => {
                session.register(fired.sender_id, value)?;
                ::log::debug!("{sender} bet {value}");
            }
            (ActionKind::Help, _) => {
                let help = &ctx.settings.help_message;
                if !help.is_empty() {
                    ctx.say(format!("{sender} {help}"));
                }
            }
            (ActionKind::CommandList, _) => {
                let reply = if ctx.commands.is_empty() {
                    format!("{sender} No active command ATM.")
                } else {
                    format!("{sender} List of commands: {}", ctx.commands.join(", "))
                };
                ctx.say(reply);
            }
            (ActionKind::Vote(_) | ActionKind::Bet(_), _) => {
                return Err(Rejection::MissingArgument);
            }
        }

        Ok(())
    }

    /// (Re)opens the action and forgets who already acted. A negative duration keeps
    /// the configured one.
    pub fn open_session(&mut self, duration: Option<f64>) {
        self.open = true;
        if let Some(duration) = duration.filter(|d| *d >= 0.0) {
            self.duration = duration;
        }
        self.remaining = self.duration;
        self.history.clear();
    }

    pub fn close_session(&mut self) {
        self.open = false;
        self.remaining = 0.0;
        self.refresh_status();
    }

    pub fn refresh_status(&mut self) {
        if let ActionKind::Vote(session) = &mut self.kind {
            session.refresh_status();
        }
    }

    /// Closes a bet and ranks its options against the real outcome.
    pub fn end_bet_session(&mut self, target: f64) {
        self.close_session();
        if let ActionKind::Bet(session) = &mut self.kind {
            session.settle(target);
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Empties the pool; clearing the history as well lets the same viewers re-enter.
    pub fn clear_pool(&mut self, also_clear_history: bool) {
        if let ActionKind::Pool(pool) = &mut self.kind {
            pool.clear();
        }
        if also_clear_history {
            self.history.clear();
        }
    }

    pub fn pool(&self) -> Option<&ViewerPool> {
        match &self.kind {
            ActionKind::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn pool_mut(&mut self) -> Option<&mut ViewerPool> {
        match &mut self.kind {
            ActionKind::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn vote(&self) -> Option<&VoteSession> {
        match &self.kind {
            ActionKind::Vote(session) => Some(session),
            _ => None,
        }
    }

    pub fn bet(&self) -> Option<&BetSession> {
        match &self.kind {
            ActionKind::Bet(session) => Some(session),
            _ => None,
        }
    }
}

/// Commands register their first argument, bits donations the word right after the
/// cheer.
fn session_argument(fired: &Fired) -> Option<String> {
    match &fired.event.payload {
        Payload::Command { args, .. } => args.first().cloned(),
        Payload::BitsDonation { .. } => fired.event.message.split_whitespace().nth(1).map(str::to_string),
        _ => fired.message.split_whitespace().next().map(str::to_string),
    }
}
