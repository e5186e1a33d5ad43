use std::sync::{Arc, Mutex};

use crate::{
    bus::{Broadcaster, Handlers},
    config::Settings,
    directory::UserDirectory,
    history::Timestamp,
    restriction::ChannelRoster,
};

/// Where chat replies go. Sending is fire-and-forget: implementations log their own
/// failures instead of reporting them back.
pub trait ChatSink: Send + Sync {
    fn send(&self, message: String);
}

/// Sink used when no chat connection is available; replies only end up in the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl ChatSink for LogSink {
    fn send(&self, message: String) {
        log::info!("chat: {message}");
    }
}

/// Keeps every reply in memory, for simulations and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    sent: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ChatSink for MemorySink {
    fn send(&self, message: String) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}

/// Everything triggers and actions need from the outside world, handed to them
/// explicitly on every dispatch.
pub struct RuntimeContext {
    pub directory: UserDirectory,
    pub roster: Option<ChannelRoster>,
    pub broadcaster: Broadcaster,
    pub handlers: Handlers,
    pub chat: Arc<dyn ChatSink>,
    pub settings: Settings,
    /// Enabled chat commands across all features, refreshed before dispatch.
    pub commands: Vec<String>,
    now: Timestamp,
}

impl RuntimeContext {
    pub fn new(settings: Settings, chat: Arc<dyn ChatSink>) -> Self {
        Self {
            directory: UserDirectory::new(),
            roster: None,
            broadcaster: Broadcaster::new(),
            handlers: Handlers::new(),
            chat,
            settings,
            commands: Vec::new(),
            now: 0.0,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn advance(&mut self, dt: f64) {
        if dt > 0.0 {
            self.now += dt;
        }
    }

    pub fn say(&self, message: String) {
        log::debug!("replying in chat: {message}");
        self.chat.send(message);
    }
}
