use std::collections::HashMap;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::event::{ChatEvent, UserId};

/// A message published to in-app receivers listening on a named channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub channel: String,
    pub sender: String,
    pub message: String,
    pub received_at: DateTime<Local>,
}

impl ChannelMessage {
    pub fn new(channel: &str, sender: &str, message: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender: sender.to_string(),
            message: message.to_string(),
            received_at: Local::now(),
        }
    }
}

/// What an invoke action hands over to the handlers registered under its topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub sender_id: UserId,
    pub message: String,
    pub event: ChatEvent,
}

/// Publish/subscribe registry keyed by topic name.
///
/// Every subscriber gets its own unbounded queue, so publishing never waits on a
/// slow receiver. Dropped receivers are pruned the next time someone subscribes.
#[derive(Debug)]
pub struct Topics<T> {
    subscribers: HashMap<String, Vec<UnboundedSender<T>>>,
}

impl<T> Default for Topics<T> {
    fn default() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }
}

impl<T: Clone> Topics<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: &str) -> UnboundedReceiver<T> {
        self.prune();
        let (tx, rx) = unbounded_channel();
        self.subscribers.entry(topic.to_string()).or_default().push(tx);
        rx
    }

    /// Returns how many live receivers got the item.
    pub fn publish(&self, topic: &str, item: T) -> usize {
        let Some(senders) = self.subscribers.get(topic) else {
            log::trace!("no receiver registered on '{topic}'");
            return 0;
        };

        senders
            .iter()
            .filter(|tx| tx.send(item.clone()).is_ok())
            .count()
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscribers
            .get(topic)
            .is_some_and(|senders| senders.iter().any(|tx| !tx.is_closed()))
    }

    fn prune(&mut self) {
        self.subscribers.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }
}

pub type Broadcaster = Topics<ChannelMessage>;
pub type Handlers = Topics<Invocation>;
