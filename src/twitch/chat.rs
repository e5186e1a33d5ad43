use std::sync::Arc;

use anyhow::Context;
use tokio::{
    sync::{
        mpsc::{channel, error::TrySendError, Receiver, Sender},
        Mutex,
    },
    task::JoinHandle,
};
use twitch_irc::{
    login::StaticLoginCredentials, ClientConfig, SecureTCPTransport, TwitchIRCClient,
};

use super::events::{observe, record_sender, ChannelPresence, Observed};
use crate::{
    config::TwitchSettings, context::ChatSink, engine::Engine, event::ChatEvent,
    restriction::ChannelRoster,
};

type Client = TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>;

/// Queues replies for the sender task. Never blocks the engine.
#[derive(Debug, Clone)]
pub struct ChatSender {
    tx: Sender<String>,
}

impl ChatSender {
    pub fn new() -> (Self, Receiver<String>) {
        let (tx, rx) = channel(100);
        (Self { tx }, rx)
    }
}

impl ChatSink for ChatSender {
    fn send(&self, message: String) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => log::error!("Chat queue full, dropping message '{msg}'"),
            Err(TrySendError::Closed(msg)) => log::error!("Chat is gone, dropping message '{msg}'"),
        }
    }
}

pub struct Connection {
    pub listener: JoinHandle<()>,
    pub sender: JoinHandle<()>,
}

/// Joins the channel and starts the listener and sender tasks.
pub fn connect(
    settings: TwitchSettings,
    prefix: String,
    engine: Arc<Mutex<Engine>>,
    events: Sender<ChatEvent>,
    presence: ChannelPresence,
    mut replies: Receiver<String>,
) -> anyhow::Result<Connection> {
    let config = match &settings.token {
        Some(token) => {
            let login = settings.bot_name.clone().unwrap_or_else(|| settings.channel.clone());
            let token = token.trim_start_matches("oauth:").to_string();
            ClientConfig::new_simple(StaticLoginCredentials::new(login, Some(token)))
        }
        None => {
            log::warn!("TWITCH_TOKEN is not set, connecting anonymously (read-only)");
            ClientConfig::default()
        }
    };
    let (mut incoming_messages, client) = Client::new(config);

    let channel = settings.channel.clone();
    let listener = tokio::spawn(async move {
        engine.lock().await.ctx.roster = Some(ChannelRoster::for_channel(&channel));
        log::debug!("Listening to channel: {}", channel);
        while let Some(message) = incoming_messages.recv().await {
            match observe(&message, &channel, &prefix) {
                Observed::Event { event, roles, login } => {
                    record_sender(
                        &mut engine.lock().await.ctx,
                        &channel,
                        event.sender_id,
                        &login,
                        &roles,
                    );
                    log::debug!("{}: {}", event.sender_name, event.message);
                    if events.send(event).await.is_err() {
                        log::info!("Engine stopped, closing listener");
                        return;
                    }
                }
                Observed::Joined(login) => presence.join(&login).await,
                Observed::Parted(login) => presence.part(&login).await,
                Observed::Ignored => {}
            }
        }
    });

    let cli = client.clone();
    let channel = settings.channel.clone();
    let sender = tokio::spawn(async move {
        log::debug!("Sending messages to channel: {}", channel);
        while let Some(msg) = replies.recv().await {
            if let Err(err) = cli.privmsg(channel.clone(), msg.clone()).await {
                log::error!("Error sending message '{msg}': {err}");
            }
        }
    });

    client
        .join(settings.channel.clone())
        .with_context(|| format!("invalid channel name '{}'", settings.channel))?;

    Ok(Connection { listener, sender })
}
