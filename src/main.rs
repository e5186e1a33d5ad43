use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};

use cuebot::{
    config::{load_features, Settings, TwitchSettings},
    context::LogSink,
    engine::{self, Engine},
    presence::NoResolver,
    secrets::Secrets,
    twitch::{self, ChannelPresence, ChatSender},
    ChatEvent,
};

#[derive(Parser)]
#[command(version, about = "Chat triggers and actions for Twitch streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the channel and react to chat.
    Run,
    /// Replay JSON-lines events through the engine, without connecting.
    Simulate { events: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let env = Env::default().filter_or("LOG_LEVEL", "cuebot=debug");
    env_logger::init_from_env(env);

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    log::debug!("Loading features from {}...", settings.features_path.display());
    let features = load_features(&settings.features_path)?;

    match cli.command {
        Command::Run => run(settings, features).await,
        Command::Simulate { events } => simulate(settings, features, &events),
    }
}

async fn run(settings: Settings, features: Vec<cuebot::Feature>) -> anyhow::Result<()> {
    let secrets = Secrets::load(&settings.secrets_path)?;
    let twitch_settings = TwitchSettings::from_env_or(&secrets)?;
    let prefix = settings.command_prefix.clone();

    log::debug!("Init engine...");
    let (chat, replies) = ChatSender::new();
    let mut engine = Engine::new(settings, Arc::new(chat), features);
    let presence = ChannelPresence::default();
    engine.start_presence(presence.clone(), NoResolver);
    let engine = Arc::new(Mutex::new(engine));

    log::debug!("Init Twitch chat monitor...");
    let (events_tx, events_rx) = mpsc::channel(256);
    let connection = twitch::connect(
        twitch_settings,
        prefix,
        engine.clone(),
        events_tx,
        presence,
        replies,
    )?;

    log::debug!("Init event loop...");
    let engine_join_handle = tokio::spawn(engine::run(engine, events_rx));

    let (engine_result, _, _) =
        tokio::try_join!(engine_join_handle, connection.listener, connection.sender)?;
    engine_result
}

/// One line of a simulation script: either an event or a clock advance.
#[derive(Deserialize)]
#[serde(untagged)]
enum Step {
    Advance { advance: f64 },
    Event(ChatEvent),
}

fn simulate(settings: Settings, features: Vec<cuebot::Feature>, path: &Path) -> anyhow::Result<()> {
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("could not read events from {}", path.display()))?;
    let mut engine = Engine::new(settings, Arc::new(LogSink), features);

    let mut dispatched = 0;
    for (n, line) in script.lines().enumerate() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let step: Step = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid event", path.display(), n + 1))?;
        match step {
            Step::Advance { advance } => engine.update(advance),
            Step::Event(event) => {
                let done = engine.handle(&event);
                log::info!("line {}: {:?} from {} ran {done} actions", n + 1, event.kind(), event.sender_id);
                dispatched += 1;
            }
        }
    }

    engine.deinitialize();
    log::info!("Replayed {dispatched} events");
    Ok(())
}
