use std::sync::Arc;

use tokio::{
    sync::{mpsc::Receiver, Mutex},
    time::{Instant, MissedTickBehavior},
};

use crate::{
    config::Settings,
    context::{ChatSink, RuntimeContext},
    event::{ChatEvent, EventKind},
    feature::Feature,
    presence::{self, NameResolver, PresenceHandle, PresenceSource, PresenceTracker},
};

/// Owns every feature and dispatches events to them one at a time.
pub struct Engine {
    pub ctx: RuntimeContext,
    features: Vec<Feature>,
    presence: Option<PresenceHandle>,
    tracker: PresenceTracker,
}

impl Engine {
    /// Adds the built-in features the settings ask for, then initializes everything.
    pub fn new(settings: Settings, chat: Arc<dyn ChatSink>, mut features: Vec<Feature>) -> Self {
        if settings.help_command && !settings.help_message.is_empty() {
            features.push(Feature::help());
        }
        if settings.list_command {
            features.push(Feature::command_list("commands"));
        }
        if settings.broadcast_chat {
            features.push(Feature::show_chat());
        }

        for feature in &mut features {
            feature.initialize();
        }
        log::info!("engine ready with {} features", features.len());

        let mut engine = Self {
            ctx: RuntimeContext::new(settings, chat),
            features,
            presence: None,
            tracker: PresenceTracker::new(),
        };
        engine.refresh_commands();
        engine
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn feature_mut(&mut self, name: &str) -> Option<&mut Feature> {
        self.features.iter_mut().find(|f| f.name == name)
    }

    pub fn feature_with_command(&self, command: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.has_command(command))
    }

    pub fn watches_presence(&self) -> bool {
        self.features.iter().any(Feature::watches_presence)
    }

    /// Starts the viewer watcher, unless no trigger cares about viewers coming and going.
    pub fn start_presence<S, R>(&mut self, source: S, resolver: R)
    where
        S: PresenceSource,
        R: NameResolver,
    {
        if !self.watches_presence() {
            log::debug!("no viewer triggers, not watching presence");
            return;
        }
        let period = self.ctx.settings.viewer_watch;
        log::debug!("watching viewers every {period:?}");
        self.presence = Some(presence::spawn(source, resolver, period));
    }

    /// Dispatches one event through every feature. Returns how many actions ran.
    pub fn handle(&mut self, event: &ChatEvent) -> usize {
        self.ctx.directory.upsert(event.sender_id, &event.sender_name);
        if event.kind() == EventKind::Command {
            self.refresh_commands();
        }

        let ctx = &self.ctx;
        let done: usize = self
            .features
            .iter_mut()
            .map(|feature| feature.dispatch(event, ctx))
            .sum();
        log::trace!("{:?} from {} ran {done} actions", event.kind(), event.sender_id);
        done
    }

    pub fn update(&mut self, dt: f64) {
        self.ctx.advance(dt);

        let mut viewer_events = Vec::new();
        if let Some(handle) = &mut self.presence {
            for update in handle.drain() {
                let (events, lookups) = self.tracker.apply(update, &mut self.ctx.directory);
                handle.lookup(lookups);
                viewer_events.extend(events);
            }
        }
        for event in &viewer_events {
            self.handle(event);
        }

        let now = self.ctx.now();
        for feature in &mut self.features {
            feature.update(dt, now);
        }
    }

    pub fn deinitialize(&mut self) {
        if let Some(handle) = self.presence.take() {
            handle.stop();
        }
        for feature in &mut self.features {
            feature.deinitialize();
        }
    }

    fn refresh_commands(&mut self) {
        let mut commands: Vec<String> = Vec::new();
        for name in self.features.iter().filter(|f| f.enabled).flat_map(Feature::commands) {
            if !commands.iter().any(|c| c == name) {
                commands.push(name.to_string());
            }
        }
        self.ctx.commands = commands;
    }
}

/// Feeds `events` to the engine and ticks it at the configured rate, until the event
/// source closes.
pub async fn run(engine: Arc<Mutex<Engine>>, mut events: Receiver<ChatEvent>) -> anyhow::Result<()> {
    let period = engine.lock().await.ctx.settings.tick;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    engine.lock().await.handle(&event);
                }
                None => {
                    log::info!("event source closed, stopping engine");
                    engine.lock().await.deinitialize();
                    return Ok(());
                }
            },
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;
                engine.lock().await.update(dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use tokio::sync::mpsc::channel;

    use super::*;
    use crate::{
        action::{vote::VoteSession, Action, ActionKind},
        context::MemorySink,
        event::{Payload, UserId},
        presence::NoResolver,
        tally::OptionStatus,
        trigger::TriggerKind,
    };

    fn command(id: u64, name: &str, text: &str) -> ChatEvent {
        ChatEvent::command(UserId(id), name, text, "!").unwrap()
    }

    fn settings() -> Settings {
        Settings {
            help_message: "try !vote".to_string(),
            ..Settings::default()
        }
    }

    fn poll() -> Feature {
        Feature::new("poll")
            .with_trigger(TriggerKind::command("vote"))
            .with_trigger(TriggerKind::bits(1, 10_000))
            .with_action(Action::new(ActionKind::Vote(VoteSession::new(true))).with_duration(30.0))
    }

    #[test]
    fn test_builtin_features() {
        let sink = MemorySink::new();
        let mut engine = Engine::new(settings(), Arc::new(sink.clone()), vec![poll()]);
        assert!(engine.feature("help").is_some());
        assert!(engine.feature("commands").is_some());
        assert!(engine.feature("show chat").is_none());
        assert_eq!(engine.feature_with_command("VOTE").map(|f| f.name.as_str()), Some("poll"));

        engine.handle(&command(1, "keebs", "!help"));
        engine.handle(&command(1, "keebs", "!commands"));
        engine.feature_mut("poll").unwrap().disable();
        engine.handle(&command(2, "owesome", "!commands"));

        assert_eq!(
            sink.messages(),
            vec![
                "keebs try !vote",
                "keebs List of commands: vote, help, commands",
                "owesome List of commands: help, commands",
            ]
        );
    }

    #[test]
    fn test_help_needs_a_message() {
        let engine = Engine::new(Settings::default(), Arc::new(MemorySink::new()), vec![]);
        assert!(engine.feature("help").is_none());
        assert_eq!(engine.ctx.commands, vec!["commands"]);
    }

    #[test]
    fn test_vote_through_engine() {
        let mut engine = Engine::new(settings(), Arc::new(MemorySink::new()), vec![poll()]);

        engine.handle(&command(1, "keebs", "!vote red"));
        engine.handle(&command(1, "keebs", "!vote blue"));
        engine.handle(&ChatEvent::new(
            UserId(2),
            "owesome",
            "cheer50 blue",
            Payload::BitsDonation { bits: 50 },
        ));
        engine.handle(&command(3, "purry", "!vote red"));

        assert_eq!(engine.ctx.directory.resolve(UserId(2)), "owesome");

        let vote = engine.feature("poll").unwrap().actions[0].vote().unwrap();
        assert_eq!(vote.option("red").unwrap().count(), 2);
        assert_eq!(vote.option("red").unwrap().status, OptionStatus::Winning);
        assert_eq!(vote.option("blue").unwrap().status, OptionStatus::Losing);

        engine.update(31.0);
        assert!(!engine.feature("poll").unwrap().actions[0].is_open());
        assert_eq!(engine.handle(&command(4, "lurker", "!vote blue")), 0);
    }

    #[tokio::test]
    async fn test_presence_triggers() {
        struct Present(HashSet<String>);

        impl PresenceSource for Present {
            async fn present(&self) -> anyhow::Result<HashSet<String>> {
                Ok(self.0.clone())
            }
        }

        let greet = Feature::new("greet")
            .with_trigger(TriggerKind::Joined)
            .with_action(Action::new(ActionKind::Reply {
                template: "welcome _sender_".to_string(),
            }));
        let sink = MemorySink::new();
        let mut engine = Engine::new(Settings::default(), Arc::new(sink.clone()), vec![greet]);
        engine.ctx.directory.upsert(UserId(9), "Lurker");

        engine.start_presence(Present(["lurker".to_string()].into()), NoResolver);
        assert!(engine.presence.is_some());

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.update(0.01);
            if !sink.messages().is_empty() {
                break;
            }
        }
        assert_eq!(sink.messages(), vec!["welcome Lurker"]);
    }

    #[test]
    fn test_no_presence_without_viewer_triggers() {
        let mut engine = Engine::new(Settings::default(), Arc::new(MemorySink::new()), vec![poll()]);
        engine.start_presence(crate::twitch::ChannelPresence::default(), NoResolver);
        assert!(engine.presence.is_none());
    }

    #[tokio::test]
    async fn test_run_until_source_closes() {
        let sink = MemorySink::new();
        let echo = Feature::new("echo")
            .with_trigger(TriggerKind::command("echo"))
            .with_action(
                Action::new(ActionKind::Reply {
                    template: "_message_".to_string(),
                })
                .with_cooldown(0.0.into()),
            );
        let engine = Arc::new(Mutex::new(Engine::new(
            Settings::default(),
            Arc::new(sink.clone()),
            vec![echo],
        )));

        let (tx, rx) = channel(8);
        let task = tokio::spawn(run(engine.clone(), rx));
        tx.send(command(1, "keebs", "!echo one")).await.unwrap();
        tx.send(command(1, "keebs", "!echo two")).await.unwrap();
        drop(tx);

        task.await.unwrap().unwrap();
        assert_eq!(sink.messages(), vec!["one", "two"]);
        assert!(!engine.lock().await.features()[0].actions[0].is_open());
    }
}
