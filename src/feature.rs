use crate::{
    action::{Action, ActionKind, Fired},
    context::RuntimeContext,
    event::ChatEvent,
    history::Timestamp,
    trigger::{Trigger, TriggerKind},
};

pub const HELP_FEATURE: &str = "help";
pub const COMMAND_LIST_FEATURE: &str = "commands";
pub const CHAT_FEATURE: &str = "show chat";
pub const CHAT_CHANNEL: &str = "TwitchChat";

/// Binds a set of triggers to a set of actions: any trigger firing runs every action.
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub enabled: bool,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
}

impl Feature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            triggers: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<Trigger>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn help() -> Self {
        Feature::new(HELP_FEATURE)
            .with_trigger(TriggerKind::command("help"))
            .with_action(Action::new(ActionKind::Help))
    }

    pub fn command_list(command: &str) -> Self {
        Feature::new(COMMAND_LIST_FEATURE)
            .with_trigger(TriggerKind::command(command))
            .with_action(Action::new(ActionKind::CommandList))
    }

    pub fn show_chat() -> Self {
        Feature::new(CHAT_FEATURE)
            .with_trigger(TriggerKind::AllMessages)
            .with_action(Action::new(ActionKind::Broadcast {
                channel: CHAT_CHANNEL.to_string(),
            }))
    }

    pub fn initialize(&mut self) {
        for action in &mut self.actions {
            action.initialize();
        }
    }

    pub fn deinitialize(&mut self) {
        for action in &mut self.actions {
            action.deinitialize();
        }
    }

    pub fn enable(&mut self) {
        self.set_active(true);
    }

    pub fn disable(&mut self) {
        self.set_active(false);
    }

    pub fn set_active(&mut self, enabled: bool) {
        self.enabled = enabled;
        for trigger in &mut self.triggers {
            trigger.enabled = enabled;
        }
    }

    /// Action timers only run while the feature is enabled.
    pub fn update(&mut self, dt: f64, now: Timestamp) {
        if !self.enabled {
            return;
        }
        for action in &mut self.actions {
            action.update(dt, now);
        }
    }

    /// Runs every action once per trigger matching `event`. Returns how many actions
    /// took effect.
    pub fn dispatch(&mut self, event: &ChatEvent, ctx: &RuntimeContext) -> usize {
        if !self.enabled {
            return 0;
        }

        let mut done = 0;
        for trigger in &self.triggers {
            let Some(message) = trigger.matches(event) else {
                continue;
            };
            let fired = Fired {
                source: trigger.kind.name(),
                sender_id: event.sender_id,
                message,
                event,
            };

            for action in &mut self.actions {
                match action.invoke(&fired, ctx) {
                    Ok(()) => done += 1,
                    Err(rejection) => log::debug!(
                        "[{}] {} action skipped for {}: {rejection}",
                        self.name,
                        action.kind.name(),
                        event.sender_id
                    ),
                }
            }
        }
        done
    }

    /// Command names of the enabled command triggers.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.triggers
            .iter()
            .filter(|t| t.enabled)
            .filter_map(Trigger::command_name)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.triggers
            .iter()
            .filter_map(Trigger::command_name)
            .any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn watches_presence(&self) -> bool {
        self.triggers.iter().any(Trigger::watches_presence)
    }

    pub fn action(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn action_mut(&mut self, index: usize) -> Option<&mut Action> {
        self.actions.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        action::{pool::ViewerPool, Rejection},
        config::Settings,
        context::MemorySink,
        event::{Payload, UserId},
        history::Cooldown,
    };

    fn context() -> (RuntimeContext, MemorySink) {
        let sink = MemorySink::new();
        let ctx = RuntimeContext::new(Settings::default(), Arc::new(sink.clone()));
        (ctx, sink)
    }

    fn command(id: u64, text: &str) -> ChatEvent {
        ChatEvent::command(UserId(id), "keebs", text, "!").unwrap()
    }

    fn queue() -> Feature {
        let mut feature = Feature::new("queue")
            .with_trigger(TriggerKind::command("join"))
            .with_trigger(TriggerKind::bits(100, 1000))
            .with_action(Action::new(ActionKind::Pool(ViewerPool::new(-1))));
        feature.initialize();
        feature
    }

    #[test]
    fn test_disable_is_idempotent() {
        let mut feature = queue();
        feature.disable();
        let once: Vec<bool> = feature.triggers.iter().map(|t| t.enabled).collect();
        feature.disable();
        let twice: Vec<bool> = feature.triggers.iter().map(|t| t.enabled).collect();

        assert!(!feature.enabled);
        assert_eq!(once, twice);
        assert!(twice.iter().all(|e| !e));

        feature.enable();
        assert!(feature.triggers.iter().all(|t| t.enabled));
    }

    #[test]
    fn test_disabled_feature_ignores_events() {
        let (ctx, _) = context();
        let mut feature = queue();
        feature.disable();
        assert_eq!(feature.dispatch(&command(1, "!join"), &ctx), 0);
        assert!(feature.actions[0].pool().unwrap().is_empty());
    }

    #[test]
    fn test_rejection_does_not_block_other_actions() {
        let (ctx, sink) = context();
        let mut feature = Feature::new("greet")
            .with_trigger(TriggerKind::command("hi"))
            .with_action(Action::new(ActionKind::Pool(ViewerPool::new(0))))
            .with_action(
                Action::new(ActionKind::Reply {
                    template: "hello _sender_".into(),
                })
                .with_cooldown(Cooldown::Unlimited),
            );
        feature.initialize();

        assert_eq!(feature.dispatch(&command(1, "!hi"), &ctx), 1);
        assert_eq!(sink.messages(), vec!["hello unknown user #1"]);
    }

    #[test]
    fn test_one_event_matching_two_triggers_grants_once() {
        let (ctx, sink) = context();
        let mut feature = Feature::new("queue")
            .with_trigger(TriggerKind::command("join"))
            .with_trigger(TriggerKind::AllMessages)
            .with_action(Action::new(ActionKind::Pool(ViewerPool::new(-1))).with_cooldown(Cooldown::Once))
            .with_action(
                Action::new(ActionKind::Reply {
                    template: "welcome _sender_".into(),
                })
                .with_cooldown(Cooldown::Once),
            );
        feature.initialize();

        assert_eq!(feature.dispatch(&command(1, "!join"), &ctx), 2);
        assert_eq!(feature.actions[0].pool().unwrap().len(), 1);
        assert_eq!(feature.actions[0].history().len(), 1);
        assert_eq!(feature.actions[1].history().len(), 1);
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn test_two_triggers_fire_independently() {
        let (ctx, _) = context();
        let mut feature = queue();
        let cheer = ChatEvent::new(UserId(2), "owesome", "cheer100", Payload::BitsDonation { bits: 100 });

        assert_eq!(feature.dispatch(&command(1, "!join"), &ctx), 1);
        assert_eq!(feature.dispatch(&cheer, &ctx), 1);
        assert_eq!(feature.dispatch(&command(1, "!join"), &ctx), 0);

        let pool = feature.actions[0].pool().unwrap();
        assert_eq!(pool.viewers().collect::<Vec<_>>(), vec![UserId(1), UserId(2)]);
    }

    #[test]
    fn test_timers_freeze_while_disabled() {
        let mut feature = Feature::new("timed").with_action(
            Action::new(ActionKind::Invoke { topic: "t".into() }).with_duration(1.0),
        );
        feature.initialize();

        feature.disable();
        feature.update(5.0, 5.0);
        assert!(feature.actions[0].is_open());

        feature.enable();
        feature.update(5.0, 10.0);
        assert!(!feature.actions[0].is_open());

        let (ctx, _) = context();
        let event = command(1, "!t");
        let fired = Fired {
            source: "command",
            sender_id: UserId(1),
            message: "",
            event: &event,
        };
        assert_eq!(feature.actions[0].invoke(&fired, &ctx), Err(Rejection::Closed));
    }

    #[test]
    fn test_commands() {
        let mut feature = Feature::new("multi")
            .with_trigger(TriggerKind::command("Join"))
            .with_trigger(TriggerKind::AllMessages)
            .with_trigger(TriggerKind::command("leave"));
        assert_eq!(feature.commands().collect::<Vec<_>>(), vec!["join", "leave"]);
        assert!(feature.has_command("LEAVE"));

        feature.triggers[2].enabled = false;
        assert_eq!(feature.commands().collect::<Vec<_>>(), vec!["join"]);
    }

    #[test]
    fn test_show_chat_broadcasts_every_message() {
        let (mut ctx, _) = context();
        ctx.directory.upsert(UserId(4), "purry");
        let mut chat = ctx.broadcaster.subscribe(CHAT_CHANNEL);
        let mut feature = Feature::show_chat();
        feature.initialize();

        let event = ChatEvent::new(UserId(4), "purry", "hello chat", Payload::PlainMessage);
        feature.dispatch(&event, &ctx);
        feature.dispatch(&event, &ctx);

        assert_eq!(chat.try_recv().unwrap().sender, "purry");
        assert_eq!(chat.try_recv().unwrap().message, "hello chat");
    }
}
