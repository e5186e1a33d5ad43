//! Settings from the environment and feature definitions from a JSON file.

use std::{env, path::{Path, PathBuf}, str::FromStr, time::Duration};

use serde::Deserialize;

use crate::{
    action::{
        bet::{BetSession, WinningCondition, MAX_DECIMALS},
        log::{LogAction, LogDetail, LogTarget},
        pool::ViewerPool,
        reply::DEFAULT_TEMPLATE,
        vote::VoteSession,
        Action, ActionKind,
    },
    error::{Error, Result},
    feature::Feature,
    history::Cooldown,
    restriction::Restriction,
    secrets::Secrets,
    trigger::{SubFilter, TextMode, Trigger, TriggerKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub command_prefix: String,
    /// Replied by the help command. The help command is left out when empty.
    pub help_message: String,
    pub list_command: bool,
    pub help_command: bool,
    pub broadcast_chat: bool,
    pub tick: Duration,
    pub viewer_watch: Duration,
    pub features_path: PathBuf,
    /// Secrets file filling in Twitch credentials the environment leaves unset.
    pub secrets_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            help_message: String::new(),
            list_command: true,
            help_command: true,
            broadcast_chat: false,
            tick: Duration::from_millis(50),
            viewer_watch: Duration::from_secs(20),
            features_path: PathBuf::from("features.json"),
            secrets_path: PathBuf::from(".secrets"),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();
        Ok(Self {
            command_prefix: env::var("CUEBOT_COMMAND_PREFIX")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.command_prefix),
            help_message: env::var("CUEBOT_HELP_MESSAGE").unwrap_or_default(),
            list_command: flag("CUEBOT_LIST_COMMAND", defaults.list_command)?,
            help_command: flag("CUEBOT_HELP_COMMAND", defaults.help_command)?,
            broadcast_chat: flag("CUEBOT_BROADCAST_CHAT", defaults.broadcast_chat)?,
            tick: Duration::from_millis(parsed("CUEBOT_TICK_MS", 50u64)?.max(1)),
            viewer_watch: Duration::from_secs(parsed("CUEBOT_VIEWER_WATCH_SECS", 20u64)?.max(1)),
            features_path: env::var("CUEBOT_FEATURES")
                .map(PathBuf::from)
                .unwrap_or(defaults.features_path),
            secrets_path: env::var("CUEBOT_SECRETS")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_path),
        })
    }
}

/// Chat connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TwitchSettings {
    pub channel: String,
    /// Anonymous, read-only login when absent.
    pub token: Option<String>,
    pub bot_name: Option<String>,
}

impl TwitchSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_env_or(&Secrets::default())
    }

    /// Environment first, then the values saved in `secrets`.
    pub fn from_env_or(secrets: &Secrets) -> Result<Self> {
        Self::from_lookup(non_empty, secrets)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, secrets: &Secrets) -> Result<Self> {
        let saved = |value: &str| Some(value.to_string()).filter(|v| !v.trim().is_empty());
        let channel = lookup("TWITCH_CHANNEL")
            .or_else(|| saved(&secrets.channel_name))
            .ok_or(Error::MissingVar("TWITCH_CHANNEL"))?;
        Ok(Self {
            channel: channel.trim_start_matches('#').to_lowercase(),
            token: lookup("TWITCH_TOKEN").or_else(|| saved(&secrets.bot_token)),
            bot_name: lookup("TWITCH_BOT_NAME").or_else(|| saved(&secrets.bot_name)),
        })
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| Error::InvalidVar { name, value }),
        Err(_) => Ok(default),
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidVar { name, value }),
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextModeDef {
    #[default]
    Equals,
    Contains,
    StartsWith,
    Matches,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerDef {
    Command {
        command: String,
    },
    Message {
        text: String,
        #[serde(default)]
        mode: TextModeDef,
    },
    AllMessages,
    Bits {
        #[serde(default = "default_min_bits")]
        min: i64,
        #[serde(default = "default_max_bits")]
        max: i64,
    },
    Subscription {
        #[serde(default = "yes")]
        plain: bool,
        #[serde(default = "yes")]
        resub: bool,
        #[serde(default = "yes")]
        prime: bool,
        #[serde(default = "yes")]
        gifted: bool,
    },
    Raid,
    Reward {
        #[serde(default)]
        title: Option<String>,
    },
    Follow,
    Joined,
    Left,
}

fn default_min_bits() -> i64 {
    100
}

fn default_max_bits() -> i64 {
    200
}

#[derive(Debug, Deserialize)]
pub struct ActionDef {
    /// Seconds between uses per viewer, `0` unlimited, negative once. Each action kind
    /// has its own default.
    #[serde(default)]
    pub cooldown: Option<Cooldown>,
    #[serde(default = "yes")]
    pub open_on_start: bool,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub restriction: Restriction,
    #[serde(flatten)]
    pub kind: ActionKindDef,
}

#[derive(Debug, Deserialize)]
pub struct VoteOptionDef {
    pub argument: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BetOptionDef {
    pub value: f64,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKindDef {
    Broadcast {
        channel: String,
    },
    Reply {
        #[serde(default)]
        template: Option<String>,
    },
    Invoke {
        topic: String,
    },
    Log {
        #[serde(default)]
        detail: LogDetail,
        #[serde(default = "yes")]
        identify_trigger: bool,
        #[serde(default = "yes")]
        carriage_return: bool,
        /// Name of the text surface to append to, instead of the logger.
        #[serde(default)]
        surface: Option<String>,
    },
    Pool {
        #[serde(default)]
        max_size: Option<i64>,
    },
    Vote {
        #[serde(default = "yes")]
        allow_new_options: bool,
        #[serde(default)]
        options: Vec<VoteOptionDef>,
    },
    Bet {
        #[serde(default)]
        condition: WinningCondition,
        #[serde(default = "yes")]
        allow_new_options: bool,
        #[serde(default)]
        decimals: Option<u32>,
        #[serde(default)]
        options: Vec<BetOptionDef>,
    },
    Help,
    CommandList,
}

impl TriggerDef {
    pub fn build(self) -> Result<Trigger> {
        let kind = match self {
            TriggerDef::Command { command } => TriggerKind::command(&command),
            TriggerDef::Message { text, mode } => {
                let mode = match mode {
                    TextModeDef::Equals => TextMode::Equals,
                    TextModeDef::Contains => TextMode::Contains,
                    TextModeDef::StartsWith => TextMode::StartsWith,
                    TextModeDef::Matches => TextMode::pattern(&text)?,
                };
                TriggerKind::Message { text, mode }
            }
            TriggerDef::AllMessages => TriggerKind::AllMessages,
            TriggerDef::Bits { min, max } => TriggerKind::bits(min, max),
            TriggerDef::Subscription {
                plain,
                resub,
                prime,
                gifted,
            } => TriggerKind::Subscription(SubFilter {
                plain,
                resub,
                prime,
                gifted,
            }),
            TriggerDef::Raid => TriggerKind::Raid,
            TriggerDef::Reward { title } => TriggerKind::Reward {
                title: title.filter(|t| !t.trim().is_empty()),
            },
            TriggerDef::Follow => TriggerKind::Follow,
            TriggerDef::Joined => TriggerKind::Joined,
            TriggerDef::Left => TriggerKind::Left,
        };
        Ok(Trigger::new(kind))
    }
}

impl ActionDef {
    pub fn build(self) -> Action {
        let kind = match self.kind {
            ActionKindDef::Broadcast { channel } => ActionKind::Broadcast { channel },
            ActionKindDef::Reply { template } => ActionKind::Reply {
                template: template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            },
            ActionKindDef::Invoke { topic } => ActionKind::Invoke { topic },
            ActionKindDef::Log {
                detail,
                identify_trigger,
                carriage_return,
                surface,
            } => ActionKind::Log(LogAction {
                detail,
                identify_trigger,
                carriage_return,
                target: surface.map_or(LogTarget::Logger, LogTarget::Surface),
            }),
            ActionKindDef::Pool { max_size } => ActionKind::Pool(ViewerPool::new(max_size.unwrap_or(-1))),
            ActionKindDef::Vote {
                allow_new_options,
                options,
            } => ActionKind::Vote(options.into_iter().fold(
                VoteSession::new(allow_new_options),
                |session, o| {
                    let label = o.label.unwrap_or_else(|| o.argument.clone());
                    session.with_option(&label, &o.argument)
                },
            )),
            ActionKindDef::Bet {
                condition,
                allow_new_options,
                decimals,
                options,
            } => {
                let mut session = BetSession::new(condition, allow_new_options);
                if let Some(decimals) = decimals {
                    if decimals > MAX_DECIMALS {
                        log::warn!("bet precision of {decimals} decimals lowered to {MAX_DECIMALS}");
                    }
                    session = session.with_decimals(decimals);
                }
                for o in options {
                    let value = session.canonical(o.value);
                    let label = o.label.unwrap_or_else(|| value.to_string());
                    session = session.with_option(&label, value);
                }
                ActionKind::Bet(session)
            }
            ActionKindDef::Help => ActionKind::Help,
            ActionKindDef::CommandList => ActionKind::CommandList,
        };

        let mut action = Action::new(kind)
            .with_duration(self.duration)
            .with_restriction(self.restriction)
            .opened_on_start(self.open_on_start);
        if let Some(cooldown) = self.cooldown {
            action = action.with_cooldown(cooldown);
        }
        action
    }
}

impl FeatureDef {
    pub fn build(self) -> Result<Feature> {
        let mut feature = Feature::new(&self.name);
        for trigger in self.triggers {
            feature = feature.with_trigger(trigger.build()?);
        }
        for action in self.actions {
            feature = feature.with_action(action.build());
        }
        feature.set_active(self.enabled);
        Ok(feature)
    }
}

pub fn parse_features(json: &str) -> Result<Vec<Feature>> {
    let defs: Vec<FeatureDef> = serde_json::from_str(json)?;
    defs.into_iter().map(FeatureDef::build).collect()
}

pub fn load_features(path: &Path) -> Result<Vec<Feature>> {
    let json = std::fs::read_to_string(path).map_err(|source| Error::FeatureFile {
        path: path.to_path_buf(),
        source,
    })?;
    let features = parse_features(&json)?;
    log::debug!("loaded {} features from {}", features.len(), path.display());
    Ok(features)
}
