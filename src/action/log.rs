use serde::{Deserialize, Serialize};

use super::Fired;
use crate::{bus::ChannelMessage, context::RuntimeContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDetail {
    Basic,
    #[default]
    UserId,
    UserIdAndMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    #[default]
    Logger,
    /// A named text surface, fed through the broadcast bus.
    Surface(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAction {
    pub detail: LogDetail,
    pub identify_trigger: bool,
    pub carriage_return: bool,
    pub target: LogTarget,
}

impl Default for LogAction {
    fn default() -> Self {
        Self {
            detail: LogDetail::UserId,
            identify_trigger: true,
            carriage_return: true,
            target: LogTarget::Logger,
        }
    }
}

impl LogAction {
    pub fn line(&self, fired: &Fired) -> String {
        let mut line = String::from("Action triggered");
        if self.identify_trigger {
            line.push_str(&format!(" from {}", fired.source));
        }
        match self.detail {
            LogDetail::Basic => line.push('.'),
            LogDetail::UserId => line.push_str(&format!(" by user {}.", fired.sender_id)),
            LogDetail::UserIdAndMessage => line.push_str(&format!(
                " by user {} saying {}.",
                fired.sender_id, fired.message
            )),
        }
        if self.carriage_return {
            line.push('\r');
        }
        line
    }

    pub fn emit(&self, fired: &Fired, ctx: &RuntimeContext) {
        let line = self.line(fired);
        match &self.target {
            LogTarget::Logger => log::info!("{}", line.trim_end_matches('\r')),
            LogTarget::Surface(name) => {
                ctx.broadcaster
                    .publish(name, ChannelMessage::new(name, "log", &line));
            }
        }
    }
}
