use super::Rejection;
use crate::{
    event::UserId,
    tally::{OptionStatus, VoteOption},
};

/// Viewers vote by typing the argument of an option; the most backed option wins.
#[derive(Debug, Clone, Default)]
pub struct VoteSession {
    pub options: Vec<VoteOption>,
    /// Votes for an unknown argument open a new option instead of being dropped.
    pub allow_new_options: bool,
}

impl VoteSession {
    pub fn new(allow_new_options: bool) -> Self {
        Self {
            options: Vec::new(),
            allow_new_options,
        }
    }

    pub fn with_option(mut self, label: &str, argument: &str) -> Self {
        self.options.push(VoteOption::new(argument.to_string(), label));
        self
    }

    pub fn option(&self, argument: &str) -> Option<&VoteOption> {
        self.options.iter().find(|o| o.key == argument)
    }

    pub fn accepts(&self, argument: &str) -> Result<(), Rejection> {
        if self.allow_new_options || self.option(argument).is_some() {
            Ok(())
        } else {
            Err(Rejection::UnknownOption(argument.to_string()))
        }
    }

    pub fn register(&mut self, viewer: UserId, argument: &str) -> Result<(), Rejection> {
        match self.options.iter_mut().find(|o| o.key == argument) {
            Some(option) => {
                option.register(viewer);
            }
            None if self.allow_new_options => {
                log::debug!("new vote option '{argument}'");
                let mut option = VoteOption::vote(argument);
                option.register(viewer);
                self.options.push(option);
            }
            None => return Err(Rejection::UnknownOption(argument.to_string())),
        }

        self.refresh_status();
        Ok(())
    }

    /// Options at the highest count win, or tie when more than one shares it.
    pub fn refresh_status(&mut self) {
        let Some(max) = self.options.iter().map(VoteOption::count).max() else {
            return;
        };
        let at_max = self.options.iter().filter(|o| o.count() == max).count();

        for option in &mut self.options {
            option.status = if option.count() != max {
                OptionStatus::Losing
            } else if at_max > 1 {
                OptionStatus::Tie
            } else {
                OptionStatus::Winning
            };
        }
    }

    pub fn winners(&self) -> impl Iterator<Item = &VoteOption> {
        self.options
            .iter()
            .filter(|o| matches!(o.status, OptionStatus::Winning | OptionStatus::Tie))
    }

    pub fn reset(&mut self) {
        for option in &mut self.options {
            option.reset();
        }
    }

    pub fn clear(&mut self) {
        self.options.clear();
    }
}
