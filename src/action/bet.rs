use serde::{Deserialize, Serialize};

use super::Rejection;
use crate::{
    event::UserId,
    tally::{BetOption, OptionStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinningCondition {
    Highest,
    Lowest,
    #[default]
    Closest,
    ClosestAbove,
    ClosestBelow,
    Furthest,
}

/// Finest precision bets can be rounded to; f64 carries no more than that.
pub const MAX_DECIMALS: u32 = 15;

/// Viewers bet on a number; the session is settled against the real outcome.
#[derive(Debug, Clone, Default)]
pub struct BetSession {
    pub options: Vec<BetOption>,
    pub allow_new_options: bool,
    pub condition: WinningCondition,
    /// Bets are rounded to this many decimals before being matched against existing
    /// options. `None` keeps exact floating-point matching.
    pub decimals: Option<u32>,
}

impl BetSession {
    pub fn new(condition: WinningCondition, allow_new_options: bool) -> Self {
        Self {
            options: Vec::new(),
            allow_new_options,
            condition,
            decimals: None,
        }
    }

    pub fn with_option(mut self, label: &str, value: f64) -> Self {
        self.options.push(BetOption::new(value, label));
        self
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = Some(decimals.min(MAX_DECIMALS));
        self
    }

    /// Parses a viewer's bet, canonicalised to the session's precision.
    pub fn parse_value(&self, input: &str) -> Result<f64, Rejection> {
        let value = input
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Rejection::InvalidArgument(input.to_string()))?;
        Ok(self.canonical(value))
    }

    pub fn canonical(&self, value: f64) -> f64 {
        match self.decimals {
            Some(decimals) => {
                let scale = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
                (value * scale).round() / scale
            }
            None => value,
        }
    }

    pub fn option(&self, value: f64) -> Option<&BetOption> {
        self.options.iter().find(|o| o.key == value)
    }

    pub fn accepts(&self, value: f64) -> Result<(), Rejection> {
        if self.allow_new_options || self.option(value).is_some() {
            Ok(())
        } else {
            Err(Rejection::UnknownOption(value.to_string()))
        }
    }

    pub fn register(&mut self, viewer: UserId, value: f64) -> Result<(), Rejection> {
        match self.options.iter_mut().find(|o| o.key == value) {
            Some(option) => {
                option.register(viewer);
            }
            None if self.allow_new_options => {
                let mut option = BetOption::bet(value);
                option.register(viewer);
                self.options.push(option);
            }
            None => return Err(Rejection::UnknownOption(value.to_string())),
        }
        Ok(())
    }

    /// Ranks every option against `target` according to the winning condition.
    pub fn settle(&mut self, target: f64) {
        if self.options.is_empty() {
            return;
        }

        match self.condition {
            WinningCondition::Highest => {
                let best = self.fold_keys(f64::NEG_INFINITY, f64::max);
                self.mark_winners(|v| v == best);
            }
            WinningCondition::Lowest => {
                let best = self.fold_keys(f64::INFINITY, f64::min);
                self.mark_winners(|v| v == best);
            }
            WinningCondition::Closest => {
                let best = self.fold_keys(f64::INFINITY, |acc, v| acc.min((v - target).abs()));
                self.mark_ranked(|v| (v - target).abs() == best);
            }
            WinningCondition::Furthest => {
                let best = self.fold_keys(f64::NEG_INFINITY, |acc, v| acc.max((v - target).abs()));
                self.mark_ranked(|v| (v - target).abs() == best);
            }
            WinningCondition::ClosestAbove => {
                let best = self.fold_keys(f64::INFINITY, |acc, v| {
                    if v >= target {
                        acc.min(v - target)
                    } else {
                        acc
                    }
                });
                self.mark_winners(|v| v >= target && v - target == best);
            }
            WinningCondition::ClosestBelow => {
                let best = self.fold_keys(f64::INFINITY, |acc, v| {
                    if v <= target {
                        acc.min(target - v)
                    } else {
                        acc
                    }
                });
                self.mark_winners(|v| v <= target && target - v == best);
            }
        }
    }

    fn fold_keys(&self, init: f64, f: impl Fn(f64, f64) -> f64) -> f64 {
        self.options.iter().map(|o| o.key).fold(init, f)
    }

    /// Every matching option wins, no tie detection.
    fn mark_winners(&mut self, wins: impl Fn(f64) -> bool) {
        for option in &mut self.options {
            option.status = if wins(option.key) {
                OptionStatus::Winning
            } else {
                OptionStatus::Losing
            };
        }
    }

    /// A single matching option wins; several matching options tie.
    fn mark_ranked(&mut self, wins: impl Fn(f64) -> bool) {
        let count = self.options.iter().filter(|o| wins(o.key)).count();
        for option in &mut self.options {
            option.status = match (wins(option.key), count) {
                (false, _) => OptionStatus::Losing,
                (true, 1) => OptionStatus::Winning,
                (true, _) => OptionStatus::Tie,
            };
        }
    }

    pub fn winners(&self) -> impl Iterator<Item = &BetOption> {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn session(condition: WinningCondition, values: &[f64]) -> BetSession {
        let mut session = BetSession::new(condition, true);
        for (i, v) in values.iter().enumerate() {
            session.register(UserId(i as u64), *v).unwrap();
        }
        session
    }

    fn statuses(session: &BetSession) -> Vec<OptionStatus> {
        session.options.iter().map(|o| o.status).collect()
    }

    use OptionStatus::*;

    #[test]
    fn test_closest_tie() {
        let mut s = session(WinningCondition::Closest, &[10.0, 20.0, 30.0]);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Tie, Tie, Losing]);
    }

    #[test]
    fn test_closest_single_winner() {
        let mut s = session(WinningCondition::Closest, &[5.0, 5.0, 3.0, 9.0]);
        assert_eq!(s.options.len(), 3);
        assert_eq!(s.option(5.0).unwrap().count(), 2);

        s.settle(4.2);
        assert_eq!(statuses(&s), vec![Losing, Winning, Losing]);
    }

    #[test]
    fn test_highest_duplicates_all_win() {
        let mut s = BetSession::new(WinningCondition::Highest, false)
            .with_option("five", 5.0)
            .with_option("also five", 5.0)
            .with_option("two", 2.0);
        s.settle(0.0);
        assert_eq!(statuses(&s), vec![Winning, Winning, Losing]);
    }

    #[test]
    fn test_lowest() {
        let mut s = session(WinningCondition::Lowest, &[3.0, -1.0, 8.0]);
        s.settle(100.0);
        assert_eq!(statuses(&s), vec![Losing, Winning, Losing]);
    }

    #[test]
    fn test_closest_above_and_below() {
        let mut s = session(WinningCondition::ClosestAbove, &[10.0, 14.0, 17.0, 20.0]);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Losing, Losing, Winning, Losing]);

        let mut s = session(WinningCondition::ClosestBelow, &[10.0, 14.0, 17.0, 20.0]);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Losing, Winning, Losing, Losing]);
    }

    #[test]
    fn test_closest_above_duplicates_are_not_tied() {
        let mut s = BetSession::new(WinningCondition::ClosestAbove, false)
            .with_option("a", 16.0)
            .with_option("b", 16.0);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Winning, Winning]);
    }

    #[test]
    fn test_closest_above_without_candidates() {
        let mut s = session(WinningCondition::ClosestAbove, &[1.0, 2.0]);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Losing, Losing]);
    }

    #[test]
    fn test_furthest() {
        let mut s = session(WinningCondition::Furthest, &[5.0, 5.5, 25.0]);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Tie, Losing, Tie]);

        let mut s = session(WinningCondition::Furthest, &[5.0, 5.5, 24.0]);
        s.settle(15.0);
        assert_eq!(statuses(&s), vec![Winning, Losing, Losing]);
    }

    #[test]
    fn test_settle_empty() {
        let mut s = BetSession::new(WinningCondition::Closest, true);
        s.settle(1.0);
        assert!(s.options.is_empty());
    }

    #[test]
    fn test_parse_value() {
        let s = BetSession::new(WinningCondition::Closest, true);
        assert_eq!(s.parse_value(" 12.5 "), Ok(12.5));
        assert!(matches!(s.parse_value("twelve"), Err(Rejection::InvalidArgument(_))));
        assert!(matches!(s.parse_value("NaN"), Err(Rejection::InvalidArgument(_))));
    }

    #[test]
    fn test_decimals_canonicalise() {
        let mut s = BetSession::new(WinningCondition::Closest, true).with_decimals(2);
        let a = s.parse_value("0.3").unwrap();
        let b = s.canonical(0.1 + 0.2);
        s.register(UserId(1), a).unwrap();
        s.register(UserId(2), b).unwrap();
        assert_eq!(s.options.len(), 1);
        assert_eq!(s.options[0].count(), 2);
    }

    #[test]
    fn test_huge_precision_still_matches() {
        let mut s = BetSession::new(WinningCondition::Closest, true).with_decimals(400);
        assert_eq!(s.decimals, Some(MAX_DECIMALS));
        let value = s.parse_value("12.5").unwrap();
        assert!(value.is_finite());
        s.register(UserId(1), value).unwrap();
        s.register(UserId(2), s.parse_value("12.5").unwrap()).unwrap();
        assert_eq!(s.options.len(), 1);
        assert_eq!(s.options[0].count(), 2);
    }

    #[test]
    fn test_exact_matching_by_default() {
        let mut s = BetSession::new(WinningCondition::Closest, true);
        s.register(UserId(1), 0.3).unwrap();
        s.register(UserId(2), 0.1 + 0.2).unwrap();
        assert_eq!(s.options.len(), 2);
    }
}
