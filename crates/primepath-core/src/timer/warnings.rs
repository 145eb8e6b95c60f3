//! Warning threshold policy.
//!
//! Rules are checked in list order on every tick. Each rule fires at most
//! once per countdown lifetime; the fired set survives pause/resume and
//! restore, and is cleared only by `reset()`.

use std::collections::BTreeSet;

use crate::config::WarningRule;

#[derive(Debug, Clone)]
pub struct WarningPolicy {
    rules: Vec<WarningRule>,
    fired: BTreeSet<u64>,
}

impl WarningPolicy {
    pub fn new(rules: Vec<WarningRule>) -> Self {
        Self {
            rules,
            fired: BTreeSet::new(),
        }
    }

    /// Rules newly triggered at `remaining_secs`, in list order. A rule
    /// triggers once remaining time is at or below its threshold; a
    /// restore that jumps past several thresholds triggers them all.
    pub fn check(&mut self, remaining_secs: u64) -> Vec<WarningRule> {
        let mut triggered = Vec::new();
        for rule in &self.rules {
            if remaining_secs <= rule.threshold_secs && self.fired.insert(rule.threshold_secs) {
                triggered.push(rule.clone());
            }
        }
        triggered
    }

    pub fn reset(&mut self) {
        self.fired.clear();
    }

    /// Thresholds already announced this countdown.
    pub fn fired(&self) -> impl Iterator<Item = u64> + '_ {
        self.fired.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;

    fn default_policy() -> WarningPolicy {
        WarningPolicy::new(TimerConfig::default().warnings)
    }

    #[test]
    fn fires_exactly_once_at_threshold() {
        let mut policy = default_policy();
        assert!(policy.check(301).is_empty());
        let hits = policy.check(300);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].threshold_secs, 300);
        // Same remaining value again: nothing.
        assert!(policy.check(300).is_empty());
        assert!(policy.check(299).is_empty());
    }

    #[test]
    fn full_countdown_fires_each_rule_once() {
        let mut policy = default_policy();
        let mut fired = Vec::new();
        for remaining in (0..=301).rev() {
            for rule in policy.check(remaining) {
                fired.push((remaining, rule.threshold_secs));
            }
        }
        assert_eq!(fired, vec![(300, 300), (60, 60), (30, 30)]);
    }

    #[test]
    fn jump_past_several_thresholds_fires_all_in_order() {
        let mut policy = default_policy();
        let hits = policy.check(25);
        let thresholds: Vec<u64> = hits.iter().map(|r| r.threshold_secs).collect();
        assert_eq!(thresholds, vec![300, 60, 30]);
    }

    #[test]
    fn reset_allows_refiring() {
        let mut policy = default_policy();
        assert_eq!(policy.check(30).len(), 3);
        policy.reset();
        assert_eq!(policy.check(300).len(), 1);
    }
}
