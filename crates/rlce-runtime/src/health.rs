use std::collections::{BTreeMap, BTreeSet};

use crate::HealthAlarm;

/// Change in alarm state produced by one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTransition {
    Raised(HealthAlarm),
    Cleared(HealthAlarm),
}

/// Consecutive-failure counters per collaborator.
///
/// An alarm is raised once when a counter reaches the retry budget and
/// cleared on the next success. Repeated failures while raised are silent.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    retry_budget: u32,
    failures: BTreeMap<HealthAlarm, u32>,
    raised: BTreeSet<HealthAlarm>,
}

impl HealthMonitor {
    /// A budget of 0 is treated as 1: the first failure alarms.
    pub fn new(retry_budget: u32) -> Self {
        Self {
            retry_budget: retry_budget.max(1),
            failures: BTreeMap::new(),
            raised: BTreeSet::new(),
        }
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    pub fn consecutive_failures(&self, alarm: HealthAlarm) -> u32 {
        self.failures.get(&alarm).copied().unwrap_or(0)
    }

    pub fn is_raised(&self, alarm: HealthAlarm) -> bool {
        self.raised.contains(&alarm)
    }

    pub fn raised(&self) -> impl Iterator<Item = HealthAlarm> + '_ {
        self.raised.iter().copied()
    }

    pub fn failure(&mut self, alarm: HealthAlarm) -> Option<AlarmTransition> {
        let n = self.failures.entry(alarm).or_insert(0);
        *n = n.saturating_add(1);
        if *n >= self.retry_budget && self.raised.insert(alarm) {
            return Some(AlarmTransition::Raised(alarm));
        }
        None
    }

    /// Raise without waiting for the budget (data already lost).
    pub fn raise_now(&mut self, alarm: HealthAlarm) -> Option<AlarmTransition> {
        self.failures.insert(alarm, self.retry_budget);
        self.raised.insert(alarm).then_some(AlarmTransition::Raised(alarm))
    }

    pub fn success(&mut self, alarm: HealthAlarm) -> Option<AlarmTransition> {
        self.failures.remove(&alarm);
        self.raised
            .remove(&alarm)
            .then_some(AlarmTransition::Cleared(alarm))
    }
}
