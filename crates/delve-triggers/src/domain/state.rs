//! Mutable per-trigger state: enable flags and cooldown bookkeeping.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Enable flags and fire history of one trigger.
///
/// `enabled` is the operator switch; `active` follows the owning instance.
/// A trigger only fires when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerState {
    enabled: bool,
    active: bool,
    last_fired_at: Option<DateTime<Utc>>,
    fire_count: u64,
}

impl Default for TriggerState {
    fn default() -> Self {
        Self {
            enabled: true,
            active: true,
            last_fired_at: None,
            fire_count: 0,
        }
    }
}

impl TriggerState {
    /// Operator switch.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Follows the owning instance.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Time of the last successful fire.
    #[must_use]
    pub fn last_fired_at(&self) -> Option<DateTime<Utc>> {
        self.last_fired_at
    }

    /// Number of successful fires.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    /// True if the trigger never fired or `now >= last_fired_at + cooldown`.
    ///
    /// A cooldown that runs past the last representable date never elapses.
    #[must_use]
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_fired_at.is_none_or(|at| {
            at.checked_add_signed(cooldown)
                .is_some_and(|ready_at| now >= ready_at)
        })
    }

    /// Time left until the cooldown elapses; zero once it has.
    ///
    /// Saturates at `Duration::MAX` when the ready time is out of range.
    #[must_use]
    pub fn cooldown_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Duration {
        match self.last_fired_at {
            Some(at) => match at.checked_add_signed(cooldown) {
                Some(ready_at) => (ready_at - now).max(Duration::zero()),
                None => Duration::MAX,
            },
            None => Duration::zero(),
        }
    }

    /// Records a successful fire at `now`.
    pub fn record_fire(&mut self, now: DateTime<Utc>) {
        self.last_fired_at = Some(now);
        self.fire_count += 1;
    }

    /// Forgets the last fire so the cooldown no longer applies.
    pub fn reset_cooldown(&mut self) {
        self.last_fired_at = None;
    }
}
