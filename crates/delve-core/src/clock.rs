//! Clock abstraction so cooldowns and idle sweeps can be tested without
//! sleeping.

use chrono::{DateTime, Utc};

/// Source of "now" for the registry and trigger pipeline.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, used when minting instance ids.
    fn unix_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
