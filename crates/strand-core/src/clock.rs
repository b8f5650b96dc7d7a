//! Timestamp sources.

use chrono::{SecondsFormat, Utc};
use strand_canonical::Timestamp;

/// Source of timestamps for branch and intent records.
pub trait Clock: Send + Sync {
    /// Current time as an RFC3339 UTC timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone)]
pub struct FixedClock(Timestamp);

impl FixedClock {
    /// Creates a clock that always returns `at`.
    pub fn new(at: Timestamp) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0.clone()
    }
}
