//! Mock wall clock for deterministic expiry tests
//!
//! # Examples
//!
//! ```
//! use chrono::Duration;
//! use habitflow_common::testing::MockClock;
//! use habitflow_common::time::Clock;
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now() - start, Duration::seconds(5));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::time::Clock;

/// Clock whose time only moves when told to
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Start at the current real time
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Start at a fixed instant
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    /// Simulate time passing without waiting
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
