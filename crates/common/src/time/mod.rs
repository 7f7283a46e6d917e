//! Wall-clock abstraction
//!
//! Token expiry is measured against wall-clock time. Production code reads
//! [`SystemClock`]; tests substitute `testing::MockClock` to pin "now".

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
