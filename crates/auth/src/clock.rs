//! Time abstraction for testability
//!
//! Provides a trait-based approach to time so expiry logic can be exercised
//! deterministically without real time passing.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use cadenza_auth::clock::{Clock, MockClock, SystemClock};
//!
//! // Use the system clock in production
//! let clock = SystemClock;
//! let now = clock.now();
//!
//! // Use the mock clock in tests
//! let mock = MockClock::new();
//! let start = mock.now();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!((mock.now() - start).num_seconds(), 5);
//! ```

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Trait for wall-clock access
pub trait Clock: Send + Sync {
    /// Get the current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic testing
///
/// Starts at the current real time but only moves when advanced manually.
/// Clones share the same elapsed time.
#[derive(Debug, Clone)]
pub struct MockClock {
    base: DateTime<Utc>,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock anchored at the current real time
    #[must_use]
    pub fn new() -> Self {
        Self { base: Utc::now(), elapsed: Arc::new(Mutex::new(Duration::zero())) }
    }

    /// Advance the mock clock by a duration
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    ///
    /// use cadenza_auth::clock::MockClock;
    ///
    /// let clock = MockClock::new();
    /// clock.advance(Duration::from_secs(10));
    /// assert_eq!(clock.elapsed().num_seconds(), 10);
    /// ```
    pub fn advance(&self, duration: StdDuration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed += Duration::milliseconds(duration.as_millis() as i64);
    }

    /// Set the mock clock to an absolute elapsed time, replacing any
    /// previous elapsed time
    pub fn set_elapsed(&self, duration: StdDuration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed = Duration::milliseconds(duration.as_millis() as i64);
    }

    /// Get the simulated time elapsed since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + *self.elapsed.lock()
    }
}
