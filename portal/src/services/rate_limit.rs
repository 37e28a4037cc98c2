use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::errors::PortalError;

pub const WINDOW_SECS: i64 = 900;
pub const MAX_ATTEMPTS: usize = 5;

/// Time source for the limiter. Production uses the system clock; tests
/// inject a manual one to step through window boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// In-memory sliding-window limiter for login attempts, keyed by a caller
/// supplied identifier (the submitted email, lowercased). State is local to
/// the process; the portal runs as a single instance.
pub struct LoginRateLimiter {
    attempts: DashMap<String, Vec<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
    window: Duration,
    max_attempts: usize,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: DashMap::new(),
            clock,
            window: Duration::seconds(WINDOW_SECS),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Records one attempt, unless the identifier already has
    /// `MAX_ATTEMPTS` inside the window. Rejected attempts are not
    /// recorded, so hammering a locked identifier does not extend the
    /// lockout past the original window.
    pub fn check_and_record(&self, identifier: &str) -> Result<(), PortalError> {
        let now = self.clock.now();
        let cutoff = now - self.window;

        let mut entry = self.attempts.entry(identifier.to_string()).or_default();
        entry.retain(|at| *at > cutoff);
        if entry.len() >= self.max_attempts {
            return Err(PortalError::RateLimited);
        }
        entry.push(now);
        Ok(())
    }

    /// Called after a successful login so a correct password immediately
    /// forgets earlier failures.
    pub fn clear(&self, identifier: &str) {
        self.attempts.remove(identifier);
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
