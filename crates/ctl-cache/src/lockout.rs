//! Login failure tracking.
//!
//! Counts failed binds per normalized DN. Once the count reaches the
//! policy's threshold the DN is locked for a fixed window; the lock is only
//! noticed and removed on the next check after the window ends.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

/// Lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures after which a DN is locked.
    pub max_failures: u32,
    /// How long a lock lasts.
    pub window: TimeDelta,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: TimeDelta::hours(2),
        }
    }
}

/// Failure state of one DN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockEntry {
    /// Consecutive failed attempts.
    pub failure_count: u32,
    /// Set once the threshold is reached.
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Failure entries keyed by normalized DN.
#[derive(Debug, Default)]
pub struct LockoutTable {
    policy: LockoutPolicy,
    entries: HashMap<String, LockEntry>,
}

impl LockoutTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    /// Returns true if `dn` is locked at `now`.
    ///
    /// An expired lock is removed together with its failure count.
    pub fn is_locked(&mut self, dn: &str, now: DateTime<Utc>) -> bool {
        let Some(until) = self.entries.get(dn).and_then(|e| e.blocked_until) else {
            return false;
        };
        if now < until {
            return true;
        }
        self.entries.remove(dn);
        false
    }

    /// Starts a bind attempt on `dn`.
    ///
    /// Returns `None` if the DN is locked. Otherwise the attempt is counted
    /// as a failure up front and the new count is returned; a successful
    /// attempt undoes it with [`LockoutTable::clear_failures`]. Counting
    /// before the password is checked keeps concurrent attempts on one DN
    /// within the threshold.
    pub fn begin_attempt(&mut self, dn: &str, now: DateTime<Utc>) -> Option<u32> {
        if self.is_locked(dn, now) {
            return None;
        }
        Some(self.record_failure(dn, now))
    }

    /// Records a failed attempt and returns the new failure count.
    pub fn record_failure(&mut self, dn: &str, now: DateTime<Utc>) -> u32 {
        let entry = self.entries.entry(dn.to_string()).or_default();
        entry.failure_count += 1;
        if entry.failure_count >= self.policy.max_failures && entry.blocked_until.is_none() {
            entry.blocked_until = Some(now + self.policy.window);
            tracing::warn!(dn, failures = entry.failure_count, "Login locked");
        }
        entry.failure_count
    }

    /// Clears failures after a successful attempt.
    pub fn clear_failures(&mut self, dn: &str) {
        self.entries.remove(dn);
    }

    /// Returns the failure entry of `dn`, if any.
    #[must_use]
    pub fn get(&self, dn: &str) -> Option<&LockEntry> {
        self.entries.get(dn)
    }
}
