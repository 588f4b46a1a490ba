// ============================================
// File: crates/vlink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Credential timestamps, rate gates and retry deadlines are all expressed
//! in Unix milliseconds. This module provides the clock and an atomic
//! cell for storing such timestamps without locks.
//!
//! ## Main Functionality
//! - `now_millis()`: Current Unix time in milliseconds
//! - `AtomicMillis`: Lock-free millisecond timestamp cell
//!
//! ## ⚠️ Important Note for Next Developer
//! - All protocol logic takes `now` as a parameter; only the outermost
//!   layer (housekeeping, dispatcher entry) reads the clock
//! - A clock before the Unix epoch reads as 0 rather than panicking
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================
// Clock
// ============================================

/// Returns the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

// ============================================
// AtomicMillis
// ============================================

/// Thread-safe millisecond timestamp.
///
/// Used for "last time X happened" bookkeeping on shared objects such as
/// peers and memberships, where taking a lock for a single integer would
/// be wasteful.
#[derive(Debug, Default)]
pub struct AtomicMillis(AtomicI64);

impl AtomicMillis {
    /// Creates a cell holding `millis`.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self(AtomicI64::new(millis))
    }

    /// Loads the stored timestamp.
    #[must_use]
    pub fn load(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Stores a new timestamp.
    pub fn store(&self, millis: i64) {
        self.0.store(millis, Ordering::Relaxed);
    }

    /// Milliseconds elapsed between the stored value and `now`.
    #[must_use]
    pub fn elapsed(&self, now: i64) -> i64 {
        now.saturating_sub(self.load())
    }

    /// Atomically moves the timestamp to `now` if at least `interval`
    /// milliseconds have passed since the stored value.
    ///
    /// Returns `true` if the caller won the gate. Concurrent callers
    /// racing on the same window see exactly one winner.
    pub fn try_advance(&self, now: i64, interval: i64) -> bool {
        let mut current = self.load();
        loop {
            if now.saturating_sub(current) < interval {
                return false;
            }
            match self
                .0
                .compare_exchange_weak(current, now, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clone for AtomicMillis {
    fn clone(&self) -> Self {
        Self::new(self.load())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01 in milliseconds
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_atomic_millis_store_and_elapsed() {
        let cell = AtomicMillis::new(1_000);
        assert_eq!(cell.elapsed(1_500), 500);
        cell.store(2_000);
        assert_eq!(cell.load(), 2_000);
        assert_eq!(cell.clone().load(), 2_000);
    }

    #[test]
    fn test_try_advance_gates_by_interval() {
        let cell = AtomicMillis::new(0);
        assert!(cell.try_advance(1_000, 1_000));
        assert!(!cell.try_advance(1_500, 1_000));
        assert!(cell.try_advance(2_000, 1_000));
        assert_eq!(cell.load(), 2_000);
    }

    #[test]
    fn test_try_advance_single_winner() {
        let cell = Arc::new(AtomicMillis::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || cell.try_advance(10_000, 5_000))
            })
            .collect();

        let winners = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
