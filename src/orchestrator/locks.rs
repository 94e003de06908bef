//! Week locks.
//!
//! Runs and manual edits on the same `(tenant, week_start)` are serialised
//! by holding a [`WeekGuard`]. A second caller is rejected immediately with
//! `ConcurrentEditConflict` instead of waiting.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::SchedulerError;

/// Lock key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WeekKey {
    pub tenant_id: String,
    pub week_start: NaiveDate,
}

impl WeekKey {
    pub fn new(tenant_id: impl Into<String>, week_start: NaiveDate) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            week_start,
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.week_start)
    }
}

/// Set of currently held week keys.
#[derive(Debug)]
pub struct WeekLocks {
    held: Mutex<HashSet<WeekKey>>,
    retry_after_ms: u64,
}

impl WeekLocks {
    pub fn new(retry_after_ms: u64) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            retry_after_ms,
        }
    }

    /// Takes the lock for a week or fails fast.
    pub fn try_acquire(&self, key: WeekKey) -> Result<WeekGuard<'_>, SchedulerError> {
        let mut held = self.held.lock();
        if held.contains(&key) {
            debug!(week = %key, "week lock busy");
            return Err(SchedulerError::ConcurrentEditConflict {
                key: key.to_string(),
                retry_after_ms: self.retry_after_ms,
            });
        }
        held.insert(key.clone());
        Ok(WeekGuard { locks: self, key })
    }

    pub fn is_held(&self, key: &WeekKey) -> bool {
        self.held.lock().contains(key)
    }
}

/// Releases its week on drop.
#[derive(Debug)]
pub struct WeekGuard<'a> {
    locks: &'a WeekLocks,
    key: WeekKey,
}

impl WeekGuard<'_> {
    pub fn key(&self) -> &WeekKey {
        &self.key
    }
}

impl Drop for WeekGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tenant: &str, day: u32) -> WeekKey {
        WeekKey::new(tenant, NaiveDate::from_ymd_opt(2025, 3, day).unwrap())
    }

    #[test]
    fn test_second_acquire_conflicts() {
        let locks = WeekLocks::new(750);
        let guard = locks.try_acquire(key("t1", 3)).unwrap();
        let err = locks.try_acquire(key("t1", 3)).unwrap_err();
        assert_eq!(err.retry_after_ms(), Some(750));
        assert!(err.to_string().contains("t1/2025-03-03"));
        drop(guard);
        assert!(locks.try_acquire(key("t1", 3)).is_ok());
    }

    #[test]
    fn test_independent_keys() {
        let locks = WeekLocks::new(100);
        let _a = locks.try_acquire(key("t1", 3)).unwrap();
        let _b = locks.try_acquire(key("t1", 10)).unwrap();
        let _c = locks.try_acquire(key("t2", 3)).unwrap();
        assert!(locks.is_held(&key("t2", 3)));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = WeekLocks::new(100);
        {
            let guard = locks.try_acquire(key("t1", 3)).unwrap();
            assert_eq!(guard.key(), &key("t1", 3));
        }
        assert!(!locks.is_held(&key("t1", 3)));
    }
}
