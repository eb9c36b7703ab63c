//! Exact per-key access bookkeeping
//!
//! Last-access time, access count and last known size live in one entry per
//! key, so a key can never have a count without a time or the reverse.

use crate::types::elapsed_between;
use crate::Clock;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Access record for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessEntry {
    pub last_access: DateTime<Utc>,
    pub count: u64,
    /// Last size reported with an access, 0 if never reported
    pub size: u64,
}

/// Tracks recency and frequency of access per key
#[derive(Debug)]
pub struct AccessTracker {
    entries: RwLock<HashMap<String, AccessEntry>>,
    clock: Arc<dyn Clock>,
}

impl AccessTracker {
    /// Create an empty tracker
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Record an access without size information
    pub fn record_access(&self, key: &str) {
        self.record(key, None);
    }

    /// Record an access and remember the value size
    pub fn record_access_sized(&self, key: &str, size: u64) {
        self.record(key, Some(size));
    }

    fn record(&self, key: &str, size: Option<u64>) {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                entry.count += 1;
                if let Some(size) = size {
                    entry.size = size;
                }
            }
            None => {
                entries.insert(
                    key.to_string(),
                    AccessEntry {
                        last_access: now,
                        count: 1,
                        size: size.unwrap_or(0),
                    },
                );
            }
        }
    }

    /// Full record for a key
    pub fn entry(&self, key: &str) -> Option<AccessEntry> {
        self.entries.read().get(key).copied()
    }

    /// Last access time, `None` if the key was never seen
    pub fn last_access(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entry(key).map(|e| e.last_access)
    }

    /// Number of recorded accesses, 0 if the key was never seen
    pub fn access_count(&self, key: &str) -> u64 {
        self.entry(key).map_or(0, |e| e.count)
    }

    /// Time since the last access
    pub fn idle_time(&self, key: &str) -> Option<Duration> {
        let last = self.last_access(key)?;
        Some(elapsed_between(last, self.clock.now()))
    }

    /// Whether the key has been idle longer than `threshold`
    ///
    /// Keys that were never seen count as cold.
    pub fn is_cold(&self, key: &str, threshold: Duration) -> bool {
        self.idle_time(key).map_or(true, |idle| idle > threshold)
    }

    /// Keys idle longer than `threshold`, longest idle first
    pub fn cold_keys(&self, threshold: Duration) -> Vec<String> {
        let now = self.clock.now();
        let entries = self.entries.read();

        let mut cold: Vec<(&String, DateTime<Utc>)> = entries
            .iter()
            .filter(|(_, e)| elapsed_between(e.last_access, now) > threshold)
            .map(|(k, e)| (k, e.last_access))
            .collect();
        cold.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        cold.into_iter().map(|(k, _)| k.clone()).collect()
    }

    /// Drop entries idle for longer than `max_age`, returning how many went
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| elapsed_between(e.last_access, now) <= max_age);
        before - entries.len()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clock this tracker reads time from
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
