//! Cold-data classification policies
//!
//! Each policy casts one vote. The detector combines the votes by strict
//! majority, so no single policy decides alone.

use super::tracker::AccessTracker;
use crate::DataMetadata;
use std::fmt;
use std::time::Duration;

/// One voter in cold-data classification
pub trait ColdDataPolicy: Send + Sync + fmt::Debug {
    /// Name reported in candidate listings
    fn name(&self) -> &str;

    /// Informational ordering hint, lower first
    fn priority(&self) -> u32;

    /// Whether this policy considers the key cold
    fn is_cold(&self, key: &str, metadata: &DataMetadata, tracker: &AccessTracker) -> bool;
}

/// Cold when idle for longer than `threshold` (or never accessed)
#[derive(Debug, Clone)]
pub struct TimeBasedColdPolicy {
    pub threshold: Duration,
}

impl ColdDataPolicy for TimeBasedColdPolicy {
    fn name(&self) -> &str {
        "time_based"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn is_cold(&self, key: &str, _: &DataMetadata, tracker: &AccessTracker) -> bool {
        tracker.is_cold(key, self.threshold)
    }
}

/// Cold when accessed fewer than `min_count` times
#[derive(Debug, Clone)]
pub struct AccessCountColdPolicy {
    pub min_count: u64,
}

impl ColdDataPolicy for AccessCountColdPolicy {
    fn name(&self) -> &str {
        "access_count"
    }

    fn priority(&self) -> u32 {
        2
    }

    fn is_cold(&self, key: &str, _: &DataMetadata, tracker: &AccessTracker) -> bool {
        tracker.access_count(key) < self.min_count
    }
}

/// Cold when the value is at least `min_size` bytes; large values are the
/// better recompression targets
#[derive(Debug, Clone)]
pub struct SizeBasedColdPolicy {
    pub min_size: u64,
}

impl ColdDataPolicy for SizeBasedColdPolicy {
    fn name(&self) -> &str {
        "size_based"
    }

    fn priority(&self) -> u32 {
        3
    }

    fn is_cold(&self, _: &str, metadata: &DataMetadata, _: &AccessTracker) -> bool {
        metadata.size >= self.min_size
    }
}
