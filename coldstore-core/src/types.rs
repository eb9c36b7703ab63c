//! Core types for ColdStore

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Per-call description of a value used by compression and cold policies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMetadata {
    /// Size of the value in bytes
    pub size: u64,
    /// Last time the key was read or written, `None` if never seen
    pub last_accessed: Option<DateTime<Utc>>,
    /// Number of recorded accesses
    pub access_count: u64,
    /// Free-form data type label (e.g. "binary", "document")
    pub data_type: String,
    /// Owning table, if any
    pub table_name: String,
}

impl DataMetadata {
    /// Create metadata for a value of the given size
    pub fn new(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Set the last access time
    pub fn with_last_accessed(mut self, at: DateTime<Utc>) -> Self {
        self.last_accessed = Some(at);
        self
    }

    /// Set the access count
    pub fn with_access_count(mut self, count: u64) -> Self {
        self.access_count = count;
        self
    }

    /// Set the data type label
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Set the owning table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = table.into();
        self
    }
}

/// A key the cold detector considers worth recompressing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdDataCandidate {
    pub key: String,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub size: u64,
    /// Heuristic coldness in `[0, 1]`, higher is colder
    pub cold_score: f64,
    /// Names of the cold policies that voted for this key
    pub policies: Vec<String>,
}

/// Source of the current time
///
/// Every component that compares against a cold threshold reads time through
/// this trait so tests can move time forward without sleeping.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now
            .checked_add_signed(to_chrono(by))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jump to an absolute time
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Convert a std duration to a chrono duration, saturating on overflow
pub(crate) fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or(ChronoDuration::MAX)
}

/// Time elapsed from `since` to `now`; zero if `since` is in the future
pub(crate) fn elapsed_between(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
