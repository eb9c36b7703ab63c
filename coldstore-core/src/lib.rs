//! ColdStore Core - transparent compression and cold-data management
//!
//! A layer that sits in a storage engine's read/write path and keeps values
//! compressed when that pays off:
//! - Adaptive algorithm selection (lz4 for small hot values, zstd for large
//!   or cold ones)
//! - Self-describing frames so compressed and raw values can share a keyspace
//! - Cold-data detection by policy vote over tracked access patterns
//! - Background recompression of cold keys
//!
//! # Architecture
//!
//! - **Engine**: algorithm registry and size/temperature selection policy
//! - **Cold**: access tracker, bloom filter and voting cold-data detector
//! - **Transparent**: framed write/read codec over the engine
//! - **Manager**: owns the above plus the background worker pool
//! - **Monitor / Metrics / Reporting**: counters, time series, alerts and
//!   scheduled reports

pub mod cold;
pub mod engine;
pub mod manager;
pub mod metrics;
pub mod monitor;
pub mod reporting;
pub mod transparent;

mod error;
mod types;

pub use error::{ColdStoreError, Result};
pub use types::*;

pub use engine::{CompressionEngine, EngineConfig};
pub use manager::{CompressionManager, ManagerConfig};
pub use monitor::CompressionMonitor;
pub use transparent::{TransparentCompression, TransparentConfig};

/// ColdStore version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    use std::time::Duration;

    /// Values below this size are stored raw (1KB)
    pub const MIN_COMPRESS_SIZE: u64 = 1024;

    /// Size at which the engine switches from lz4 to zstd (10KB)
    pub const LARGE_VALUE_THRESHOLD: usize = 10 * 1024;

    /// Idle time after which a key counts as cold
    pub const COLD_THRESHOLD: Duration = Duration::from_secs(24 * 60 * 60);

    pub const ZSTD_LEVEL: i32 = 3;

    pub const BLOOM_FILTER_BITS: usize = 1_000_000;
    pub const BLOOM_FILTER_HASHES: usize = 3;

    /// Access entries older than this are dropped on cleanup
    pub const ACCESS_TRACKING_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// Keys read fewer times than this vote cold
    pub const MIN_ACCESS_COUNT: u64 = 5;

    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

    /// Interval between cold-data sweeps
    pub const COMPRESSION_INTERVAL: Duration = Duration::from_secs(5 * 60);

    pub const MAX_CANDIDATES_PER_CYCLE: usize = 100;

    /// Shared background work queue
    pub const WORK_QUEUE_CAPACITY: usize = 1000;

    pub const WORKER_COUNT: usize = 4;

    /// Per-worker queue
    pub const WORKER_QUEUE_CAPACITY: usize = 10;

    /// Points retained per metric series
    pub const SERIES_CAPACITY: usize = 1000;

    pub const REPORTER_PORT: u16 = 8090;

    /// How often the report scheduler looks for due schedules
    pub const REPORT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

    /// Points per series on the dashboard
    pub const DASHBOARD_POINTS: usize = 100;

    /// Memory-destination reports kept by the scheduler
    pub const RECENT_REPORTS: usize = 100;
}
