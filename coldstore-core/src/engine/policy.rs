//! Compression policies
//!
//! A policy decides whether a buffer should be compressed and which
//! algorithm to use. Policies never fail; a policy that cannot decide must
//! answer "do not compress".

use super::algorithm::{LZ4, ZSTD};
use crate::types::elapsed_between;
use crate::DataMetadata;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Decides whether and how to compress a buffer
pub trait CompressionPolicy: Send + Sync + fmt::Debug {
    /// Policy name, for logs
    fn name(&self) -> &str;

    /// Whether this policy wants the buffer compressed
    fn should_compress(
        &self,
        data: &[u8],
        metadata: Option<&DataMetadata>,
        now: DateTime<Utc>,
    ) -> bool;

    /// Algorithm to use; `None` lets the engine use its default
    fn select_algorithm(&self, data: &[u8], metadata: Option<&DataMetadata>) -> Option<&str>;
}

/// Compress anything at least `min_size` bytes long
///
/// Values below `large_value_threshold` get the fast algorithm, larger
/// values the high-ratio one.
#[derive(Debug, Clone)]
pub struct SizeBasedPolicy {
    pub min_size: u64,
    pub large_value_threshold: usize,
}

impl SizeBasedPolicy {
    pub fn new(min_size: u64) -> Self {
        Self {
            min_size,
            large_value_threshold: crate::config::LARGE_VALUE_THRESHOLD,
        }
    }
}

impl CompressionPolicy for SizeBasedPolicy {
    fn name(&self) -> &str {
        "size_based"
    }

    fn should_compress(&self, data: &[u8], _: Option<&DataMetadata>, _: DateTime<Utc>) -> bool {
        data.len() as u64 >= self.min_size
    }

    fn select_algorithm(&self, data: &[u8], _: Option<&DataMetadata>) -> Option<&str> {
        if data.len() < self.large_value_threshold {
            Some(LZ4)
        } else {
            Some(ZSTD)
        }
    }
}

/// Compress values idle for longer than `cold_threshold`, always with the
/// high-ratio algorithm
#[derive(Debug, Clone)]
pub struct ColdDataCompressionPolicy {
    pub cold_threshold: Duration,
}

impl ColdDataCompressionPolicy {
    pub fn new(cold_threshold: Duration) -> Self {
        Self { cold_threshold }
    }
}

impl CompressionPolicy for ColdDataCompressionPolicy {
    fn name(&self) -> &str {
        "cold_data"
    }

    fn should_compress(
        &self,
        _: &[u8],
        metadata: Option<&DataMetadata>,
        now: DateTime<Utc>,
    ) -> bool {
        match metadata.and_then(|m| m.last_accessed) {
            Some(last) => elapsed_between(last, now) > self.cold_threshold,
            None => false,
        }
    }

    fn select_algorithm(&self, _: &[u8], _: Option<&DataMetadata>) -> Option<&str> {
        Some(ZSTD)
    }
}
