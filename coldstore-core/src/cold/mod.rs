//! Cold data detection
//!
//! Combines three structures, each behind its own lock:
//!
//! - **BloomFilter**: cheap "recently seen" membership, cleared wholesale
//!   every cleanup cycle
//! - **AccessTracker**: exact last-access time and access count per key
//! - **Policies**: independent voters; a key is cold on strict majority
//!
//! A key goes from warm to cold implicitly, as time passes without access.

mod bloom;
mod policy;
mod tracker;

pub use bloom::BloomFilter;
pub use policy::{AccessCountColdPolicy, ColdDataPolicy, SizeBasedColdPolicy, TimeBasedColdPolicy};
pub use tracker::{AccessEntry, AccessTracker};

use crate::types::elapsed_between;
use crate::{Clock, ColdDataCandidate, ColdStoreError, DataMetadata, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TIME_WEIGHT: f64 = 0.5;
const FREQUENCY_WEIGHT: f64 = 0.3;
const SIZE_WEIGHT: f64 = 0.2;

/// Cold detection configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColdDataConfig {
    pub enabled: bool,
    /// Idle time after which a key becomes a candidate
    pub cold_threshold: Duration,
    /// Bloom filter size in bits
    pub bloom_filter_size: usize,
    pub bloom_filter_hash_count: usize,
    /// Access records older than this are purged on cleanup
    pub access_tracking_window: Duration,
    /// Keys accessed fewer times than this vote cold
    pub min_access_count: u64,
    /// Values at least this large vote cold
    pub size_threshold: u64,
    pub cleanup_interval: Duration,
}

impl Default for ColdDataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cold_threshold: crate::config::COLD_THRESHOLD,
            bloom_filter_size: crate::config::BLOOM_FILTER_BITS,
            bloom_filter_hash_count: crate::config::BLOOM_FILTER_HASHES,
            access_tracking_window: crate::config::ACCESS_TRACKING_WINDOW,
            min_access_count: crate::config::MIN_ACCESS_COUNT,
            size_threshold: crate::config::MIN_COMPRESS_SIZE,
            cleanup_interval: crate::config::CLEANUP_INTERVAL,
        }
    }
}

impl ColdDataConfig {
    /// Reject configurations the detector cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bloom_filter_size == 0 {
            return Err(ColdStoreError::ConfigInvalid(
                "bloom_filter_size must be greater than 0".into(),
            ));
        }
        if self.bloom_filter_hash_count == 0 {
            return Err(ColdStoreError::ConfigInvalid(
                "bloom_filter_hash_count must be greater than 0".into(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ColdStoreError::ConfigInvalid(
                "cleanup_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Finds data worth recompressing with a higher-ratio algorithm
#[derive(Debug)]
pub struct ColdDataDetector {
    bloom: BloomFilter,
    tracker: Arc<AccessTracker>,
    policies: Vec<Box<dyn ColdDataPolicy>>,
    config: RwLock<ColdDataConfig>,
}

impl ColdDataDetector {
    /// Create a detector with the three built-in policies
    pub fn new(config: ColdDataConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let policies: Vec<Box<dyn ColdDataPolicy>> = vec![
            Box::new(TimeBasedColdPolicy {
                threshold: config.cold_threshold,
            }),
            Box::new(AccessCountColdPolicy {
                min_count: config.min_access_count,
            }),
            Box::new(SizeBasedColdPolicy {
                min_size: config.size_threshold,
            }),
        ];
        Self::with_policies(config, clock, policies)
    }

    /// Create a detector with an explicit policy set
    pub fn with_policies(
        config: ColdDataConfig,
        clock: Arc<dyn Clock>,
        policies: Vec<Box<dyn ColdDataPolicy>>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            bloom: BloomFilter::new(config.bloom_filter_size, config.bloom_filter_hash_count),
            tracker: Arc::new(AccessTracker::new(clock)),
            policies,
            config: RwLock::new(config),
        })
    }

    /// Add a voting policy
    pub fn add_policy<P: ColdDataPolicy + 'static>(&mut self, policy: P) {
        self.policies.push(Box::new(policy));
    }

    /// Record a read or write of `key`
    pub fn record_access(&self, key: &str, size: u64) {
        if !self.config.read().enabled {
            return;
        }
        self.tracker.record_access_sized(key, size);
        self.bloom.add(key);
    }

    /// Whether `key` is cold
    ///
    /// A key the bloom filter has seen recently and whose tracked idle time is
    /// under half the cold threshold is never cold. Otherwise the policies
    /// vote, and more than half of them must agree.
    pub fn is_cold(&self, key: &str, metadata: &DataMetadata) -> bool {
        let config = *self.config.read();
        if !config.enabled {
            return false;
        }

        if self.bloom.contains(key) {
            if let Some(idle) = self.tracker.idle_time(key) {
                if idle < config.cold_threshold / 2 {
                    return false;
                }
            }
        }

        is_majority(self.votes(key, metadata).len(), self.policies.len())
    }

    /// Names of the policies voting `key` cold
    pub fn votes(&self, key: &str, metadata: &DataMetadata) -> Vec<String> {
        self.policies
            .iter()
            .filter(|p| p.is_cold(key, metadata, &self.tracker))
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Up to `limit` keys that are idle past the threshold and still vote cold
    ///
    /// Keys are scanned longest-idle first; the returned list is then ordered
    /// by cold score, highest first.
    pub fn cold_data_candidates(&self, limit: usize) -> Vec<ColdDataCandidate> {
        let config = *self.config.read();
        if !config.enabled || limit == 0 {
            return Vec::new();
        }

        let mut candidates = Vec::new();

        for key in self.tracker.cold_keys(config.cold_threshold) {
            if candidates.len() >= limit {
                break;
            }

            // Purged by a concurrent cleanup
            let Some(entry) = self.tracker.entry(&key) else {
                continue;
            };

            let metadata = DataMetadata {
                size: entry.size,
                last_accessed: Some(entry.last_access),
                access_count: entry.count,
                ..Default::default()
            };

            if !self.is_cold(&key, &metadata) {
                continue;
            }

            candidates.push(ColdDataCandidate {
                cold_score: self.cold_score(&metadata),
                policies: self.votes(&key, &metadata),
                key,
                last_accessed: metadata.last_accessed,
                access_count: metadata.access_count,
                size: metadata.size,
            });
        }

        candidates.sort_by(|a, b| {
            b.cold_score
                .partial_cmp(&a.cold_score)
                .unwrap_or(Ordering::Equal)
        });

        debug!(count = candidates.len(), limit, "collected cold data candidates");
        candidates
    }

    /// Weighted coldness in `[0, 1]`
    ///
    /// 50% idle time relative to the cold threshold, 30% inverse access
    /// frequency relative to the minimum access count, up to 20% for size
    /// relative to ten times the size threshold.
    pub fn cold_score(&self, metadata: &DataMetadata) -> f64 {
        let config = *self.config.read();
        let now = self.tracker.clock().now();
        let mut score = 0.0;

        score += match metadata.last_accessed {
            Some(last) => {
                let idle = elapsed_between(last, now).as_secs_f64();
                let threshold = config.cold_threshold.as_secs_f64();
                let ratio = if threshold > 0.0 { idle / threshold } else { 1.0 };
                ratio.min(1.0) * TIME_WEIGHT
            }
            None => TIME_WEIGHT,
        };

        score += if metadata.access_count == 0 {
            FREQUENCY_WEIGHT
        } else if config.min_access_count == 0 {
            0.0
        } else {
            let relative = metadata.access_count as f64 / config.min_access_count as f64;
            FREQUENCY_WEIGHT / (1.0 + relative)
        };

        if metadata.size > 0 {
            let ceiling = config.size_threshold.saturating_mul(10);
            score += if ceiling == 0 {
                SIZE_WEIGHT
            } else {
                (metadata.size as f64 / ceiling as f64).min(SIZE_WEIGHT)
            };
        }

        score.clamp(0.0, 1.0)
    }

    /// Purge stale access records and reset the bloom filter
    pub fn cleanup(&self) -> usize {
        let window = self.config.read().access_tracking_window;
        let removed = self.tracker.cleanup(window);
        self.bloom.clear();
        info!(removed, remaining = self.tracker.len(), "cold detector cleanup");
        removed
    }

    /// Copy of the current configuration
    pub fn config(&self) -> ColdDataConfig {
        *self.config.read()
    }

    /// Replace the configuration
    ///
    /// Bloom filter dimensions and the built-in policies' thresholds are
    /// fixed at construction and are not affected.
    pub fn update_config(&self, config: ColdDataConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    /// Underlying access tracker
    pub fn tracker(&self) -> &Arc<AccessTracker> {
        &self.tracker
    }

    /// Underlying bloom filter
    pub fn bloom_filter(&self) -> &BloomFilter {
        &self.bloom
    }

    /// Number of voting policies
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }
}

/// Strict majority; with an even policy count a tie is not cold
fn is_majority(votes: usize, total: usize) -> bool {
    total > 0 && votes > total / 2
}
