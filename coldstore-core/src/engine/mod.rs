//! Compression engine
//!
//! Owns the algorithm registry and the ordered policy list. The first policy
//! whose `should_compress` answers true picks the algorithm; when no policy
//! matches, the input is returned untouched and tagged [`NONE`].

mod algorithm;
mod policy;

pub use algorithm::{
    CompressionAlgorithm, Lz4Algorithm, SnappyAlgorithm, ZstdAlgorithm, LZ4, NONE, SNAPPY, ZSTD,
};
pub use policy::{ColdDataCompressionPolicy, CompressionPolicy, SizeBasedPolicy};

use crate::monitor::CompressionMonitor;
use crate::{Clock, ColdStoreError, DataMetadata, Result, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum size for size-based compression
    pub min_size: u64,
    /// Values at or above this size use the high-ratio algorithm
    pub large_value_threshold: usize,
    /// Idle time after which the cold policy compresses a value
    pub cold_threshold: Duration,
    /// Algorithm used when a policy matches but names none
    pub default_algorithm: String,
    /// Zstd compression level
    pub compression_level: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_size: crate::config::MIN_COMPRESS_SIZE,
            large_value_threshold: crate::config::LARGE_VALUE_THRESHOLD,
            cold_threshold: crate::config::COLD_THRESHOLD,
            default_algorithm: LZ4.to_string(),
            compression_level: crate::config::ZSTD_LEVEL,
        }
    }
}

/// Aggregate engine statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Bytes fed into successful compressions
    pub total_compressed: u64,
    /// Bytes produced by successful decompressions
    pub total_decompressed: u64,
    /// Number of compressions that used a real algorithm
    pub compression_count: u64,
    /// Running average of per-call ratios
    pub compression_ratio: f64,
    pub compression_time: Duration,
    pub decompression_time: Duration,
}

/// Policy-driven compression engine
#[derive(Debug)]
pub struct CompressionEngine {
    algorithms: HashMap<String, Arc<dyn CompressionAlgorithm>>,
    policies: Vec<Box<dyn CompressionPolicy>>,
    default_algorithm: String,
    monitor: Arc<CompressionMonitor>,
    clock: Arc<dyn Clock>,
    stats: Mutex<EngineStats>,
}

impl CompressionEngine {
    /// Create an engine with an empty registry and no policies
    pub fn new(monitor: Arc<CompressionMonitor>, clock: Arc<dyn Clock>) -> Self {
        Self {
            algorithms: HashMap::new(),
            policies: Vec::new(),
            default_algorithm: LZ4.to_string(),
            monitor,
            clock,
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Create an engine with the built-in algorithms and policies
    ///
    /// Registers lz4, snappy and zstd, then the size-based policy followed by
    /// the cold-data policy.
    pub fn with_config(
        config: &EngineConfig,
        monitor: Arc<CompressionMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut engine = Self::new(monitor, clock);
        engine.register_builtins(config);
        engine.set_default_algorithm(&config.default_algorithm)?;
        Ok(engine)
    }

    /// Engine with default configuration and its own monitor
    pub fn with_defaults() -> Self {
        let mut engine = Self::new(Arc::new(CompressionMonitor::new()), Arc::new(SystemClock));
        engine.register_builtins(&EngineConfig::default());
        engine
    }

    fn register_builtins(&mut self, config: &EngineConfig) {
        self.register_algorithm(Lz4Algorithm);
        self.register_algorithm(SnappyAlgorithm);
        self.register_algorithm(ZstdAlgorithm::new(config.compression_level));

        self.add_policy(SizeBasedPolicy {
            min_size: config.min_size,
            large_value_threshold: config.large_value_threshold,
        });
        self.add_policy(ColdDataCompressionPolicy::new(config.cold_threshold));
    }

    /// Register an algorithm under its own name, replacing any previous one
    pub fn register_algorithm<A: CompressionAlgorithm + 'static>(&mut self, algorithm: A) {
        self.algorithms
            .insert(algorithm.name().to_string(), Arc::new(algorithm));
    }

    /// Append a policy; policies are evaluated in registration order
    pub fn add_policy<P: CompressionPolicy + 'static>(&mut self, policy: P) {
        self.policies.push(Box::new(policy));
    }

    /// Set the fallback algorithm, which must already be registered
    pub fn set_default_algorithm(&mut self, name: &str) -> Result<()> {
        if !self.algorithms.contains_key(name) {
            return Err(ColdStoreError::ConfigInvalid(format!(
                "default algorithm '{}' is not registered",
                name
            )));
        }
        self.default_algorithm = name.to_string();
        Ok(())
    }

    /// Compress `data` with the algorithm chosen by the first matching policy
    ///
    /// Returns the input borrowed and tagged [`NONE`] when no policy matches.
    pub fn compress<'a>(
        &self,
        data: &'a [u8],
        metadata: Option<&DataMetadata>,
    ) -> Result<(Cow<'a, [u8]>, String)> {
        let start = Instant::now();
        let now = self.clock.now();

        let selected = self
            .policies
            .iter()
            .find(|p| p.should_compress(data, metadata, now))
            .map(|p| {
                trace!(policy = p.name(), "compression policy matched");
                p.select_algorithm(data, metadata)
                    .unwrap_or(self.default_algorithm.as_str())
                    .to_string()
            });

        let Some(name) = selected else {
            return Ok((Cow::Borrowed(data), NONE.to_string()));
        };

        let algorithm = self.lookup(&name)?;
        let compressed = algorithm.compress(data)?;
        let elapsed = start.elapsed();

        {
            let mut stats = self.stats.lock();
            stats.total_compressed += data.len() as u64;
            stats.compression_time += elapsed;
            if !compressed.is_empty() {
                stats.compression_count += 1;
                let ratio = data.len() as f64 / compressed.len() as f64;
                let n = stats.compression_count as f64;
                stats.compression_ratio = (stats.compression_ratio * (n - 1.0) + ratio) / n;
            }
        }

        self.monitor
            .record_compression(&name, data.len(), compressed.len());
        self.monitor.record_compression_time(&name, elapsed);

        Ok((Cow::Owned(compressed), name))
    }

    /// Decompress `data` with the named algorithm
    pub fn decompress(&self, data: &[u8], algorithm: &str) -> Result<Vec<u8>> {
        if algorithm == NONE {
            return Ok(data.to_vec());
        }

        let start = Instant::now();
        let algo = self.lookup(algorithm)?;
        let decompressed = algo.decompress(data)?;
        let elapsed = start.elapsed();

        {
            let mut stats = self.stats.lock();
            stats.total_decompressed += decompressed.len() as u64;
            stats.decompression_time += elapsed;
        }

        self.monitor
            .record_decompression(algorithm, data.len(), decompressed.len());
        self.monitor.record_decompression_time(algorithm, elapsed);

        Ok(decompressed)
    }

    /// Snapshot of aggregate statistics
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    /// Registered algorithm names, sorted
    pub fn algorithms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.algorithms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a registered algorithm
    pub fn algorithm(&self, name: &str) -> Option<Arc<dyn CompressionAlgorithm>> {
        self.algorithms.get(name).cloned()
    }

    /// Fallback algorithm name
    pub fn default_algorithm(&self) -> &str {
        &self.default_algorithm
    }

    /// Number of registered policies
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Shared monitor this engine reports into
    pub fn monitor(&self) -> &Arc<CompressionMonitor> {
        &self.monitor
    }

    fn lookup(&self, name: &str) -> Result<&Arc<dyn CompressionAlgorithm>> {
        self.algorithms
            .get(name)
            .ok_or_else(|| ColdStoreError::AlgorithmNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::Utc;

    fn engine_with_clock(clock: Arc<ManualClock>) -> CompressionEngine {
        CompressionEngine::with_config(
            &EngineConfig::default(),
            Arc::new(CompressionMonitor::new()),
            clock,
        )
        .unwrap()
    }

    fn pattern(len: usize) -> Vec<u8> {
        b"coldstore-pattern-".iter().copied().cycle().take(len).collect()
    }

    #[test]
    fn test_small_value_not_compressed() {
        let engine = CompressionEngine::with_defaults();
        let data = pattern(512);

        let (out, algo) = engine.compress(&data, None).unwrap();
        assert_eq!(algo, NONE);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, &data[..]);
        assert_eq!(engine.stats().compression_count, 0);
    }

    #[test]
    fn test_size_selects_algorithm() {
        let engine = CompressionEngine::with_defaults();

        let small_data = pattern(2048);
        let (small, algo) = engine.compress(&small_data, None).unwrap();
        assert_eq!(algo, LZ4);
        assert!(small.len() < 2048);

        let large_data = pattern(64 * 1024);
        let (large, algo) = engine.compress(&large_data, None).unwrap();
        assert_eq!(algo, ZSTD);
        assert_eq!(engine.decompress(&large, &algo).unwrap(), large_data);
    }

    #[test]
    fn test_cold_metadata_selects_zstd_for_small_value() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = engine_with_clock(clock.clone());
        let meta = DataMetadata::new(100).with_last_accessed(clock.now());

        clock.advance(crate::config::COLD_THRESHOLD * 2);
        let (_, algo) = engine.compress(&pattern(100), Some(&meta)).unwrap();
        assert_eq!(algo, ZSTD);
    }

    #[test]
    fn test_unknown_algorithm_is_error() {
        let engine = CompressionEngine::with_defaults();
        let err = engine.decompress(b"abc", "brotli").unwrap_err();
        assert!(matches!(err, ColdStoreError::AlgorithmNotFound(name) if name == "brotli"));
    }

    #[test]
    fn test_policy_naming_unregistered_algorithm_fails() {
        #[derive(Debug)]
        struct Always;
        impl CompressionPolicy for Always {
            fn name(&self) -> &str {
                "always"
            }
            fn should_compress(&self, _: &[u8], _: Option<&DataMetadata>, _: chrono::DateTime<Utc>) -> bool {
                true
            }
            fn select_algorithm(&self, _: &[u8], _: Option<&DataMetadata>) -> Option<&str> {
                Some("brotli")
            }
        }

        let mut engine = CompressionEngine::new(
            Arc::new(CompressionMonitor::new()),
            Arc::new(SystemClock),
        );
        engine.register_algorithm(Lz4Algorithm);
        engine.add_policy(Always);
        assert!(matches!(
            engine.compress(b"data", None),
            Err(ColdStoreError::AlgorithmNotFound(_))
        ));
    }

    #[test]
    fn test_empty_selection_uses_default() {
        #[derive(Debug)]
        struct NoPreference;
        impl CompressionPolicy for NoPreference {
            fn name(&self) -> &str {
                "no_preference"
            }
            fn should_compress(&self, _: &[u8], _: Option<&DataMetadata>, _: chrono::DateTime<Utc>) -> bool {
                true
            }
            fn select_algorithm(&self, _: &[u8], _: Option<&DataMetadata>) -> Option<&str> {
                None
            }
        }

        let mut engine = CompressionEngine::new(
            Arc::new(CompressionMonitor::new()),
            Arc::new(SystemClock),
        );
        engine.register_algorithm(Lz4Algorithm);
        engine.register_algorithm(SnappyAlgorithm);
        engine.set_default_algorithm(SNAPPY).unwrap();
        engine.add_policy(NoPreference);

        let (_, algo) = engine.compress(&pattern(64), None).unwrap();
        assert_eq!(algo, SNAPPY);
    }

    #[test]
    fn test_invalid_default_algorithm() {
        let config = EngineConfig {
            default_algorithm: "gzip".into(),
            ..Default::default()
        };
        let result = CompressionEngine::with_config(
            &config,
            Arc::new(CompressionMonitor::new()),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(ColdStoreError::ConfigInvalid(_))));
    }

    #[test]
    fn test_stats_and_monitor_updated() {
        let engine = CompressionEngine::with_defaults();
        let data = pattern(4096);

        let (compressed, algo) = engine.compress(&data, None).unwrap();
        let restored = engine.decompress(&compressed, &algo).unwrap();
        assert_eq!(restored, data);

        let stats = engine.stats();
        assert_eq!(stats.total_compressed, 4096);
        assert_eq!(stats.total_decompressed, 4096);
        assert_eq!(stats.compression_count, 1);
        assert!(stats.compression_ratio > 1.0);

        let lz4 = engine.monitor().algorithm_metrics(LZ4).unwrap();
        assert_eq!(lz4.compression_count, 1);
        assert_eq!(lz4.decompression_count, 1);
        assert_eq!(engine.algorithms(), vec!["lz4", "snappy", "zstd"]);
    }
}
