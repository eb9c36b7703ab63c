//! Transparent compression at the storage boundary
//!
//! `write` compresses and frames a value when the engine decides to; values
//! the engine leaves alone are returned byte-identical with no header. `read`
//! sniffs for the frame magic and passes anything else through untouched.

mod frame;

pub use frame::{
    is_compressed, AlgorithmId, CompressedData, FrameHeader, FRAME_VERSION, HEADER_SIZE, MAGIC,
};

use crate::cold::AccessTracker;
use crate::engine::{CompressionEngine, EngineConfig, EngineStats, NONE};
use crate::monitor::CompressionMonitor;
use crate::types::elapsed_between;
use crate::{Clock, ColdStoreError, DataMetadata, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparentConfig {
    pub enabled: bool,
    /// Values shorter than this stay raw unless the key has gone cold
    pub min_size: u64,
    pub cold_threshold: Duration,
    pub default_algorithm: String,
    pub compression_level: i32,
    /// Whether cold values should also be queued for background recompression
    pub background_compress: bool,
}

impl Default for TransparentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size: crate::config::MIN_COMPRESS_SIZE,
            cold_threshold: crate::config::COLD_THRESHOLD,
            default_algorithm: crate::engine::LZ4.to_string(),
            compression_level: crate::config::ZSTD_LEVEL,
            background_compress: true,
        }
    }
}

impl TransparentConfig {
    /// Engine configuration matching this codec configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_size: self.min_size,
            cold_threshold: self.cold_threshold,
            default_algorithm: self.default_algorithm.clone(),
            compression_level: self.compression_level,
            ..EngineConfig::default()
        }
    }
}

/// Compress-and-frame on write, sniff-and-decompress on read
#[derive(Debug)]
pub struct TransparentCompression {
    engine: Arc<CompressionEngine>,
    tracker: AccessTracker,
    config: RwLock<TransparentConfig>,
}

impl TransparentCompression {
    /// Codec over a shared engine
    pub fn new(
        engine: Arc<CompressionEngine>,
        config: TransparentConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        validate(&engine, &config)?;
        Ok(Self {
            engine,
            tracker: AccessTracker::new(clock),
            config: RwLock::new(config),
        })
    }

    /// Codec with its own engine built from `config`
    pub fn with_config(
        config: TransparentConfig,
        monitor: Arc<CompressionMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let engine = CompressionEngine::with_config(&config.engine_config(), monitor, clock.clone())?;
        Self::new(Arc::new(engine), config, clock)
    }

    /// Compress `data` for storage under `key`
    ///
    /// Returns the input unchanged when compression is disabled or not
    /// worthwhile, otherwise a complete frame. Uncompressed input that
    /// already starts with the frame magic is wrapped in a `none` frame so
    /// `read` cannot mistake it for a compressed value.
    pub fn write(&self, key: &str, data: &[u8]) -> Result<Vec<u8>> {
        let config = self.config.read().clone();
        if !config.enabled {
            return Ok(data.to_vec());
        }

        let previous = self.tracker.last_access(key);
        self.tracker.record_access_sized(key, data.len() as u64);

        let now = self.tracker.clock().now();
        let idle_past_threshold = previous
            .map(|last| elapsed_between(last, now) > config.cold_threshold)
            .unwrap_or(false);

        if (data.len() as u64) < config.min_size && !idle_past_threshold {
            return Ok(store_raw(key, data));
        }

        let mut metadata = DataMetadata::new(data.len() as u64)
            .with_access_count(self.tracker.access_count(key))
            .with_data_type("binary");
        metadata.last_accessed = previous;

        let (compressed, algorithm) = self.engine.compress(data, Some(&metadata))?;
        if algorithm == NONE {
            return Ok(store_raw(key, data));
        }

        let id = AlgorithmId::from_name(&algorithm)?;
        let frame = CompressedData::new(id, data.len() as u64, compressed.into_owned());

        debug!(
            key,
            algorithm = %algorithm,
            original = data.len(),
            compressed = frame.compressed_size,
            "compressed value"
        );

        Ok(frame.encode().to_vec())
    }

    /// Restore the original bytes of a value read from storage
    pub fn read(&self, key: &str, data: &[u8]) -> Result<Vec<u8>> {
        if !self.config.read().enabled {
            return Ok(data.to_vec());
        }

        self.tracker.record_access(key);

        if !is_compressed(data) {
            return Ok(data.to_vec());
        }

        let frame = CompressedData::decode(data).map_err(|e| {
            warn!(key, error = %e, "rejected malformed frame");
            e
        })?;

        let decompressed = self.engine.decompress(&frame.data, frame.algorithm.name())?;

        if decompressed.len() as u64 != frame.original_size {
            return Err(ColdStoreError::FrameParse(format!(
                "decompressed {} bytes, header declares {}",
                decompressed.len(),
                frame.original_size
            )));
        }

        Ok(decompressed)
    }

    /// Copy of the current configuration
    pub fn config(&self) -> TransparentConfig {
        self.config.read().clone()
    }

    /// Replace the configuration
    ///
    /// Engine policies keep the thresholds they were built with; `min_size`,
    /// `cold_threshold` and `enabled` take effect immediately in the codec.
    pub fn update_config(&self, config: TransparentConfig) -> Result<()> {
        validate(&self.engine, &config)?;
        *self.config.write() = config;
        Ok(())
    }

    /// Engine statistics
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Shared monitor the engine reports into
    pub fn monitor(&self) -> &Arc<CompressionMonitor> {
        self.engine.monitor()
    }

    /// Access bookkeeping for keys seen by this codec
    pub fn tracker(&self) -> &AccessTracker {
        &self.tracker
    }

    pub fn engine(&self) -> &Arc<CompressionEngine> {
        &self.engine
    }
}

fn validate(engine: &CompressionEngine, config: &TransparentConfig) -> Result<()> {
    if engine.algorithm(&config.default_algorithm).is_none() {
        return Err(ColdStoreError::ConfigInvalid(format!(
            "unknown default algorithm: {}",
            config.default_algorithm
        )));
    }
    AlgorithmId::from_name(&config.default_algorithm)
        .map_err(|e| ColdStoreError::ConfigInvalid(e.to_string()))?;
    Ok(())
}

fn store_raw(key: &str, data: &[u8]) -> Vec<u8> {
    if !is_compressed(data) {
        return data.to_vec();
    }
    debug!(key, size = data.len(), "framing raw value that starts with magic");
    CompressedData::new(AlgorithmId::None, data.len() as u64, data.to_vec())
        .encode()
        .to_vec()
}
