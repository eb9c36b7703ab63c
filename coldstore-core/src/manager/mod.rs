//! Compression manager
//!
//! Single entry point for the storage layer. Owns the engine, the cold data
//! detector, the transparent codec and, when enabled, the background worker
//! and the detector maintenance timer. Nothing here is global: every timer
//! and thread belongs to one manager and stops with it.

mod worker;

pub use worker::{
    BackgroundWorker, CompressedValue, CompressionCallback, CompressionJob, SweepHandler,
    WorkerConfig, WorkerStats,
};

use crate::cold::{ColdDataConfig, ColdDataDetector};
use crate::engine::{CompressionEngine, EngineConfig, EngineStats};
use crate::monitor::{CompressionMetrics, CompressionMonitor};
use crate::transparent::{is_compressed, FrameHeader, TransparentCompression, TransparentConfig};
use crate::{Clock, ColdDataCandidate, ColdStoreError, DataMetadata, Result, SystemClock};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use worker::{SharedSweepHandler, Timer};

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub enabled: bool,
    /// Start the worker pool and the periodic cold sweep
    pub background_compression: bool,
    pub compression_interval: Duration,
    pub max_candidates_per_cycle: usize,
    /// Minimum value size for compression, shared by codec and detector
    pub compression_threshold: u64,
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub worker_queue_capacity: usize,
    pub cold: ColdDataConfig,
    pub engine: EngineConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            background_compression: true,
            compression_interval: crate::config::COMPRESSION_INTERVAL,
            max_candidates_per_cycle: crate::config::MAX_CANDIDATES_PER_CYCLE,
            compression_threshold: crate::config::MIN_COMPRESS_SIZE,
            queue_capacity: crate::config::WORK_QUEUE_CAPACITY,
            worker_count: crate::config::WORKER_COUNT,
            worker_queue_capacity: crate::config::WORKER_QUEUE_CAPACITY,
            cold: ColdDataConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ManagerConfig {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queue_capacity: self.queue_capacity,
            worker_count: self.worker_count,
            worker_queue_capacity: self.worker_queue_capacity,
            compression_interval: self.compression_interval,
            max_candidates_per_cycle: self.max_candidates_per_cycle,
        }
    }

    /// Engine settings with the size policy floor taken from
    /// `compression_threshold`
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_size: self.compression_threshold,
            ..self.engine.clone()
        }
    }

    fn transparent_config(&self) -> TransparentConfig {
        TransparentConfig {
            enabled: self.enabled,
            min_size: self.compression_threshold,
            cold_threshold: self.engine.cold_threshold,
            default_algorithm: self.engine.default_algorithm.clone(),
            compression_level: self.engine.compression_level,
            background_compress: self.background_compression,
        }
    }

    fn cold_config(&self) -> ColdDataConfig {
        ColdDataConfig {
            enabled: self.enabled && self.cold.enabled,
            size_threshold: self.compression_threshold,
            ..self.cold
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.background_compression {
            if self.worker_count == 0 {
                return Err(ColdStoreError::ConfigInvalid(
                    "worker_count must be greater than 0".into(),
                ));
            }
            if self.compression_interval.is_zero() {
                return Err(ColdStoreError::ConfigInvalid(
                    "compression_interval must be non-zero".into(),
                ));
            }
        }
        self.cold_config().validate()
    }
}

/// Detector settings included in [`ManagerStats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdDetectionSummary {
    pub enabled: bool,
    pub cold_threshold: Duration,
    pub size_threshold: u64,
    pub tracked_keys: usize,
}

/// Combined statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStats {
    pub engine: EngineStats,
    pub metrics: CompressionMetrics,
    pub cold_detection: ColdDetectionSummary,
    /// `None` when background compression is not running
    pub background_worker: Option<WorkerStats>,
}

/// Storage-facing compression facade
pub struct CompressionManager {
    engine: Arc<CompressionEngine>,
    detector: Arc<ColdDataDetector>,
    transparent: TransparentCompression,
    worker: Option<BackgroundWorker>,
    maintenance: Mutex<Option<Timer>>,
    sweep_handler: SharedSweepHandler,
    config: RwLock<ManagerConfig>,
}

impl CompressionManager {
    /// Create a manager with a fresh monitor and the system clock
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(CompressionMonitor::new()), Arc::new(SystemClock))
    }

    /// Create a manager reporting into `monitor` and reading time from `clock`
    pub fn with_parts(
        config: ManagerConfig,
        monitor: Arc<CompressionMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let engine = Arc::new(CompressionEngine::with_config(
            &config.engine_config(),
            monitor,
            clock.clone(),
        )?);
        let detector = Arc::new(ColdDataDetector::new(config.cold_config(), clock.clone())?);
        let transparent =
            TransparentCompression::new(engine.clone(), config.transparent_config(), clock)?;
        let sweep_handler = SharedSweepHandler::default();

        let mut maintenance = None;
        let mut worker = None;

        if config.enabled {
            let cleanup_detector = detector.clone();
            maintenance = Some(Timer::start(
                "coldstore-maintenance",
                config.cold.cleanup_interval,
                move || {
                    cleanup_detector.cleanup();
                },
            )?);

            if config.background_compression {
                worker = Some(BackgroundWorker::start(
                    config.worker_config(),
                    engine.clone(),
                    detector.clone(),
                    sweep_handler.clone(),
                )?);
            }
        }

        info!(
            enabled = config.enabled,
            background = worker.is_some(),
            algorithms = ?engine.algorithms(),
            "compression manager started"
        );

        Ok(Self {
            engine,
            detector,
            transparent,
            worker,
            maintenance: Mutex::new(maintenance),
            sweep_handler,
            config: RwLock::new(config),
        })
    }

    /// Prepare `data` for storage under `key`
    pub fn write(&self, key: &str, data: &[u8]) -> Result<Vec<u8>> {
        if !self.config.read().enabled {
            return Ok(data.to_vec());
        }

        self.detector.record_access(key, data.len() as u64);
        self.transparent.write(key, data)
    }

    /// Restore a value read from storage under `key`
    pub fn read(&self, key: &str, data: &[u8]) -> Result<Vec<u8>> {
        if !self.config.read().enabled {
            return Ok(data.to_vec());
        }

        self.detector.record_access(key, stored_value_size(data));
        self.transparent.read(key, data)
    }

    /// Queue `data` for background compression
    ///
    /// Never blocks. Returns [`ColdStoreError::QueueFull`] when the work
    /// queue is at capacity and [`ColdStoreError::WorkerStopped`] when
    /// background compression is disabled or shut down.
    pub fn compress_async<F>(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: Option<DataMetadata>,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(&str, Result<CompressedValue>) + Send + 'static,
    {
        if !self.config.read().enabled {
            return Err(ColdStoreError::WorkerStopped);
        }
        let worker = self.worker.as_ref().ok_or(ColdStoreError::WorkerStopped)?;
        worker.submit(CompressionJob::new(key, data, metadata).with_callback(callback))
    }

    /// Run a cold sweep immediately instead of waiting for the timer
    pub fn trigger_sweep(&self) -> Result<usize> {
        let worker = self.worker.as_ref().ok_or(ColdStoreError::WorkerStopped)?;
        worker.sweep_now()
    }

    /// Install the storage hook used by cold sweeps
    pub fn set_sweep_handler(&self, handler: Arc<dyn SweepHandler>) {
        *self.sweep_handler.write() = Some(handler);
    }

    pub fn stats(&self) -> ManagerStats {
        let cold = self.detector.config();
        ManagerStats {
            engine: self.engine.stats(),
            metrics: self.engine.monitor().metrics(),
            cold_detection: ColdDetectionSummary {
                enabled: cold.enabled,
                cold_threshold: cold.cold_threshold,
                size_threshold: cold.size_threshold,
                tracked_keys: self.detector.tracker().len(),
            },
            background_worker: self
                .worker
                .as_ref()
                .filter(|w| w.is_running())
                .map(|w| w.stats()),
        }
    }

    /// Current cold data candidates, highest score first
    pub fn cold_data_candidates(&self, limit: usize) -> Vec<ColdDataCandidate> {
        self.detector.cold_data_candidates(limit)
    }

    /// Apply a new configuration
    ///
    /// The enable switch, compression threshold and detector settings take
    /// effect immediately. Worker pool sizing, timers and engine policies are
    /// fixed for the lifetime of the manager.
    pub fn update_config(&self, config: ManagerConfig) -> Result<()> {
        config.validate()?;

        let mut transparent = self.transparent.config();
        transparent.enabled = config.enabled;
        transparent.min_size = config.compression_threshold;
        transparent.background_compress = config.background_compression;
        self.transparent.update_config(transparent)?;

        let mut cold = config.cold_config();
        let current = self.detector.config();
        cold.bloom_filter_size = current.bloom_filter_size;
        cold.bloom_filter_hash_count = current.bloom_filter_hash_count;
        self.detector.update_config(cold)?;

        let mut current = self.config.write();
        if current.worker_config() != config.worker_config() {
            warn!("worker pool settings change on restart only");
        }
        if config.compression_threshold < current.compression_threshold {
            warn!(
                threshold = config.compression_threshold,
                "engine size policy keeps its construction-time floor until restart"
            );
        }
        *current = config;
        Ok(())
    }

    pub fn config(&self) -> ManagerConfig {
        self.config.read().clone()
    }

    /// Monitor shared by the engine and any reporter
    pub fn monitor(&self) -> &Arc<CompressionMonitor> {
        self.engine.monitor()
    }

    pub fn engine(&self) -> &Arc<CompressionEngine> {
        &self.engine
    }

    pub fn detector(&self) -> &Arc<ColdDataDetector> {
        &self.detector
    }

    pub fn transparent(&self) -> &TransparentCompression {
        &self.transparent
    }

    /// Stop background threads and wait for them
    ///
    /// Idempotent. Foreground `write`/`read` keep working afterwards.
    pub fn shutdown(&self) {
        if let Some(worker) = &self.worker {
            worker.shutdown();
        }
        if let Some(timer) = self.maintenance.lock().take() {
            timer.stop();
            info!("compression manager stopped");
        }
    }
}

/// Size of the value behind `data`, reading the header of framed values
fn stored_value_size(data: &[u8]) -> u64 {
    if is_compressed(data) {
        if let Ok(header) = FrameHeader::parse(data) {
            return header.original_size;
        }
    }
    data.len() as u64
}

impl Drop for CompressionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CompressionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionManager")
            .field("config", &*self.config.read())
            .field("engine", &self.engine)
            .field("worker", &self.worker)
            .finish()
    }
}
