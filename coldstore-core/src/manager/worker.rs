//! Background compression worker
//!
//! Thread layout:
//!
//! ```text
//!  compress_async ─┐
//!                  ├─> work queue ──> dispatcher ──round robin──> worker queues ──> workers
//!  sweep timer ────┘
//! ```
//!
//! Every queue is bounded. Enqueueing never blocks: a full work queue is
//! reported as [`ColdStoreError::QueueFull`]. Shutdown drops a zero-capacity
//! stop channel, which wakes every thread blocked in `select!`.

use crate::cold::ColdDataDetector;
use crate::engine::{CompressionEngine, NONE};
use crate::{ColdStoreError, DataMetadata, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Output of a background compression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedValue {
    /// Compressed bytes, or the input when `algorithm` is `none`
    pub data: Vec<u8>,
    pub algorithm: String,
    pub original_size: usize,
}

impl CompressedValue {
    pub fn ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.original_size as f64 / self.data.len() as f64
    }
}

/// Invoked once per job with the job's key and outcome
pub type CompressionCallback = Box<dyn FnOnce(&str, Result<CompressedValue>) + Send + 'static>;

/// Storage-layer hook for the periodic cold sweep
///
/// The sweep only knows keys. A handler supplies the stored bytes for a key
/// and receives the recompressed result.
pub trait SweepHandler: Send + Sync {
    /// Current stored bytes for `key`; `None` skips the key
    fn fetch(&self, key: &str) -> Option<Vec<u8>>;

    /// Result of recompressing `key`
    fn on_compressed(&self, key: &str, result: Result<CompressedValue>);
}

pub(crate) type SharedSweepHandler = Arc<RwLock<Option<Arc<dyn SweepHandler>>>>;

/// A queued compression request
pub struct CompressionJob {
    pub key: String,
    pub data: Vec<u8>,
    pub metadata: Option<DataMetadata>,
    pub enqueued_at: Instant,
    callback: Option<CompressionCallback>,
}

impl CompressionJob {
    pub fn new(key: impl Into<String>, data: Vec<u8>, metadata: Option<DataMetadata>) -> Self {
        Self {
            key: key.into(),
            data,
            metadata,
            enqueued_at: Instant::now(),
            callback: None,
        }
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&str, Result<CompressedValue>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for CompressionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionJob")
            .field("key", &self.key)
            .field("len", &self.data.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Worker pool sizing and timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub worker_queue_capacity: usize,
    pub compression_interval: Duration,
    pub max_candidates_per_cycle: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: crate::config::WORK_QUEUE_CAPACITY,
            worker_count: crate::config::WORKER_COUNT,
            worker_queue_capacity: crate::config::WORKER_QUEUE_CAPACITY,
            compression_interval: crate::config::COMPRESSION_INTERVAL,
            max_candidates_per_cycle: crate::config::MAX_CANDIDATES_PER_CYCLE,
        }
    }
}

/// Point-in-time worker counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub running: bool,
    pub queue_depth: usize,
    pub worker_count: usize,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub jobs_rejected: u64,
    pub sweeps: u64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    sweeps: AtomicU64,
}

struct Shared {
    engine: Arc<CompressionEngine>,
    detector: Arc<ColdDataDetector>,
    handler: SharedSweepHandler,
    max_candidates: usize,
    counters: Counters,
}

struct Running {
    // Never sent on; dropping it stops every thread
    stop: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

/// Bounded worker pool with a periodic cold sweep
pub struct BackgroundWorker {
    jobs: Sender<CompressionJob>,
    running: Mutex<Option<Running>>,
    shared: Arc<Shared>,
    worker_count: usize,
}

impl BackgroundWorker {
    /// Spawn the dispatcher, the workers and the sweep timer
    pub(crate) fn start(
        config: WorkerConfig,
        engine: Arc<CompressionEngine>,
        detector: Arc<ColdDataDetector>,
        handler: SharedSweepHandler,
    ) -> Result<Self> {
        if config.worker_count == 0 {
            return Err(ColdStoreError::ConfigInvalid(
                "worker_count must be greater than 0".into(),
            ));
        }
        if config.compression_interval.is_zero() {
            return Err(ColdStoreError::ConfigInvalid(
                "compression_interval must be non-zero".into(),
            ));
        }

        let shared = Arc::new(Shared {
            engine,
            detector,
            handler,
            max_candidates: config.max_candidates_per_cycle,
            counters: Counters::default(),
        });

        let (jobs_tx, jobs_rx) = bounded(config.queue_capacity);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let mut handles = Vec::with_capacity(config.worker_count + 2);
        let mut queues = Vec::with_capacity(config.worker_count);

        for id in 0..config.worker_count {
            let (queue_tx, queue_rx) = bounded(config.worker_queue_capacity);
            queues.push(queue_tx);

            let stop = stop_rx.clone();
            let shared = shared.clone();
            handles.push(spawn(format!("coldstore-worker-{}", id), move || {
                work(id, queue_rx, stop, shared)
            })?);
        }

        let stop = stop_rx.clone();
        handles.push(spawn("coldstore-dispatcher".into(), move || {
            dispatch(jobs_rx, queues, stop)
        })?);

        let stop = stop_rx;
        let sweep_jobs = jobs_tx.clone();
        let sweep_shared = shared.clone();
        let interval = config.compression_interval;
        handles.push(spawn("coldstore-sweeper".into(), move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        sweep(&sweep_shared, &sweep_jobs);
                    }
                    recv(stop) -> _ => break,
                }
            }
        })?);

        info!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            interval_secs = interval.as_secs(),
            "background compression started"
        );

        Ok(Self {
            jobs: jobs_tx,
            running: Mutex::new(Some(Running {
                stop: stop_tx,
                handles,
            })),
            shared,
            worker_count: config.worker_count,
        })
    }

    /// Enqueue a job without blocking
    pub fn submit(&self, job: CompressionJob) -> Result<()> {
        if self.running.lock().is_none() {
            return Err(ColdStoreError::WorkerStopped);
        }

        match self.jobs.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(key = %job.key, "compression queue full");
                Err(ColdStoreError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(ColdStoreError::WorkerStopped),
        }
    }

    /// Run one cold sweep now, returning the number of jobs enqueued
    pub fn sweep_now(&self) -> Result<usize> {
        if self.running.lock().is_none() {
            return Err(ColdStoreError::WorkerStopped);
        }
        Ok(sweep(&self.shared, &self.jobs))
    }

    pub fn stats(&self) -> WorkerStats {
        let counters = &self.shared.counters;
        WorkerStats {
            running: self.is_running(),
            queue_depth: self.jobs.len(),
            worker_count: self.worker_count,
            jobs_processed: counters.processed.load(Ordering::Relaxed),
            jobs_failed: counters.failed.load(Ordering::Relaxed),
            jobs_rejected: counters.rejected.load(Ordering::Relaxed),
            sweeps: counters.sweeps.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Stop all threads and wait for them
    ///
    /// Jobs still queued are dropped without their callbacks running.
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        drop(running.stop);
        for handle in running.handles {
            if handle.join().is_err() {
                error!("background compression thread panicked");
            }
        }

        info!(
            processed = self.shared.counters.processed.load(Ordering::Relaxed),
            "background compression stopped"
        );
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BackgroundWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Periodic task on its own thread, stopped by dropping `stop`
#[derive(Debug)]
pub(crate) struct Timer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Timer {
    pub(crate) fn start<F>(name: &str, interval: Duration, mut task: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = spawn(name.to_string(), move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => task(),
                    recv(stop_rx) -> _ => break,
                }
            }
        })?;
        Ok(Self {
            stop: stop_tx,
            handle,
        })
    }

    pub(crate) fn stop(self) {
        drop(self.stop);
        if self.handle.join().is_err() {
            error!("timer thread panicked");
        }
    }
}

fn spawn<F>(name: String, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new().name(name).spawn(f)?)
}

fn dispatch(jobs: Receiver<CompressionJob>, queues: Vec<Sender<CompressionJob>>, stop: Receiver<()>) {
    let mut next = 0;

    loop {
        let job = select! {
            recv(jobs) -> job => match job {
                Ok(job) => job,
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        };

        let queue = &queues[next];
        next = (next + 1) % queues.len();

        // Blocks while the chosen worker is saturated, which in turn lets the
        // work queue fill up and push back on producers.
        select! {
            send(queue, job) -> res => {
                if res.is_err() {
                    break;
                }
            }
            recv(stop) -> _ => break,
        }
    }

    debug!("dispatcher exiting");
}

fn work(id: usize, queue: Receiver<CompressionJob>, stop: Receiver<()>, shared: Arc<Shared>) {
    loop {
        select! {
            recv(queue) -> job => match job {
                Ok(job) => shared.process(job),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }

    debug!(worker = id, "worker exiting");
}

impl Shared {
    fn process(&self, job: CompressionJob) {
        let CompressionJob {
            key,
            data,
            metadata,
            enqueued_at,
            callback,
        } = job;

        let start = Instant::now();
        let result = self
            .engine
            .compress(&data, metadata.as_ref())
            .map(|(out, algorithm)| CompressedValue {
                data: out.into_owned(),
                algorithm,
                original_size: data.len(),
            });
        let elapsed = start.elapsed();

        match &result {
            Ok(value) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                if value.algorithm != NONE {
                    self.engine
                        .monitor()
                        .record_background_job(&value.algorithm, elapsed);
                }
                debug!(
                    key = %key,
                    algorithm = %value.algorithm,
                    queued_ms = enqueued_at.elapsed().as_millis() as u64,
                    "background compression done"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "background compression failed");
            }
        }

        if let Some(callback) = callback {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&key, result))).is_err() {
                error!(key = %key, "compression callback panicked");
            }
        }
    }
}

/// Queue jobs for the current cold candidates, stopping at the first full
/// queue
///
/// Without a sweep handler there are no stored bytes to recompress, so the
/// candidates are only logged.
fn sweep(shared: &Arc<Shared>, jobs: &Sender<CompressionJob>) -> usize {
    shared.counters.sweeps.fetch_add(1, Ordering::Relaxed);

    let candidates = shared.detector.cold_data_candidates(shared.max_candidates);
    let total = candidates.len();

    let handler = shared.handler.read().clone();
    let Some(handler) = handler else {
        if total > 0 {
            info!(total, "cold sweep skipped, no sweep handler installed");
        }
        return 0;
    };

    let mut enqueued = 0;
    for candidate in candidates {
        let Some(data) = handler.fetch(&candidate.key) else {
            continue;
        };

        let metadata = DataMetadata {
            size: candidate.size,
            last_accessed: candidate.last_accessed,
            access_count: candidate.access_count,
            ..Default::default()
        };

        let callback_handler = Arc::clone(&handler);
        let job = CompressionJob::new(candidate.key, data, Some(metadata))
            .with_callback(move |key, result| callback_handler.on_compressed(key, result));

        if jobs.try_send(job).is_err() {
            shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(enqueued, total, "compression queue full, abandoning sweep");
            break;
        }
        enqueued += 1;
    }

    if total > 0 {
        info!(enqueued, total, "cold sweep");
    }
    enqueued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cold::ColdDataConfig;
    use crate::engine::{CompressionAlgorithm, CompressionPolicy};
    use crate::monitor::CompressionMonitor;
    use crate::{Clock, ManualClock};
    use chrono::{DateTime, Utc};
    use crossbeam_channel::unbounded;

    const WAIT: Duration = Duration::from_secs(5);

    fn engine() -> Arc<CompressionEngine> {
        Arc::new(CompressionEngine::with_defaults())
    }

    fn detector(clock: Arc<ManualClock>) -> Arc<ColdDataDetector> {
        let config = ColdDataConfig {
            bloom_filter_size: 4096,
            ..Default::default()
        };
        Arc::new(ColdDataDetector::new(config, clock).unwrap())
    }

    fn start(config: WorkerConfig, engine: Arc<CompressionEngine>) -> BackgroundWorker {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        BackgroundWorker::start(config, engine, detector(clock), Default::default()).unwrap()
    }

    fn slow_config() -> WorkerConfig {
        WorkerConfig {
            compression_interval: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    #[test]
    fn test_job_callback_receives_result() {
        let worker = start(slow_config(), engine());
        let (tx, rx) = unbounded();

        let data = vec![b'a'; 4096];
        let job = CompressionJob::new("k", data.clone(), None).with_callback(move |key, result| {
            tx.send((key.to_string(), result)).unwrap();
        });
        worker.submit(job).unwrap();

        let (key, result) = rx.recv_timeout(WAIT).unwrap();
        let value = result.unwrap();
        assert_eq!(key, "k");
        assert_eq!(value.algorithm, "lz4");
        assert_eq!(value.original_size, 4096);
        assert!(value.data.len() < data.len());

        worker.shutdown();
        let stats = worker.stats();
        assert_eq!(stats.jobs_processed, 1);
        assert_eq!(stats.jobs_failed, 0);

        let metrics = worker.shared.engine.monitor().algorithm_metrics("lz4").unwrap();
        assert_eq!(metrics.background_job_count, 1);
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let config = WorkerConfig {
            queue_capacity: 2,
            worker_count: 1,
            worker_queue_capacity: 1,
            ..slow_config()
        };
        let worker = start(config, engine());

        let (gate_tx, gate_rx) = bounded::<()>(0);
        let blocker = CompressionJob::new("blocker", vec![0; 16], None).with_callback(move |_, _| {
            let _ = gate_rx.recv();
        });
        worker.submit(blocker).unwrap();

        // One job in the worker, one in its queue, one held by the dispatcher
        // and two in the work queue is the most the pool can absorb.
        let start = Instant::now();
        let mut rejected = None;
        for i in 0..10 {
            match worker.submit(CompressionJob::new(format!("k{}", i), vec![0; 16], None)) {
                Ok(()) => {}
                Err(e) => {
                    rejected = Some(e);
                    break;
                }
            }
        }
        assert!(matches!(rejected, Some(ColdStoreError::QueueFull)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(worker.stats().jobs_rejected >= 1);

        drop(gate_tx);
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let worker = start(slow_config(), engine());
        assert!(worker.is_running());

        worker.shutdown();
        worker.shutdown();

        assert!(!worker.is_running());
        assert!(matches!(
            worker.submit(CompressionJob::new("k", vec![1], None)),
            Err(ColdStoreError::WorkerStopped)
        ));
        assert!(worker.sweep_now().is_err());
    }

    #[derive(Debug)]
    struct Broken;

    impl CompressionAlgorithm for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn compress(&self, _: &[u8]) -> Result<Vec<u8>> {
            Err(ColdStoreError::compression("broken", "always fails"))
        }
        fn decompress(&self, _: &[u8]) -> Result<Vec<u8>> {
            Err(ColdStoreError::compression("broken", "always fails"))
        }
        fn typical_ratio(&self) -> f64 {
            1.0
        }
    }

    #[derive(Debug)]
    struct AlwaysBroken;

    impl CompressionPolicy for AlwaysBroken {
        fn name(&self) -> &str {
            "always_broken"
        }
        fn should_compress(&self, _: &[u8], _: Option<&DataMetadata>, _: DateTime<Utc>) -> bool {
            true
        }
        fn select_algorithm(&self, _: &[u8], _: Option<&DataMetadata>) -> Option<&str> {
            Some("broken")
        }
    }

    #[test]
    fn test_failed_jobs_reach_callback_and_pool_survives() {
        let mut engine =
            CompressionEngine::new(Arc::new(CompressionMonitor::new()), Arc::new(crate::SystemClock));
        engine.register_algorithm(Broken);
        engine.add_policy(AlwaysBroken);
        let config = WorkerConfig {
            worker_count: 1,
            ..slow_config()
        };
        let worker = start(config, Arc::new(engine));

        let (tx, rx) = unbounded();
        for i in 0..3 {
            let tx = tx.clone();
            let job = CompressionJob::new(format!("k{}", i), vec![1; 8], None)
                .with_callback(move |_, result| tx.send(result.is_err()).unwrap());
            worker.submit(job).unwrap();
        }

        for _ in 0..3 {
            assert!(rx.recv_timeout(WAIT).unwrap());
        }

        // A panicking callback does not take the worker down
        let job = CompressionJob::new("panic", vec![1; 8], None)
            .with_callback(|_, _| panic!("callback bug"));
        worker.submit(job).unwrap();

        let tx2 = tx.clone();
        let job = CompressionJob::new("after", vec![1; 8], None)
            .with_callback(move |_, result| tx2.send(result.is_err()).unwrap());
        worker.submit(job).unwrap();
        assert!(rx.recv_timeout(WAIT).unwrap());

        worker.shutdown();
        assert_eq!(worker.stats().jobs_failed, 5);
        assert_eq!(worker.stats().jobs_processed, 0);
    }

    struct Store {
        results: Sender<(String, CompressedValue)>,
    }

    impl SweepHandler for Store {
        fn fetch(&self, key: &str) -> Option<Vec<u8>> {
            if key == "missing" {
                return None;
            }
            Some(key.repeat(500).into_bytes())
        }

        fn on_compressed(&self, key: &str, result: Result<CompressedValue>) {
            self.results.send((key.to_string(), result.unwrap())).unwrap();
        }
    }

    #[test]
    fn test_sweep_compresses_cold_keys_through_handler() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let detector = detector(clock.clone());
        for key in ["alpha", "beta", "missing"] {
            detector.record_access(key, 4096);
        }
        clock.advance(crate::config::COLD_THRESHOLD * 2);

        let (tx, rx) = unbounded();
        let store: Arc<dyn SweepHandler> = Arc::new(Store { results: tx });
        let handler: SharedSweepHandler = Arc::new(RwLock::new(Some(store)));
        let worker = BackgroundWorker::start(slow_config(), engine(), detector, handler).unwrap();

        assert_eq!(worker.sweep_now().unwrap(), 2);

        let mut seen = Vec::new();
        for _ in 0..2 {
            let (key, value) = rx.recv_timeout(WAIT).unwrap();
            assert_eq!(value.original_size, key.len() * 500);
            assert_ne!(value.algorithm, NONE);
            seen.push(key);
        }
        seen.sort();
        assert_eq!(seen, vec!["alpha", "beta"]);
        assert_eq!(worker.stats().sweeps, 1);
    }

    struct Payload;

    impl SweepHandler for Payload {
        fn fetch(&self, _key: &str) -> Option<Vec<u8>> {
            Some(vec![b'x'; 4096])
        }

        fn on_compressed(&self, _key: &str, _result: Result<CompressedValue>) {}
    }

    #[test]
    fn test_sweep_without_handler_leaves_monitor_untouched() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let detector = detector(clock.clone());
        detector.record_access("alpha", 4096);
        detector.record_access("beta", 8192);
        clock.advance(crate::config::COLD_THRESHOLD * 2);

        let engine = engine();
        let worker = BackgroundWorker::start(
            slow_config(),
            engine.clone(),
            detector,
            Default::default(),
        )
        .unwrap();

        assert_eq!(worker.sweep_now().unwrap(), 0);
        worker.shutdown();

        let stats = worker.stats();
        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.jobs_processed, 0);
        assert_eq!(engine.monitor().metrics().total_compressions, 0);
    }

    #[test]
    fn test_sweep_abandons_on_full_queue() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let detector = detector(clock.clone());
        for i in 0..20 {
            detector.record_access(&format!("key-{}", i), 4096);
        }
        clock.advance(crate::config::COLD_THRESHOLD * 2);
        assert!(clock.now() > Utc::now());

        let config = WorkerConfig {
            queue_capacity: 2,
            worker_count: 1,
            worker_queue_capacity: 1,
            ..slow_config()
        };
        let payload: Arc<dyn SweepHandler> = Arc::new(Payload);
        let handler: SharedSweepHandler = Arc::new(RwLock::new(Some(payload)));
        let worker = BackgroundWorker::start(config, engine(), detector, handler).unwrap();

        let (gate_tx, gate_rx) = bounded::<()>(0);
        let blocker = CompressionJob::new("blocker", vec![0; 16], None).with_callback(move |_, _| {
            let _ = gate_rx.recv();
        });
        worker.submit(blocker).unwrap();

        let enqueued = worker.sweep_now().unwrap();
        assert!(enqueued < 20);
        assert!(worker.stats().jobs_rejected >= 1);

        drop(gate_tx);
        worker.shutdown();
    }

    #[test]
    fn test_invalid_worker_config() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = WorkerConfig {
            worker_count: 0,
            ..slow_config()
        };
        assert!(matches!(
            BackgroundWorker::start(config, engine(), detector(clock), Default::default()),
            Err(ColdStoreError::ConfigInvalid(_))
        ));
    }
}
