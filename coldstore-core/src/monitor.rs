//! Per-algorithm compression counters
//!
//! The monitor is shared between the compression engine (writer) and the
//! reporting side (reader). Reads never fail: an algorithm that has never
//! been used simply does not appear in the snapshot.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const MB: f64 = 1024.0 * 1024.0;

/// Running totals for one algorithm
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmMetrics {
    pub compression_count: u64,
    pub decompression_count: u64,
    /// Bytes fed into compression
    pub total_input_bytes: u64,
    /// Bytes produced by compression
    pub total_output_bytes: u64,
    /// Bytes produced by decompression
    pub total_decompressed_bytes: u64,
    pub total_compression_time: Duration,
    pub total_decompression_time: Duration,
    /// Mean of per-call compression ratios
    pub average_ratio: f64,
    /// Jobs completed by the background worker
    pub background_job_count: u64,
    /// End-to-end time spent in background jobs
    pub total_background_time: Duration,
}

impl AlgorithmMetrics {
    /// Average latency of a single compression call
    pub fn average_compression_latency(&self) -> Duration {
        average(self.total_compression_time, self.compression_count)
    }

    /// Average latency of a single decompression call
    pub fn average_decompression_latency(&self) -> Duration {
        average(self.total_decompression_time, self.decompression_count)
    }

    /// Compression throughput in MB/s
    pub fn compression_throughput(&self) -> f64 {
        rate_mb_per_sec(self.total_input_bytes, self.total_compression_time)
    }
}

/// Immutable snapshot of the whole monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionMetrics {
    pub algorithms: BTreeMap<String, AlgorithmMetrics>,
    pub total_compressions: u64,
    pub total_decompressions: u64,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
    pub total_decompressed_bytes: u64,
    pub total_compression_time: Duration,
    pub total_decompression_time: Duration,
    /// `total_input_bytes / total_output_bytes`, 0 when nothing was compressed
    pub overall_ratio: f64,
    #[serde(rename = "compression_rate_mb_per_sec")]
    pub compression_rate: f64,
    #[serde(rename = "decompression_rate_mb_per_sec")]
    pub decompression_rate: f64,
}

/// Tracks compression metrics per algorithm name
#[derive(Debug, Default)]
pub struct CompressionMonitor {
    metrics: RwLock<HashMap<String, AlgorithmMetrics>>,
}

impl CompressionMonitor {
    /// Create an empty monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one compression call
    pub fn record_compression(&self, algorithm: &str, input_size: usize, output_size: usize) {
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(algorithm.to_string()).or_default();

        entry.compression_count += 1;
        entry.total_input_bytes += input_size as u64;
        entry.total_output_bytes += output_size as u64;

        if output_size > 0 {
            let ratio = input_size as f64 / output_size as f64;
            let n = entry.compression_count as f64;
            entry.average_ratio = (entry.average_ratio * (n - 1.0) + ratio) / n;
        }
    }

    /// Record one decompression call
    pub fn record_decompression(&self, algorithm: &str, _input_size: usize, output_size: usize) {
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(algorithm.to_string()).or_default();
        entry.decompression_count += 1;
        entry.total_decompressed_bytes += output_size as u64;
    }

    /// Add to the cumulative compression time
    pub fn record_compression_time(&self, algorithm: &str, duration: Duration) {
        let mut metrics = self.metrics.write();
        metrics.entry(algorithm.to_string()).or_default().total_compression_time += duration;
    }

    /// Add to the cumulative decompression time
    pub fn record_decompression_time(&self, algorithm: &str, duration: Duration) {
        let mut metrics = self.metrics.write();
        metrics.entry(algorithm.to_string()).or_default().total_decompression_time += duration;
    }

    /// Record a finished background compression job
    pub fn record_background_job(&self, algorithm: &str, duration: Duration) {
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(algorithm.to_string()).or_default();
        entry.background_job_count += 1;
        entry.total_background_time += duration;
    }

    /// Take a consistent snapshot of all counters
    pub fn metrics(&self) -> CompressionMetrics {
        let metrics = self.metrics.read();
        let mut result = CompressionMetrics::default();

        for (name, m) in metrics.iter() {
            result.total_compressions += m.compression_count;
            result.total_decompressions += m.decompression_count;
            result.total_input_bytes += m.total_input_bytes;
            result.total_output_bytes += m.total_output_bytes;
            result.total_decompressed_bytes += m.total_decompressed_bytes;
            result.total_compression_time += m.total_compression_time;
            result.total_decompression_time += m.total_decompression_time;
            result.algorithms.insert(name.clone(), m.clone());
        }
        drop(metrics);

        if result.total_output_bytes > 0 {
            result.overall_ratio =
                result.total_input_bytes as f64 / result.total_output_bytes as f64;
        }
        result.compression_rate =
            rate_mb_per_sec(result.total_input_bytes, result.total_compression_time);
        result.decompression_rate =
            rate_mb_per_sec(result.total_decompressed_bytes, result.total_decompression_time);

        result
    }

    /// Metrics for a single algorithm
    pub fn algorithm_metrics(&self, algorithm: &str) -> Option<AlgorithmMetrics> {
        self.metrics.read().get(algorithm).cloned()
    }

    /// Overall compression ratio
    pub fn compression_ratio(&self) -> f64 {
        self.metrics().overall_ratio
    }

    /// Compression and decompression throughput in MB/s
    pub fn throughput(&self) -> (f64, f64) {
        let m = self.metrics();
        (m.compression_rate, m.decompression_rate)
    }

    /// Clear all counters
    pub fn reset(&self) {
        self.metrics.write().clear();
    }
}

fn rate_mb_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MB / secs
    } else {
        0.0
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(total.as_secs_f64() / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_zeroed() {
        let monitor = CompressionMonitor::new();
        let m = monitor.metrics();
        assert!(m.algorithms.is_empty());
        assert_eq!(m.overall_ratio, 0.0);
        assert_eq!(m.compression_rate, 0.0);
        assert_eq!(m.decompression_rate, 0.0);
        assert!(monitor.algorithm_metrics("lz4").is_none());
    }

    #[test]
    fn test_running_average_ratio() {
        let monitor = CompressionMonitor::new();
        monitor.record_compression("lz4", 1000, 500); // 2.0
        monitor.record_compression("lz4", 1000, 250); // 4.0
        monitor.record_compression("lz4", 1000, 1000); // 1.0

        let lz4 = monitor.algorithm_metrics("lz4").unwrap();
        assert_eq!(lz4.compression_count, 3);
        assert!((lz4.average_ratio - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(lz4.total_input_bytes, 3000);
        assert_eq!(lz4.total_output_bytes, 1750);
    }

    #[test]
    fn test_overall_ratio_and_rates() {
        let monitor = CompressionMonitor::new();
        monitor.record_compression("zstd", 4 * 1024 * 1024, 1024 * 1024);
        monitor.record_compression_time("zstd", Duration::from_secs(2));
        monitor.record_decompression("zstd", 1024 * 1024, 4 * 1024 * 1024);
        monitor.record_decompression_time("zstd", Duration::from_secs(1));

        let m = monitor.metrics();
        assert!((m.overall_ratio - 4.0).abs() < 1e-9);
        assert!((m.compression_rate - 2.0).abs() < 1e-9);
        assert!((m.decompression_rate - 4.0).abs() < 1e-9);
        assert_eq!(monitor.throughput(), (m.compression_rate, m.decompression_rate));
    }

    #[test]
    fn test_background_jobs_tracked_separately() {
        let monitor = CompressionMonitor::new();
        monitor.record_background_job("zstd", Duration::from_millis(20));
        monitor.record_background_job("zstd", Duration::from_millis(30));

        let zstd = monitor.algorithm_metrics("zstd").unwrap();
        assert_eq!(zstd.background_job_count, 2);
        assert_eq!(zstd.total_background_time, Duration::from_millis(50));
        assert_eq!(zstd.compression_count, 0);
    }

    #[test]
    fn test_reset() {
        let monitor = CompressionMonitor::new();
        monitor.record_compression("snappy", 10, 5);
        monitor.reset();
        assert!(monitor.metrics().algorithms.is_empty());
    }
}
