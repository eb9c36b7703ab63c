//! Metrics collection, alerting and recommendations
//!
//! The collector keeps a fixed set of named series, a global accumulator
//! refreshed from [`CompressionMonitor`] snapshots, and the alert
//! thresholds. Each lives behind its own lock and no method holds two of
//! them at once.

mod alerts;
mod series;

pub use alerts::{AlertLevel, AlertThresholds, CompressionAlert};
pub use series::{Aggregates, MetricDataPoint, MetricSeries};

use crate::monitor::{AlgorithmMetrics, CompressionMetrics, CompressionMonitor};
use crate::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const COMPRESSION_RATIO: &str = "compression_ratio";
pub const COMPRESSION_LATENCY: &str = "compression_latency";
pub const DECOMPRESSION_LATENCY: &str = "decompression_latency";
pub const COMPRESSION_THROUGHPUT: &str = "compression_throughput";
pub const DECOMPRESSION_THROUGHPUT: &str = "decompression_throughput";
pub const CPU_OVERHEAD: &str = "cpu_overhead";
pub const MEMORY_OVERHEAD: &str = "memory_overhead";
pub const STORAGE_SAVINGS: &str = "storage_savings";
pub const COMPRESSION_EFFICIENCY: &str = "compression_efficiency";

/// Every series the collector knows, with its unit
pub const SERIES: [(&str, &str); 9] = [
    (COMPRESSION_RATIO, "ratio"),
    (COMPRESSION_LATENCY, "milliseconds"),
    (DECOMPRESSION_LATENCY, "milliseconds"),
    (COMPRESSION_THROUGHPUT, "mbps"),
    (DECOMPRESSION_THROUGHPUT, "mbps"),
    (CPU_OVERHEAD, "percent"),
    (MEMORY_OVERHEAD, "bytes"),
    (STORAGE_SAVINGS, "bytes"),
    (COMPRESSION_EFFICIENCY, "percent"),
];

/// Whole-system accumulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    /// Bytes in through compression plus bytes out of decompression
    pub total_data_processed: u64,
    /// Bytes fed into compression
    pub total_data_compressed: u64,
    /// Bytes produced by decompression
    pub total_data_decompressed: u64,
    pub average_compression_ratio: f64,
    /// Savings as a percentage of compressed input
    pub compression_efficiency: f64,
    /// Compressed input minus compressed output
    pub storage_savings: u64,
    /// Percent, reported externally
    pub cpu_overhead: f64,
    /// Bytes, reported externally
    pub memory_overhead: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub average_compression_latency: Duration,
    pub average_decompression_latency: Duration,
    #[serde(rename = "compression_throughput_mbps")]
    pub compression_throughput: f64,
    #[serde(rename = "decompression_throughput_mbps")]
    pub decompression_throughput: f64,
    pub cpu_utilization: f64,
    pub memory_utilization: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageMetrics {
    /// Bytes currently occupied by compressed output
    pub total_storage_used: u64,
    pub compressed_storage_used: u64,
    /// Bytes the same data would occupy uncompressed
    pub uncompressed_storage_used: u64,
    pub storage_savings_bytes: u64,
    pub storage_savings_percent: f64,
    pub compression_ratio: f64,
}

/// Full report produced by [`MetricsCollector::generate_report`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    pub timestamp: DateTime<Utc>,
    pub global_metrics: GlobalMetrics,
    pub algorithm_metrics: BTreeMap<String, AlgorithmMetrics>,
    pub performance_metrics: PerformanceMetrics,
    pub storage_metrics: StorageMetrics,
    pub alerts: Vec<CompressionAlert>,
    pub recommendations: Vec<String>,
}

/// Called with every generated report
pub type ReportCallback = Arc<dyn Fn(&CompressionReport) + Send + Sync>;

/// Time series, global metrics and alerting
pub struct MetricsCollector {
    series: RwLock<HashMap<String, MetricSeries>>,
    global: RwLock<GlobalMetrics>,
    thresholds: RwLock<AlertThresholds>,
    callbacks: RwLock<Vec<ReportCallback>>,
}

impl MetricsCollector {
    pub fn new(thresholds: AlertThresholds) -> Self {
        let series = SERIES
            .iter()
            .map(|(name, unit)| (name.to_string(), MetricSeries::new(*name, *unit)))
            .collect();

        Self {
            series: RwLock::new(series),
            global: RwLock::new(GlobalMetrics::default()),
            thresholds: RwLock::new(thresholds),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Append a sample to a known series; unknown names are ignored
    pub fn record(&self, name: &str, value: f64) {
        self.record_with_labels(name, value, BTreeMap::new());
    }

    pub fn record_with_labels(&self, name: &str, value: f64, labels: BTreeMap<String, String>) {
        let mut series = self.series.write();
        let Some(series) = series.get_mut(name) else {
            debug!(metric = name, "ignoring sample for unknown series");
            return;
        };
        series.push(MetricDataPoint {
            timestamp: Utc::now(),
            value,
            labels,
        });
    }

    /// Set the externally measured CPU and memory overhead
    pub fn record_overhead(&self, cpu_percent: f64, memory_bytes: u64) {
        {
            let mut global = self.global.write();
            global.cpu_overhead = cpu_percent;
            global.memory_overhead = memory_bytes;
        }
        self.record(CPU_OVERHEAD, cpu_percent);
        self.record(MEMORY_OVERHEAD, memory_bytes as f64);
    }

    /// Refresh the global accumulator from a monitor snapshot
    ///
    /// Also samples ratio, savings, efficiency, latency and throughput into
    /// their series once there is data to sample.
    pub fn update_global_metrics(&self, metrics: &CompressionMetrics) -> GlobalMetrics {
        let savings = metrics
            .total_input_bytes
            .saturating_sub(metrics.total_output_bytes);
        let efficiency = if metrics.total_input_bytes > 0 {
            savings as f64 / metrics.total_input_bytes as f64 * 100.0
        } else {
            0.0
        };

        let snapshot = {
            let mut global = self.global.write();
            global.total_data_processed =
                metrics.total_input_bytes + metrics.total_decompressed_bytes;
            global.total_data_compressed = metrics.total_input_bytes;
            global.total_data_decompressed = metrics.total_decompressed_bytes;
            global.average_compression_ratio = metrics.overall_ratio;
            global.storage_savings = savings;
            global.compression_efficiency = efficiency;
            global.last_updated = Some(Utc::now());
            global.clone()
        };

        if metrics.total_compressions > 0 {
            let performance = performance_metrics(metrics, &snapshot);
            self.record(COMPRESSION_RATIO, metrics.overall_ratio);
            self.record(STORAGE_SAVINGS, savings as f64);
            self.record(COMPRESSION_EFFICIENCY, efficiency);
            self.record(
                COMPRESSION_LATENCY,
                performance.average_compression_latency.as_secs_f64() * 1000.0,
            );
            self.record(COMPRESSION_THROUGHPUT, performance.compression_throughput);
        }
        if metrics.total_decompressions > 0 {
            let performance = performance_metrics(metrics, &snapshot);
            self.record(
                DECOMPRESSION_LATENCY,
                performance.average_decompression_latency.as_secs_f64() * 1000.0,
            );
            self.record(DECOMPRESSION_THROUGHPUT, performance.decompression_throughput);
        }

        snapshot
    }

    /// Build a full report and hand it to every registered callback
    pub fn generate_report(&self, monitor: &CompressionMonitor) -> CompressionReport {
        let metrics = monitor.metrics();
        let global = self.update_global_metrics(&metrics);

        let report = CompressionReport {
            timestamp: Utc::now(),
            performance_metrics: performance_metrics(&metrics, &global),
            storage_metrics: storage_metrics(&metrics, &global),
            alerts: self.evaluate_alerts(&metrics, &global),
            recommendations: recommendations(&metrics, &global),
            algorithm_metrics: metrics.algorithms,
            global_metrics: global,
        };

        let callbacks = self.callbacks.read().clone();
        for callback in callbacks {
            callback(&report);
        }

        report
    }

    /// Alerts for the monitor's current state
    pub fn check_alerts(&self, monitor: &CompressionMonitor) -> Vec<CompressionAlert> {
        let metrics = monitor.metrics();
        let global = self.update_global_metrics(&metrics);
        self.evaluate_alerts(&metrics, &global)
    }

    fn evaluate_alerts(
        &self,
        metrics: &CompressionMetrics,
        global: &GlobalMetrics,
    ) -> Vec<CompressionAlert> {
        let thresholds = self.thresholds.read().clone();
        let mut alerts = Vec::new();

        if metrics.total_compressions > 0 && metrics.overall_ratio < thresholds.min_compression_ratio
        {
            alerts.push(CompressionAlert::new(
                AlertLevel::Warning,
                COMPRESSION_RATIO,
                "Compression ratio below threshold",
                metrics.overall_ratio,
                thresholds.min_compression_ratio,
            ));
        }

        if global.cpu_overhead > thresholds.max_cpu_overhead {
            alerts.push(CompressionAlert::new(
                AlertLevel::Critical,
                CPU_OVERHEAD,
                "CPU overhead too high",
                global.cpu_overhead,
                thresholds.max_cpu_overhead,
            ));
        }

        if global.memory_overhead > thresholds.max_memory_overhead {
            alerts.push(CompressionAlert::new(
                AlertLevel::Critical,
                MEMORY_OVERHEAD,
                "Memory overhead too high",
                global.memory_overhead as f64,
                thresholds.max_memory_overhead as f64,
            ));
        }

        for (name, algo) in &metrics.algorithms {
            let latency = algo.average_compression_latency();
            if algo.compression_count > 0 && latency > thresholds.max_compression_latency {
                alerts.push(
                    CompressionAlert::new(
                        AlertLevel::Warning,
                        COMPRESSION_LATENCY,
                        "Average compression latency too high",
                        millis(latency),
                        millis(thresholds.max_compression_latency),
                    )
                    .for_algorithm(name.as_str()),
                );
            }

            let latency = algo.average_decompression_latency();
            if algo.decompression_count > 0 && latency > thresholds.max_decompression_latency {
                alerts.push(
                    CompressionAlert::new(
                        AlertLevel::Warning,
                        DECOMPRESSION_LATENCY,
                        "Average decompression latency too high",
                        millis(latency),
                        millis(thresholds.max_decompression_latency),
                    )
                    .for_algorithm(name.as_str()),
                );
            }
        }

        if metrics.total_compressions > 0 && global.storage_savings < thresholds.min_storage_savings
        {
            alerts.push(CompressionAlert::new(
                AlertLevel::Info,
                STORAGE_SAVINGS,
                "Storage savings below expected minimum",
                global.storage_savings as f64,
                thresholds.min_storage_savings as f64,
            ));
        }

        alerts
    }

    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&CompressionReport) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Copy of a series
    pub fn series(&self, name: &str) -> Option<MetricSeries> {
        self.series.read().get(name).cloned()
    }

    /// The newest `n` points of a series
    pub fn recent_points(&self, name: &str, n: usize) -> Option<Vec<MetricDataPoint>> {
        self.series.read().get(name).map(|s| s.last(n))
    }

    pub fn series_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global_metrics(&self) -> GlobalMetrics {
        self.global.read().clone()
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds.read().clone()
    }

    pub fn set_thresholds(&self, thresholds: AlertThresholds) {
        *self.thresholds.write() = thresholds;
    }

    /// Global metrics and every series as a JSON document
    pub fn export_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Export {
            global_metrics: GlobalMetrics,
            metric_series: BTreeMap<String, MetricSeries>,
        }

        let export = Export {
            global_metrics: self.global_metrics(),
            metric_series: self
                .series
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        Ok(serde_json::to_string(&export)?)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("series", &self.series_names())
            .field("callbacks", &self.callbacks.read().len())
            .finish()
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn average_latency(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(total.as_secs_f64() / count as f64)
}

fn performance_metrics(metrics: &CompressionMetrics, global: &GlobalMetrics) -> PerformanceMetrics {
    PerformanceMetrics {
        average_compression_latency: average_latency(
            metrics.total_compression_time,
            metrics.total_compressions,
        ),
        average_decompression_latency: average_latency(
            metrics.total_decompression_time,
            metrics.total_decompressions,
        ),
        compression_throughput: metrics.compression_rate,
        decompression_throughput: metrics.decompression_rate,
        cpu_utilization: global.cpu_overhead,
        memory_utilization: global.memory_overhead,
    }
}

fn storage_metrics(metrics: &CompressionMetrics, global: &GlobalMetrics) -> StorageMetrics {
    StorageMetrics {
        total_storage_used: metrics.total_output_bytes,
        compressed_storage_used: metrics.total_output_bytes,
        uncompressed_storage_used: metrics.total_input_bytes,
        storage_savings_bytes: global.storage_savings,
        storage_savings_percent: global.compression_efficiency,
        compression_ratio: global.average_compression_ratio,
    }
}

fn recommendations(metrics: &CompressionMetrics, global: &GlobalMetrics) -> Vec<String> {
    let mut out = Vec::new();

    let best = metrics
        .algorithms
        .iter()
        .filter(|(_, m)| m.compression_count > 0)
        .max_by(|a, b| a.1.average_ratio.total_cmp(&b.1.average_ratio));

    if let Some((name, best)) = best {
        if metrics.overall_ratio < best.average_ratio * 0.8 {
            out.push(format!(
                "Consider using {} more frequently for better compression ratio ({:.2}x vs {:.2}x overall)",
                name, best.average_ratio, metrics.overall_ratio
            ));
        }
    }

    if global.compression_efficiency < 10.0 {
        out.push(
            "Compression efficiency is low. Consider adjusting cold data thresholds or compression policies"
                .to_string(),
        );
    }

    if global.cpu_overhead > 15.0 {
        out.push(
            "CPU overhead is high. Consider using faster compression algorithms like LZ4 or Snappy"
                .to_string(),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn busy_monitor() -> CompressionMonitor {
        let monitor = CompressionMonitor::new();
        for _ in 0..10 {
            monitor.record_compression("zstd", 1024 * 1024, 128 * 1024);
            monitor.record_compression_time("zstd", Duration::from_millis(2));
        }
        monitor.record_decompression("zstd", 128 * 1024, 1024 * 1024);
        monitor.record_decompression_time("zstd", Duration::from_millis(1));
        monitor
    }

    #[test]
    fn test_predefined_series() {
        let collector = MetricsCollector::default();
        assert_eq!(collector.series_names().len(), 9);
        assert_eq!(collector.series(CPU_OVERHEAD).unwrap().unit, "percent");
        assert_eq!(collector.series(COMPRESSION_LATENCY).unwrap().unit, "milliseconds");
        assert!(collector.series("nope").is_none());

        collector.record("nope", 1.0);
        assert!(collector.series("nope").is_none());
    }

    #[test]
    fn test_empty_monitor_report() {
        let collector = MetricsCollector::default();
        let report = collector.generate_report(&CompressionMonitor::new());

        assert_eq!(report.global_metrics.total_data_processed, 0);
        assert_eq!(report.storage_metrics.storage_savings_percent, 0.0);
        assert!(report.alerts.is_empty());
        assert!(report.algorithm_metrics.is_empty());
        assert!(collector.series(COMPRESSION_RATIO).unwrap().is_empty());
    }

    #[test]
    fn test_global_metrics_from_monitor() {
        let collector = MetricsCollector::default();
        let report = collector.generate_report(&busy_monitor());

        let global = &report.global_metrics;
        assert_eq!(global.total_data_compressed, 10 * 1024 * 1024);
        assert_eq!(global.total_data_decompressed, 1024 * 1024);
        assert_eq!(global.total_data_processed, 11 * 1024 * 1024);
        assert_eq!(global.storage_savings, 10 * (1024 - 128) * 1024);
        assert!((global.compression_efficiency - 87.5).abs() < 1e-9);
        assert!((global.average_compression_ratio - 8.0).abs() < 1e-9);

        assert!(report.alerts.is_empty(), "{:?}", report.alerts);
        assert_eq!(collector.series(COMPRESSION_RATIO).unwrap().len(), 1);
        assert_eq!(collector.series(DECOMPRESSION_LATENCY).unwrap().len(), 1);
        assert!(report.performance_metrics.compression_throughput > 0.0);
    }

    #[test]
    fn test_ratio_and_savings_alerts() {
        let monitor = CompressionMonitor::new();
        monitor.record_compression("lz4", 1000, 900);

        let alerts = MetricsCollector::default().check_alerts(&monitor);
        let levels: Vec<(AlertLevel, &str)> =
            alerts.iter().map(|a| (a.level, a.metric.as_str())).collect();
        assert!(levels.contains(&(AlertLevel::Warning, COMPRESSION_RATIO)));
        assert!(levels.contains(&(AlertLevel::Info, STORAGE_SAVINGS)));
    }

    #[test]
    fn test_overhead_alerts_are_critical() {
        let collector = MetricsCollector::default();
        collector.record_overhead(35.0, 512 * 1024 * 1024);

        let alerts = collector.check_alerts(&CompressionMonitor::new());
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.level == AlertLevel::Critical));
        assert_eq!(collector.series(CPU_OVERHEAD).unwrap().len(), 1);

        let report = collector.generate_report(&CompressionMonitor::new());
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("CPU overhead is high")));
    }

    #[test]
    fn test_latency_alerts_name_the_algorithm() {
        let monitor = CompressionMonitor::new();
        monitor.record_compression("snappy", 4 * 1024 * 1024, 1024 * 1024);
        monitor.record_compression_time("snappy", Duration::from_millis(250));
        monitor.record_decompression("snappy", 1024 * 1024, 4 * 1024 * 1024);
        monitor.record_decompression_time("snappy", Duration::from_millis(80));

        let alerts = MetricsCollector::default().check_alerts(&monitor);
        let latency: Vec<_> = alerts
            .iter()
            .filter(|a| a.metric.ends_with("latency"))
            .collect();
        assert_eq!(latency.len(), 2);
        for alert in latency {
            assert_eq!(alert.level, AlertLevel::Warning);
            assert_eq!(alert.algorithm.as_deref(), Some("snappy"));
        }
    }

    #[test]
    fn test_recommends_best_algorithm() {
        let monitor = CompressionMonitor::new();
        monitor.record_compression("zstd", 1000, 100);
        for _ in 0..20 {
            monitor.record_compression("lz4", 1000, 900);
        }

        let report = MetricsCollector::default().generate_report(&monitor);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.starts_with("Consider using zstd")));
    }

    #[test]
    fn test_callbacks_receive_reports() {
        let collector = MetricsCollector::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        collector.add_callback(move |report| {
            assert!(report.timestamp <= Utc::now());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        collector.generate_report(&busy_monitor());
        collector.generate_report(&busy_monitor());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_export_json() {
        let collector = MetricsCollector::default();
        collector.generate_report(&busy_monitor());

        let json: serde_json::Value = serde_json::from_str(&collector.export_json().unwrap()).unwrap();
        assert!(json["global_metrics"]["storage_savings"].as_u64().unwrap() > 0);
        assert_eq!(json["metric_series"].as_object().unwrap().len(), 9);
        assert_eq!(
            json["metric_series"][COMPRESSION_RATIO]["data_points"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
    }
}
