//! Dashboard assembly and report output
//!
//! The [`Reporter`] turns monitor and collector state into the documents
//! served over HTTP and written by the [`ReportScheduler`].

mod scheduler;

pub use scheduler::{ReportScheduler, ScheduleStatus, StoredReport};

use crate::metrics::{
    AlertThresholds, CompressionAlert, CompressionReport, MetricDataPoint,
    MetricSeries, MetricsCollector, COMPRESSION_RATIO, COMPRESSION_THROUGHPUT, CPU_OVERHEAD,
    STORAGE_SAVINGS,
};
use crate::monitor::{AlgorithmMetrics, CompressionMetrics, CompressionMonitor};
use crate::{ColdStoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Series shown on the dashboard
pub const DASHBOARD_SERIES: [&str; 4] = [
    COMPRESSION_RATIO,
    COMPRESSION_THROUGHPUT,
    STORAGE_SAVINGS,
    CPU_OVERHEAD,
];

/// Report serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
}

impl FromStr for ReportFormat {
    type Err = ColdStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ReportFormat::Json),
            other => Err(ColdStoreError::ConfigInvalid(format!(
                "unsupported report format: {}",
                other
            ))),
        }
    }
}

/// Where a scheduled report goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportDestination {
    /// Kept in the scheduler's recent report buffer
    Memory,
    /// Written under the report directory
    File,
}

impl FromStr for ReportDestination {
    type Err = ColdStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(ReportDestination::Memory),
            "file" => Ok(ReportDestination::File),
            other => Err(ColdStoreError::ConfigInvalid(format!(
                "unsupported report destination: {}",
                other
            ))),
        }
    }
}

/// A named periodic report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSchedule {
    pub name: String,
    pub interval: Duration,
    #[serde(default = "default_format")]
    pub format: ReportFormat,
    pub destination: ReportDestination,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_format() -> ReportFormat {
    ReportFormat::Json
}

fn default_enabled() -> bool {
    true
}

impl ReportSchedule {
    pub fn new(name: impl Into<String>, interval: Duration, destination: ReportDestination) -> Self {
        Self {
            name: name.into(),
            interval,
            format: ReportFormat::Json,
            destination,
            enabled: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ColdStoreError::ConfigInvalid(
                "report schedule name must not be empty".into(),
            ));
        }
        if self.interval.is_zero() {
            return Err(ColdStoreError::ConfigInvalid(format!(
                "report schedule {} has a zero interval",
                self.name
            )));
        }
        Ok(())
    }
}

/// Reporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub http_port: u16,
    /// How often the scheduler looks for due reports
    pub check_interval: Duration,
    pub report_dir: PathBuf,
    /// Points per series included in the dashboard
    pub dashboard_points: usize,
    pub thresholds: AlertThresholds,
    pub schedules: Vec<ReportSchedule>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            http_port: crate::config::REPORTER_PORT,
            check_interval: crate::config::REPORT_CHECK_INTERVAL,
            report_dir: PathBuf::from("reports"),
            dashboard_points: crate::config::DASHBOARD_POINTS,
            thresholds: AlertThresholds::default(),
            schedules: vec![
                ReportSchedule::new(
                    "hourly_summary",
                    Duration::from_secs(60 * 60),
                    ReportDestination::Memory,
                ),
                ReportSchedule::new(
                    "daily_detailed",
                    Duration::from_secs(24 * 60 * 60),
                    ReportDestination::File,
                ),
            ],
        }
    }
}

/// Headline numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_data_processed: String,
    pub storage_savings: String,
    pub average_compression_ratio: f64,
    pub compression_efficiency: String,
    pub active_alerts: usize,
    pub health_score: f64,
    pub system_health: String,
}

/// Per-algorithm dashboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmStats {
    pub name: String,
    pub compression_count: u64,
    pub average_ratio: f64,
    pub throughput_mbps: f64,
    pub efficiency_score: f64,
    pub recommended_use_case: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub overview: DashboardOverview,
    pub algorithm_stats: BTreeMap<String, AlgorithmStats>,
    pub time_series_data: BTreeMap<String, Vec<MetricDataPoint>>,
    pub alerts: Vec<CompressionAlert>,
    pub recommendations: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// Read-only view over a monitor and its metrics collector
#[derive(Debug)]
pub struct Reporter {
    monitor: Arc<CompressionMonitor>,
    collector: Arc<MetricsCollector>,
    config: ReporterConfig,
}

impl Reporter {
    pub fn new(monitor: Arc<CompressionMonitor>, config: ReporterConfig) -> Result<Self> {
        let collector = Arc::new(MetricsCollector::new(config.thresholds.clone()));
        Self::with_collector(monitor, collector, config)
    }

    pub fn with_collector(
        monitor: Arc<CompressionMonitor>,
        collector: Arc<MetricsCollector>,
        config: ReporterConfig,
    ) -> Result<Self> {
        for schedule in &config.schedules {
            schedule.validate()?;
        }
        if config.check_interval.is_zero() {
            return Err(ColdStoreError::ConfigInvalid(
                "check_interval must be non-zero".into(),
            ));
        }

        Ok(Self {
            monitor,
            collector,
            config,
        })
    }

    /// Raw monitor snapshot
    pub fn metrics(&self) -> CompressionMetrics {
        self.monitor.metrics()
    }

    /// Full collector report
    pub fn report(&self) -> CompressionReport {
        self.collector.generate_report(&self.monitor)
    }

    pub fn alerts(&self) -> Vec<CompressionAlert> {
        self.collector.check_alerts(&self.monitor)
    }

    pub fn algorithms(&self) -> BTreeMap<String, AlgorithmMetrics> {
        self.monitor.metrics().algorithms
    }

    /// Copy of a collector series
    pub fn time_series(&self, name: &str) -> Option<MetricSeries> {
        self.collector.series(name)
    }

    pub fn dashboard(&self) -> Dashboard {
        let report = self.report();

        let time_series_data = DASHBOARD_SERIES
            .iter()
            .filter_map(|name| {
                self.collector
                    .recent_points(name, self.config.dashboard_points)
                    .map(|points| (name.to_string(), points))
            })
            .collect();

        Dashboard {
            overview: overview(&report),
            algorithm_stats: algorithm_stats(&report.algorithm_metrics),
            time_series_data,
            alerts: report.alerts,
            recommendations: report.recommendations,
            last_updated: Utc::now(),
        }
    }

    /// Write a fresh report to `writer`
    ///
    /// Only `json` is supported; anything else is `ConfigInvalid`.
    pub fn write_report<W: Write>(&self, mut writer: W, format: &str) -> Result<()> {
        match format.parse::<ReportFormat>()? {
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, &self.report())?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    pub fn monitor(&self) -> &Arc<CompressionMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }
}

fn overview(report: &CompressionReport) -> DashboardOverview {
    let global = &report.global_metrics;
    let score = health_score(report);

    DashboardOverview {
        total_data_processed: format_bytes(global.total_data_processed),
        storage_savings: format_bytes(global.storage_savings),
        average_compression_ratio: global.average_compression_ratio,
        compression_efficiency: format!("{:.1}%", global.compression_efficiency),
        active_alerts: report.alerts.len(),
        health_score: score,
        system_health: health_label(score).to_string(),
    }
}

/// 100 minus penalties for alerts, low efficiency and high CPU overhead
pub fn health_score(report: &CompressionReport) -> f64 {
    let mut score = 100.0;

    for alert in &report.alerts {
        score -= alert.level.penalty();
    }
    if report.global_metrics.compression_efficiency < 10.0 {
        score -= 15.0;
    }
    if report.global_metrics.cpu_overhead > 20.0 {
        score -= 10.0;
    }

    score
}

pub fn health_label(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "Excellent",
        s if s >= 75.0 => "Good",
        s if s >= 60.0 => "Fair",
        s if s >= 40.0 => "Poor",
        _ => "Critical",
    }
}

fn algorithm_stats(algorithms: &BTreeMap<String, AlgorithmMetrics>) -> BTreeMap<String, AlgorithmStats> {
    algorithms
        .iter()
        .map(|(name, m)| {
            let throughput = m.compression_throughput();
            let stats = AlgorithmStats {
                name: name.clone(),
                compression_count: m.compression_count,
                average_ratio: m.average_ratio,
                throughput_mbps: throughput,
                efficiency_score: m.average_ratio * throughput / 100.0,
                recommended_use_case: recommended_use_case(name, m.average_ratio, throughput)
                    .to_string(),
            };
            (name.clone(), stats)
        })
        .collect()
}

/// Heuristic workload description for an algorithm's observed behaviour
pub fn recommended_use_case(algorithm: &str, ratio: f64, throughput_mbps: f64) -> &'static str {
    match algorithm {
        crate::engine::LZ4 if throughput_mbps > 100.0 => "Real-time data, high-frequency operations",
        crate::engine::LZ4 => "General purpose, balanced performance",
        crate::engine::SNAPPY if throughput_mbps > 80.0 => "Network compression, streaming data",
        crate::engine::SNAPPY => "Moderate compression with good speed",
        crate::engine::ZSTD if ratio > 3.0 => "Cold data, archival storage",
        crate::engine::ZSTD => "High compression ratio scenarios",
        _ => "General purpose",
    }
}

/// Human-readable byte count in binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < PREFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
