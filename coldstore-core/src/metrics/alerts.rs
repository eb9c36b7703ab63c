//! Alert levels and thresholds

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    /// Health score penalty for one active alert of this level
    pub fn penalty(self) -> f64 {
        match self {
            AlertLevel::Info => 5.0,
            AlertLevel::Warning => 10.0,
            AlertLevel::Critical => 20.0,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "info"),
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Alerting limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub min_compression_ratio: f64,
    /// Percent
    pub max_cpu_overhead: f64,
    /// Bytes
    pub max_memory_overhead: u64,
    pub max_compression_latency: Duration,
    pub max_decompression_latency: Duration,
    /// Bytes
    pub min_storage_savings: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_compression_ratio: 1.5,
            max_cpu_overhead: 20.0,
            max_memory_overhead: 100 * 1024 * 1024,
            max_compression_latency: Duration::from_millis(100),
            max_decompression_latency: Duration::from_millis(50),
            min_storage_savings: 1024 * 1024,
        }
    }
}

/// A threshold violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionAlert {
    pub level: AlertLevel,
    pub message: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl CompressionAlert {
    pub fn new(
        level: AlertLevel,
        metric: impl Into<String>,
        message: impl Into<String>,
        value: f64,
        threshold: f64,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            metric: metric.into(),
            value,
            threshold,
            timestamp: Utc::now(),
            algorithm: None,
        }
    }

    pub fn for_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }
}
