//! Capped time series with running aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// One sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl MetricDataPoint {
    pub fn new(value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            value,
            labels: BTreeMap::new(),
        }
    }
}

/// Summary statistics over the points currently held
///
/// Percentiles are nearest-rank over the sorted values and are only present
/// once the series holds at least ten points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<f64>,
}

const MIN_POINTS_FOR_PERCENTILES: usize = 10;

impl Aggregates {
    fn compute<'a>(values: impl Iterator<Item = &'a MetricDataPoint>) -> Self {
        let mut sorted: Vec<f64> = values.map(|p| p.value).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let percentile = |q: f64| {
            let idx = ((count as f64 * q) as usize).min(count - 1);
            sorted[idx]
        };
        let with_percentiles = count >= MIN_POINTS_FOR_PERCENTILES;

        Self {
            avg: sum / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            sum,
            count,
            p50: with_percentiles.then(|| percentile(0.50)),
            p95: with_percentiles.then(|| percentile(0.95)),
            p99: with_percentiles.then(|| percentile(0.99)),
        }
    }
}

/// Named series keeping the most recent `capacity` points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub unit: String,
    pub data_points: VecDeque<MetricDataPoint>,
    pub aggregates: Aggregates,
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    crate::config::SERIES_CAPACITY
}

impl MetricSeries {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::with_capacity(name, unit, crate::config::SERIES_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, unit: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            data_points: VecDeque::with_capacity(capacity.min(1024)),
            aggregates: Aggregates::default(),
            capacity: capacity.max(1),
        }
    }

    /// Append a point, evicting the oldest when full, and refresh aggregates
    pub fn push(&mut self, point: MetricDataPoint) {
        if self.data_points.len() == self.capacity {
            self.data_points.pop_front();
        }
        self.data_points.push_back(point);
        self.aggregates = Aggregates::compute(self.data_points.iter());
    }

    /// The newest `n` points, oldest first
    pub fn last(&self, n: usize) -> Vec<MetricDataPoint> {
        let skip = self.data_points.len().saturating_sub(n);
        self.data_points.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&MetricDataPoint> {
        self.data_points.back()
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }
}
