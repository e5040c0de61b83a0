pub mod alerts;
pub mod collector;
pub mod config;
pub mod history;
pub mod monitor;
pub mod persist;
pub mod probes;
pub mod util;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a single metric or a whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Healthy => write!(f, "healthy"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// How a measured value relates to its threshold.
///
/// Comparison direction is concern-specific (latency is "lower is better",
/// endpoint health is "higher is better"), so every probe names its rule
/// explicitly instead of baking one direction into the metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Healthy when `value >= threshold`.
    AtLeast,
    /// Healthy when `value <= threshold`.
    AtMost,
    /// Healthy when `value < threshold`.
    Below,
}

impl Comparison {
    /// Classify a successfully measured value.
    ///
    /// A measurement that exists is at worst `Warning`; `Critical` is
    /// reserved for failure-to-measure and loss of availability, which
    /// probes set explicitly via [`HealthMetric::failed`].
    pub fn classify(self, value: f64, threshold: f64) -> Severity {
        let healthy = match self {
            Comparison::AtLeast => value >= threshold,
            Comparison::AtMost => value <= threshold,
            Comparison::Below => value < threshold,
        };

        if healthy {
            Severity::Healthy
        } else {
            Severity::Warning
        }
    }
}

/// One measurement of one health concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetric {
    pub name: String,
    pub value: f64,
    pub threshold: f64,
    pub status: Severity,
    pub timestamp: DateTime<Utc>,
}

impl HealthMetric {
    /// A successfully measured value, classified by the probe's comparison rule.
    pub fn measured(name: &str, value: f64, threshold: f64, rule: Comparison) -> Self {
        Self {
            name: name.to_string(),
            value,
            threshold,
            status: rule.classify(value, threshold),
            timestamp: Utc::now(),
        }
    }

    /// A failed measurement: the worst-case value for the concern, always critical.
    ///
    /// Failure to measure is evidence of unhealthiness, not an absence of data.
    pub fn failed(name: &str, worst_value: f64, threshold: f64, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            value: worst_value,
            threshold,
            status: Severity::Critical,
            timestamp: now,
        }
    }
}

/// Aggregated view over one cycle's full metric batch.
///
/// Immutable after creation; appended to the history window and written to
/// the externally-read "current report" slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub overall_status: Severity,
    pub metrics: BTreeMap<String, HealthMetric>,
}

impl HealthReport {
    /// Reduce a batch of metrics into one report.
    ///
    /// `overall_score` is the percentage of healthy metrics in the batch.
    /// An empty batch is a defined boundary (score 0, status critical)
    /// rather than a division by zero.
    pub fn aggregate(batch: &[HealthMetric], now: DateTime<Utc>) -> Self {
        let overall_score = if batch.is_empty() {
            0.0
        } else {
            let healthy = batch
                .iter()
                .filter(|m| m.status == Severity::Healthy)
                .count();
            100.0 * healthy as f64 / batch.len() as f64
        };

        let metrics = batch.iter().map(|m| (m.name.clone(), m.clone())).collect();

        Self {
            timestamp: now,
            overall_score,
            overall_status: Self::status_for_score(overall_score),
            metrics,
        }
    }

    /// Roll a score up into one status: >= 90 healthy, >= 70 warning, else critical.
    pub fn status_for_score(score: f64) -> Severity {
        if score >= 90.0 {
            Severity::Healthy
        } else if score >= 70.0 {
            Severity::Warning
        } else {
            Severity::Critical
        }
    }
}
