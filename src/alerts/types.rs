//! Alert system domain types
//!
//! Defines metric thresholds, alert levels and the per-metric hysteresis state.

use crate::domain::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level a metric currently sits at
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Below the warning threshold
    #[default]
    Normal,
    /// At or above warning, below critical
    Warning,
    /// At or above critical
    Critical,
}

impl AlertLevel {
    /// Severity of the event announcing a transition into this level
    pub fn severity(&self) -> Severity {
        match self {
            Self::Normal => Severity::Info,
            Self::Warning => Severity::Warning,
            Self::Critical => Severity::Critical,
        }
    }

    /// Lowercase name used in metadata and dedupe keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Warning and critical thresholds for one tracked metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    /// Metric name (e.g. `cpu_percent`)
    pub metric: String,
    /// Warning threshold (exclusive)
    pub warning: f64,
    /// Critical threshold (inclusive)
    pub critical: f64,
}

impl MetricThresholds {
    /// Create thresholds for a metric
    pub fn new(metric: impl Into<String>, warning: f64, critical: f64) -> Self {
        Self {
            metric: metric.into(),
            warning,
            critical,
        }
    }

    /// Classify a sample against these thresholds
    pub fn classify(&self, value: f64) -> AlertLevel {
        classify(value, self.warning, self.critical)
    }
}

/// Classify a value: `>= critical` is critical, `> warning` is warning
pub fn classify(value: f64, warning: f64, critical: f64) -> AlertLevel {
    if value >= critical {
        AlertLevel::Critical
    } else if value > warning {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

/// Hysteresis state for one metric
///
/// Created lazily on the first sample and kept for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Metric name
    pub metric_name: String,
    /// Committed level
    pub current_level: AlertLevel,
    /// Consecutive samples above the committed level
    pub consecutive_breaches: u32,
    /// Consecutive samples below the committed level
    pub consecutive_clears: u32,
    /// When the level last changed
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl AlertState {
    /// Fresh state at the normal level
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            current_level: AlertLevel::Normal,
            consecutive_breaches: 0,
            consecutive_clears: 0,
            last_transition_at: None,
        }
    }

    /// Reset both counters (sample matched the committed level)
    pub fn settle(&mut self) {
        self.consecutive_breaches = 0;
        self.consecutive_clears = 0;
    }

    /// Record one sample on the other side of the committed level and
    /// return the updated consecutive count for that direction
    pub fn record_deviation(&mut self, observed: AlertLevel) -> u32 {
        if observed > self.current_level {
            self.consecutive_clears = 0;
            self.consecutive_breaches += 1;
            self.consecutive_breaches
        } else {
            self.consecutive_breaches = 0;
            self.consecutive_clears += 1;
            self.consecutive_clears
        }
    }

    /// Commit a transition to `level`
    pub fn commit(&mut self, level: AlertLevel, now: DateTime<Utc>) {
        self.current_level = level;
        self.last_transition_at = Some(now);
        self.settle();
    }
}
