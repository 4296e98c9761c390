//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::alerts::{EvaluatorConfig, MetricThresholds, DEFAULT_HYSTERESIS_COUNT};
use crate::dispatch::{
    RetryPolicy, RoutingTable, SuppressionConfig, DEFAULT_EVICTION_MULTIPLIER,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_CAPACITY,
};
use crate::domain::ChannelId;
use crate::error::ConfigError;
use crate::ingress::default_identity_fields;
use crate::sources::{CPU_PERCENT, DISK_PERCENT, MEMORY_PERCENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Metric thresholds
    pub thresholds: ThresholdsConfig,
    /// Duplicate suppression
    pub suppression: SuppressionSettings,
    /// Dispatch queue
    pub queue: QueueConfig,
    /// Delivery retry settings
    pub delivery: DeliveryConfig,
    /// Destination channels
    pub channels: ChannelsConfig,
    /// External report ingress
    pub ingress: IngressConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Monitor interval in seconds
    pub interval_seconds: u64,
    /// Origin label stamped on metric alerts
    pub host_label: String,
    /// Mount point whose usage backs `disk_percent`
    pub disk_mount: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            host_label: sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string()),
            disk_mount: PathBuf::from("/"),
        }
    }
}

/// Threshold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Consecutive samples required to change level
    pub hysteresis_count: u32,
    /// Tracked metrics
    pub metrics: Vec<MetricConfig>,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            hysteresis_count: DEFAULT_HYSTERESIS_COUNT,
            metrics: vec![
                MetricConfig::new(CPU_PERCENT, 80.0, 90.0),
                MetricConfig::new(MEMORY_PERCENT, 85.0, 95.0),
                MetricConfig::new(DISK_PERCENT, 85.0, 95.0),
            ],
        }
    }
}

/// One tracked metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Metric name
    pub name: String,
    /// Warning threshold (exclusive)
    pub warning: f64,
    /// Critical threshold (inclusive)
    pub critical: f64,
    /// Whether the metric is sampled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl MetricConfig {
    fn new(name: &str, warning: f64, critical: f64) -> Self {
        Self {
            name: name.to_string(),
            warning,
            critical,
            enabled: true,
        }
    }
}

/// Suppression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionSettings {
    /// Window during which repeats are collapsed
    pub window_seconds: u64,
    /// Idle records are evicted after this many windows
    pub eviction_multiplier: u32,
    /// Metadata fields that are part of the dedupe key
    pub identity_fields: Vec<String>,
}

impl Default for SuppressionSettings {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            eviction_multiplier: DEFAULT_EVICTION_MULTIPLIER,
            identity_fields: default_identity_fields(),
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued items
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// First retry delay in milliseconds
    pub base_delay_ms: u64,
    /// Retry delay cap in seconds
    pub max_delay_seconds: u64,
    /// Attempts before an item is dropped
    pub max_attempts: u32,
    /// Bound on a single send; 0 disables the bound
    pub send_timeout_seconds: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_seconds: 60,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            send_timeout_seconds: 10,
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Channel for status reports, events and metric alerts
    pub status: Option<String>,
    /// Channel for news items
    pub news: Option<String>,
    /// Per-category overrides
    pub routes: BTreeMap<String, String>,
}

/// Ingress configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IngressConfig {
    /// Shared bearer token for report submission
    pub api_key: Option<String>,
}

impl Config {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.interval_seconds == 0 {
            return Err(invalid("general.interval_seconds", "must be greater than zero"));
        }
        if self.thresholds.hysteresis_count == 0 {
            return Err(invalid("thresholds.hysteresis_count", "must be at least 1"));
        }
        for metric in &self.thresholds.metrics {
            if metric.name.trim().is_empty() {
                return Err(invalid("thresholds.metrics.name", "must not be empty"));
            }
            if metric.warning > metric.critical {
                return Err(invalid(
                    &format!("thresholds.metrics.{}", metric.name),
                    &format!(
                        "warning ({}) is above critical ({})",
                        metric.warning, metric.critical
                    ),
                ));
            }
        }
        if self.suppression.window_seconds == 0 {
            return Err(invalid("suppression.window_seconds", "must be greater than zero"));
        }
        if self.queue.capacity == 0 {
            return Err(invalid("queue.capacity", "must be greater than zero"));
        }
        if self.delivery.max_attempts == 0 {
            return Err(invalid("delivery.max_attempts", "must be at least 1"));
        }
        if self.channels.status.is_none() && self.channels.news.is_none() && self.channels.routes.is_empty() {
            log::warn!("No channels configured; every event will be dropped");
        }
        Ok(())
    }

    /// Thresholds for enabled metrics
    pub fn tracked_thresholds(&self) -> Vec<MetricThresholds> {
        self.thresholds
            .metrics
            .iter()
            .filter(|m| m.enabled)
            .map(|m| MetricThresholds::new(m.name.clone(), m.warning, m.critical))
            .collect()
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            hysteresis_count: self.thresholds.hysteresis_count,
            origin: self.general.host_label.clone(),
        }
    }

    pub fn suppression_config(&self) -> SuppressionConfig {
        SuppressionConfig {
            window: Duration::from_secs(self.suppression.window_seconds),
            eviction_multiplier: self.suppression.eviction_multiplier,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.delivery.base_delay_ms),
            max_delay: Duration::from_secs(self.delivery.max_delay_seconds),
            max_attempts: self.delivery.max_attempts,
            send_timeout: match self.delivery.send_timeout_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::new(
            self.channels.status.clone().map(ChannelId::from),
            self.channels.news.clone().map(ChannelId::from),
        )
        .with_routes(
            self.channels
                .routes
                .iter()
                .map(|(category, channel)| (category.clone(), ChannelId::new(channel.clone()))),
        )
    }

    /// Monitor interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.general.interval_seconds)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.interval_seconds, 300);
        assert_eq!(config.thresholds.hysteresis_count, 2);
        assert_eq!(config.thresholds.metrics.len(), 3);
        assert_eq!(config.queue.capacity, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [general]
            interval_seconds = 60
            host_label = "web-1"
            disk_mount = "/var"

            [[thresholds.metrics]]
            name = "cpu_percent"
            warning = 70.0
            critical = 85.0

            [[thresholds.metrics]]
            name = "disk_percent"
            warning = 90.0
            critical = 97.0
            enabled = false

            [channels]
            status = "ops"
            news = "announcements"

            [channels.routes]
            deployment = "ci"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.host_label, "web-1");
        assert_eq!(config.general.disk_mount, PathBuf::from("/var"));
        assert_eq!(config.suppression.window_seconds, 300);

        let tracked = config.tracked_thresholds();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].warning, 70.0);

        let routing = config.routing_table();
        assert_eq!(routing.channels().len(), 3);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.thresholds.metrics[0].warning = 95.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.thresholds.hysteresis_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.delivery.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.suppression.window_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let mut config = Config::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());

        config.delivery.send_timeout_seconds = 0;
        assert_eq!(config.retry_policy().send_timeout, None);
    }
}
