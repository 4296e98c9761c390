//! Metrics sources
//!
//! The threshold evaluator is fed from a [`MetricsSource`]. Metric values are
//! percentages in `0.0..=100.0`.

mod system;

pub use system::SystemSource;

use crate::error::SourceError;

/// CPU utilisation across all cores
pub const CPU_PERCENT: &str = "cpu_percent";

/// Used share of physical memory
pub const MEMORY_PERCENT: &str = "memory_percent";

/// Used share of the monitored filesystem
pub const DISK_PERCENT: &str = "disk_percent";

/// Every metric the shipped source understands
pub const KNOWN_METRICS: [&str; 3] = [CPU_PERCENT, MEMORY_PERCENT, DISK_PERCENT];

/// Source of metric samples
pub trait MetricsSource: Send + Sync {
    /// Read the current value of a metric
    fn sample(&self, metric: &str) -> Result<f64, SourceError>;

    /// Source name for identification
    fn name(&self) -> &str;
}
