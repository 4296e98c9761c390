//! Sample command implementation
//!
//! Reads every tracked metric once and reports its current level.

use crate::alerts::MetricThresholds;
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, MetricReading, SampleReport};
use crate::config::ConfigBuilder;
use crate::error::Result;
use crate::sources::{MetricsSource, SystemSource};

/// Execute the sample command
pub fn run_sample(format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let config = ConfigBuilder::new().with_file(config_path)?.build()?;
    let source = SystemSource::new().with_disk_mount(config.general.disk_mount.clone());

    let report = SampleReport {
        host: config.general.host_label.clone(),
        metrics: read_all(&source, &config.tracked_thresholds()),
    };

    print_output(&report, format)?;
    Ok(())
}

fn read_all(source: &dyn MetricsSource, thresholds: &[MetricThresholds]) -> Vec<MetricReading> {
    thresholds
        .iter()
        .map(|threshold| match source.sample(&threshold.metric) {
            Ok(value) => MetricReading {
                metric: threshold.metric.clone(),
                value: Some(value),
                warning: threshold.warning,
                critical: threshold.critical,
                level: Some(threshold.classify(value).as_str().to_string()),
                error: None,
            },
            Err(e) => MetricReading {
                metric: threshold.metric.clone(),
                value: None,
                warning: threshold.warning,
                critical: threshold.critical,
                level: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}
