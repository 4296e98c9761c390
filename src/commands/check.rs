//! Check command implementation
//!
//! Loads and validates configuration, then prints the effective settings.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, ConfigSummary, RouteLine, ThresholdLine};
use crate::config::{Config, ConfigBuilder};
use crate::error::Result;
use crate::ingress::{NEWS_CATEGORY, STATUS_CATEGORY};

/// Execute the check command
pub fn run_check(format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let config = ConfigBuilder::new().with_file(config_path)?.build()?;
    print_output(&summarize(&config), format)?;
    Ok(())
}

fn summarize(config: &Config) -> ConfigSummary {
    let mut channels = Vec::new();
    if let Some(status) = &config.channels.status {
        channels.push(RouteLine {
            category: format!("{} (default)", STATUS_CATEGORY),
            channel: status.clone(),
        });
    }
    if let Some(news) = &config.channels.news {
        channels.push(RouteLine {
            category: NEWS_CATEGORY.to_string(),
            channel: news.clone(),
        });
    }
    channels.extend(config.channels.routes.iter().map(|(category, channel)| RouteLine {
        category: category.clone(),
        channel: channel.clone(),
    }));

    ConfigSummary {
        interval_seconds: config.general.interval_seconds,
        host_label: config.general.host_label.clone(),
        hysteresis_count: config.thresholds.hysteresis_count,
        thresholds: config
            .thresholds
            .metrics
            .iter()
            .map(|m| ThresholdLine {
                metric: m.name.clone(),
                warning: m.warning,
                critical: m.critical,
                enabled: m.enabled,
            })
            .collect(),
        suppression_window_seconds: config.suppression.window_seconds,
        identity_fields: config.suppression.identity_fields.clone(),
        queue_capacity: config.queue.capacity,
        max_attempts: config.delivery.max_attempts,
        channels,
        ingress_enabled: config
            .ingress
            .api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::TableDisplay;

    #[test]
    fn test_summarize_defaults() {
        let summary = summarize(&Config::default());
        assert_eq!(summary.thresholds.len(), 3);
        assert!(summary.channels.is_empty());
        assert!(!summary.ingress_enabled);
        assert!(summary.to_table().contains("(none configured)"));
    }

    #[test]
    fn test_summarize_routes() {
        let mut config = Config::default();
        config.channels.status = Some("ops".into());
        config
            .channels
            .routes
            .insert("deployment".into(), "ci".into());
        config.ingress.api_key = Some("k".into());

        let summary = summarize(&config);
        assert_eq!(summary.channels.len(), 2);
        assert!(summary.ingress_enabled);
        assert!(summary.to_table().contains("-> #ci"));
    }
}
