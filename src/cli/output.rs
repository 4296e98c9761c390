//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::cli::args::OutputFormat;
use crate::dispatch::{HealthSnapshot, TickSummary};
use crate::domain::Event;
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

/// One sampled metric
#[derive(Debug, Clone, Serialize)]
pub struct MetricReading {
    pub metric: String,
    pub value: Option<f64>,
    pub warning: f64,
    pub critical: f64,
    pub level: Option<String>,
    pub error: Option<String>,
}

impl TableDisplay for MetricReading {
    fn to_table(&self) -> String {
        match (&self.value, &self.level) {
            (Some(value), Some(level)) => format!(
                "{:<16} {:>6.1}%  {:<8} (warn {}%, crit {}%)",
                self.metric, value, level, self.warning, self.critical
            ),
            _ => format!(
                "{:<16}   n/a    {}",
                self.metric,
                self.error.as_deref().unwrap_or("unavailable")
            ),
        }
    }

    fn to_compact(&self) -> String {
        match (&self.value, &self.level) {
            (Some(value), Some(level)) => format!("{}={:.1}({})", self.metric, value, level),
            _ => format!("{}=n/a", self.metric),
        }
    }
}

/// Result of `herald sample`
#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub host: String,
    pub metrics: Vec<MetricReading>,
}

impl TableDisplay for SampleReport {
    fn to_table(&self) -> String {
        let mut output = format!("Host: {}\n\n", self.host);
        for reading in &self.metrics {
            output.push_str(&reading.to_table());
            output.push('\n');
        }
        output
    }

    fn to_compact(&self) -> String {
        let readings: Vec<String> = self.metrics.iter().map(|m| m.to_compact()).collect();
        format!("{}: {}", self.host, readings.join(", "))
    }
}

/// Effective configuration shown by `herald check`
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub interval_seconds: u64,
    pub host_label: String,
    pub hysteresis_count: u32,
    pub thresholds: Vec<ThresholdLine>,
    pub suppression_window_seconds: u64,
    pub identity_fields: Vec<String>,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub channels: Vec<RouteLine>,
    pub ingress_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdLine {
    pub metric: String,
    pub warning: f64,
    pub critical: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteLine {
    pub category: String,
    pub channel: String,
}

impl TableDisplay for ConfigSummary {
    fn to_table(&self) -> String {
        let mut output = String::from("Configuration OK\n\n");
        output.push_str(&format!("Host label:         {}\n", self.host_label));
        output.push_str(&format!("Interval:           {}s\n", self.interval_seconds));
        output.push_str(&format!("Hysteresis:         {} samples\n", self.hysteresis_count));
        output.push_str(&format!(
            "Suppression window: {}s (identity: {})\n",
            self.suppression_window_seconds,
            self.identity_fields.join(", ")
        ));
        output.push_str(&format!("Queue capacity:     {}\n", self.queue_capacity));
        output.push_str(&format!("Max attempts:       {}\n", self.max_attempts));
        output.push_str(&format!(
            "Ingress:            {}\n",
            if self.ingress_enabled { "enabled" } else { "disabled (no api_key)" }
        ));

        output.push_str("\nThresholds:\n");
        for t in &self.thresholds {
            output.push_str(&format!(
                "  {:<16} warn {:>5}%  crit {:>5}%{}\n",
                t.metric,
                t.warning,
                t.critical,
                if t.enabled { "" } else { "  (disabled)" }
            ));
        }

        output.push_str("\nRoutes:\n");
        if self.channels.is_empty() {
            output.push_str("  (none configured)\n");
        }
        for route in &self.channels {
            output.push_str(&format!("  {:<16} -> #{}\n", route.category, route.channel));
        }

        output
    }

    fn to_compact(&self) -> String {
        format!(
            "ok host={} interval={}s metrics={} routes={}",
            self.host_label,
            self.interval_seconds,
            self.thresholds.iter().filter(|t| t.enabled).count(),
            self.channels.len()
        )
    }
}

/// Result of `herald normalize`
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedReport {
    pub dedupe_key: String,
    pub channel: Option<String>,
    pub event: Event,
}

impl TableDisplay for NormalizedReport {
    fn to_table(&self) -> String {
        let event = &self.event;
        let mut output = format!("{} {}\n", event.severity.badge(), event.title);
        output.push_str(&format!("Message:    {}\n", event.message));
        output.push_str(&format!("Origin:     {} ({})\n", event.origin, event.source));
        output.push_str(&format!("Category:   {}\n", event.category));
        output.push_str(&format!("Dedupe key: {}\n", self.dedupe_key));
        output.push_str(&format!(
            "Channel:    {}\n",
            self.channel
                .as_deref()
                .map(|c| format!("#{}", c))
                .unwrap_or_else(|| "(unrouted)".to_string())
        ));
        for (key, value) in &event.metadata {
            output.push_str(&format!("  {}: {}\n", key, value));
        }
        output
    }

    fn to_compact(&self) -> String {
        format!("{} {}", self.event.severity.badge(), self.dedupe_key)
    }
}

/// Result of `herald run --once`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tick: TickSummary,
    pub health: HealthSnapshot,
}

impl TableDisplay for RunReport {
    fn to_table(&self) -> String {
        format!("{}\n\n{}", self.tick.to_table(), self.health.to_table())
    }

    fn to_compact(&self) -> String {
        format!(
            "queued={} delivered={} failed={} dropped={}",
            self.tick.enqueued, self.health.delivered, self.health.failed, self.health.dropped
        )
    }
}

impl TableDisplay for TickSummary {
    fn to_table(&self) -> String {
        format!(
            "Sampled: {}  Errors: {}  Transitions: {}  Queued: {}  Suppressed: {}",
            self.sampled, self.sample_errors, self.transitions, self.enqueued, self.suppressed
        )
    }
}

impl TableDisplay for HealthSnapshot {
    fn to_table(&self) -> String {
        let last = self
            .worker_last_success_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "Queue depth: {}\nActive keys: {}\nDelivered:   {}\nFailed:      {}\nDropped:     {}\nEvicted:     {}\nLast send:   {}",
            self.queue_depth,
            self.suppressed_active_keys,
            self.delivered,
            self.failed,
            self.dropped,
            self.evicted,
            last
        )
    }
}
