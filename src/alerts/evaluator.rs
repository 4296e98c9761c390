//! Threshold evaluator
//!
//! Turns periodic metric samples into state-transition events. A level change
//! is only committed after `hysteresis_count` consecutive samples land on the
//! new side of the thresholds, so a single noisy reading never alerts.

use super::types::{classify, AlertLevel, AlertState};
use crate::domain::{Event, EventSource};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Default number of consecutive samples required to change level
pub const DEFAULT_HYSTERESIS_COUNT: u32 = 2;

/// Threshold evaluator configuration
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Consecutive samples required before a transition is committed
    pub hysteresis_count: u32,
    /// Origin label stamped on emitted events (usually the host name)
    pub origin: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            hysteresis_count: DEFAULT_HYSTERESIS_COUNT,
            origin: "localhost".to_string(),
        }
    }
}

/// Threshold evaluator
///
/// Holds one [`AlertState`] per metric name.
#[derive(Debug)]
pub struct ThresholdEvaluator {
    states: HashMap<String, AlertState>,
    config: EvaluatorConfig,
}

impl ThresholdEvaluator {
    /// Create a new evaluator
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            states: HashMap::new(),
            config: EvaluatorConfig {
                hysteresis_count: config.hysteresis_count.max(1),
                ..config
            },
        }
    }

    /// Evaluate one sample, returning an event if a transition was committed
    pub fn evaluate(
        &mut self,
        metric_name: &str,
        value: f64,
        warning_threshold: f64,
        critical_threshold: f64,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        let observed = classify(value, warning_threshold, critical_threshold);

        let state = self
            .states
            .entry(metric_name.to_string())
            .or_insert_with(|| AlertState::new(metric_name));

        if observed == state.current_level {
            state.settle();
            return None;
        }

        let count = state.record_deviation(observed);
        if count < self.config.hysteresis_count {
            log::debug!(
                "{} at {:.1} looks {} ({}/{} samples)",
                metric_name,
                value,
                observed,
                count,
                self.config.hysteresis_count
            );
            return None;
        }

        let previous = state.current_level;
        state.commit(observed, now);
        log::info!("{} transitioned {} -> {}", metric_name, previous, observed);

        Some(transition_event(
            &self.config.origin,
            metric_name,
            value,
            warning_threshold,
            critical_threshold,
            previous,
            observed,
            now,
        ))
    }

    /// State for a metric, if it has been sampled
    pub fn state(&self, metric_name: &str) -> Option<&AlertState> {
        self.states.get(metric_name)
    }

    /// All tracked states
    pub fn states(&self) -> impl Iterator<Item = &AlertState> {
        self.states.values()
    }

    /// Configured hysteresis count
    pub fn hysteresis_count(&self) -> u32 {
        self.config.hysteresis_count
    }
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}

/// Human label for well-known metric names
pub fn display_name(metric_name: &str) -> &str {
    match metric_name {
        "cpu_percent" => "CPU",
        "memory_percent" => "Memory",
        "disk_percent" => "Disk",
        other => other,
    }
}

#[allow(clippy::too_many_arguments)]
fn transition_event(
    origin: &str,
    metric_name: &str,
    value: f64,
    warning: f64,
    critical: f64,
    previous: AlertLevel,
    level: AlertLevel,
    now: DateTime<Utc>,
) -> Event {
    let label = display_name(metric_name);

    let (title, message) = match level {
        AlertLevel::Normal => (
            format!("Recovered: {}", label),
            format!(
                "{} usage back to normal: {:.1}% (was {})",
                label,
                value,
                previous.as_str()
            ),
        ),
        AlertLevel::Warning => (
            format!("System Alert: {}", label),
            format!(
                "High {} usage: {:.1}% (warning at {:.0}%)",
                label, value, warning
            ),
        ),
        AlertLevel::Critical => (
            format!("System Alert: {}", label),
            format!(
                "High {} usage: {:.1}% (critical at {:.0}%)",
                label, value, critical
            ),
        ),
    };

    Event::builder(EventSource::InternalMetric, origin, metric_name)
        .severity(level.severity())
        .title(title)
        .message(message)
        .meta("value", value)
        .meta("warning_threshold", warning)
        .meta("critical_threshold", critical)
        .meta("previous_level", previous.as_str())
        .meta("level", level.as_str())
        .identity_field("level")
        .build(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn evaluator(hysteresis_count: u32) -> ThresholdEvaluator {
        ThresholdEvaluator::new(EvaluatorConfig {
            hysteresis_count,
            origin: "test-host".to_string(),
        })
    }

    fn cpu(ev: &mut ThresholdEvaluator, value: f64, at: i64) -> Option<Event> {
        ev.evaluate("cpu_percent", value, 80.0, 90.0, t(at))
    }

    #[test]
    fn test_first_sample_initializes_normal() {
        let mut ev = evaluator(2);
        assert!(cpu(&mut ev, 20.0, 0).is_none());
        let state = ev.state("cpu_percent").unwrap();
        assert_eq!(state.current_level, AlertLevel::Normal);
        assert!(state.last_transition_at.is_none());
    }

    #[test]
    fn test_single_breach_does_not_transition() {
        let mut ev = evaluator(2);
        assert!(cpu(&mut ev, 95.0, 0).is_none());
        assert_eq!(
            ev.state("cpu_percent").unwrap().current_level,
            AlertLevel::Normal
        );
        assert!(cpu(&mut ev, 50.0, 60).is_none());
        assert!(cpu(&mut ev, 95.0, 120).is_none());
    }

    #[test]
    fn test_value_at_warning_threshold_stays_normal() {
        let mut ev = evaluator(2);
        assert!(cpu(&mut ev, 80.0, 0).is_none());
        assert!(cpu(&mut ev, 80.0, 60).is_none());
        assert_eq!(
            ev.state("cpu_percent").unwrap().current_level,
            AlertLevel::Normal
        );

        // Critical bound is inclusive
        cpu(&mut ev, 90.0, 120);
        let event = cpu(&mut ev, 90.0, 180).expect("transition");
        assert_eq!(event.severity, Severity::Critical);
    }

    #[test]
    fn test_two_consecutive_breaches_transition() {
        let mut ev = evaluator(2);
        assert!(cpu(&mut ev, 85.0, 0).is_none());
        let event = cpu(&mut ev, 86.0, 60).expect("transition");
        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(event.source, EventSource::InternalMetric);
        assert_eq!(event.category, "cpu_percent");
        assert_eq!(
            event.dedupe_key,
            "internal-metric:test-host:cpu_percent:level=warning"
        );

        let state = ev.state("cpu_percent").unwrap();
        assert_eq!(state.current_level, AlertLevel::Warning);
        assert_eq!(state.last_transition_at, Some(t(60)));
        assert_eq!(state.consecutive_breaches, 0);
    }

    #[test]
    fn test_hysteresis_of_one_transitions_immediately() {
        let mut ev = evaluator(1);
        let event = cpu(&mut ev, 97.0, 0).expect("transition");
        assert_eq!(event.severity, Severity::Critical);
    }

    #[test]
    fn test_recovery_emits_single_info_event() {
        let mut ev = evaluator(2);
        cpu(&mut ev, 95.0, 0);
        assert!(cpu(&mut ev, 95.0, 60).is_some());

        assert!(cpu(&mut ev, 30.0, 120).is_none());
        let recovered = cpu(&mut ev, 30.0, 180).expect("recovery");
        assert_eq!(recovered.severity, Severity::Info);
        assert!(recovered.title.starts_with("Recovered"));
        assert!(recovered.message.contains("was critical"));

        // Staying normal emits nothing more
        assert!(cpu(&mut ev, 30.0, 240).is_none());
        assert!(cpu(&mut ev, 30.0, 300).is_none());
    }

    #[test]
    fn test_matching_sample_resets_counters() {
        let mut ev = evaluator(3);
        cpu(&mut ev, 85.0, 0);
        cpu(&mut ev, 85.0, 60);
        cpu(&mut ev, 10.0, 120);
        let state = ev.state("cpu_percent").unwrap();
        assert_eq!(state.consecutive_breaches, 0);
        assert_eq!(state.consecutive_clears, 0);
        assert!(cpu(&mut ev, 85.0, 180).is_none());
    }

    #[test]
    fn test_oscillation_is_damped() {
        let mut ev = evaluator(2);
        let mut emitted = 0;
        for (i, value) in [85.0, 70.0, 85.0, 70.0, 85.0, 70.0].iter().enumerate() {
            if cpu(&mut ev, *value, i as i64 * 60).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 0);
    }

    #[test]
    fn test_escalation_commits_latest_level() {
        let mut ev = evaluator(2);
        cpu(&mut ev, 95.0, 0);
        let event = cpu(&mut ev, 85.0, 60).expect("transition");
        assert_eq!(event.severity, Severity::Warning);
    }

    #[test]
    fn test_metrics_tracked_independently() {
        let mut ev = evaluator(2);
        ev.evaluate("memory_percent", 96.0, 85.0, 95.0, t(0));
        assert!(cpu(&mut ev, 95.0, 0).is_none());
        let event = ev
            .evaluate("memory_percent", 96.0, 85.0, 95.0, t(60))
            .expect("memory transition");
        assert_eq!(event.category, "memory_percent");
        assert_eq!(ev.states().count(), 2);
    }
}
