//! Deduplication and suppression
//!
//! At most one event per dedupe key is admitted per suppression window.
//! A strictly higher severity than the last admitted event for the key always
//! gets through and restarts the window.

use crate::domain::{Event, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default suppression window
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_secs(300);

/// Default idle multiple after which records are evicted
pub const DEFAULT_EVICTION_MULTIPLIER: u32 = 4;

/// Suppressor configuration
#[derive(Debug, Clone)]
pub struct SuppressionConfig {
    /// Window during which repeats of a key are collapsed
    pub window: Duration,
    /// Records idle for `eviction_multiplier * window` are removed by `sweep`
    pub eviction_multiplier: u32,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_SUPPRESSION_WINDOW,
            eviction_multiplier: DEFAULT_EVICTION_MULTIPLIER,
        }
    }
}

/// Suppression bookkeeping for one dedupe key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuppressionRecord {
    /// Dedupe key
    pub dedupe_key: String,
    /// When an event for this key was last admitted
    pub last_emitted_at: DateTime<Utc>,
    /// Occurrences suppressed in the current window
    pub emit_count_in_window: u32,
    /// Start of the current window
    pub window_start_at: DateTime<Utc>,
    /// Severity of the last admitted event
    pub last_severity: Severity,
}

impl SuppressionRecord {
    fn new(event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            dedupe_key: event.dedupe_key.clone(),
            last_emitted_at: now,
            emit_count_in_window: 0,
            window_start_at: now,
            last_severity: event.severity,
        }
    }

    fn restart(&mut self, severity: Severity, now: DateTime<Utc>) {
        self.window_start_at = now;
        self.last_emitted_at = now;
        self.emit_count_in_window = 0;
        self.last_severity = severity;
    }
}

/// Why an event was admitted or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting of the key
    New,
    /// Severity higher than the last admitted event
    Escalated,
    /// Previous window has elapsed
    WindowElapsed,
    /// Repeat within the window
    Suppressed,
}

impl Admission {
    /// Whether the event should be forwarded
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Suppressed)
    }
}

/// Deduplicator/suppressor over dedupe keys
#[derive(Debug, Default)]
pub struct Deduplicator {
    records: HashMap<String, SuppressionRecord>,
    config: SuppressionConfig,
}

impl Deduplicator {
    /// Create a new suppressor
    pub fn new(config: SuppressionConfig) -> Self {
        Self {
            records: HashMap::new(),
            config,
        }
    }

    /// Decide whether `event` should be forwarded to the queue
    pub fn admit(&mut self, event: &Event, now: DateTime<Utc>) -> bool {
        self.check(event, now).is_admitted()
    }

    /// Like [`admit`](Self::admit) but reports the reason
    pub fn check(&mut self, event: &Event, now: DateTime<Utc>) -> Admission {
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));

        let Some(record) = self.records.get_mut(&event.dedupe_key) else {
            self.records
                .insert(event.dedupe_key.clone(), SuppressionRecord::new(event, now));
            return Admission::New;
        };

        if event.severity > record.last_severity {
            record.restart(event.severity, now);
            return Admission::Escalated;
        }

        if now - record.window_start_at >= window {
            record.restart(event.severity, now);
            return Admission::WindowElapsed;
        }

        record.emit_count_in_window += 1;
        log::debug!(
            "Suppressed {} ({} repeats in window)",
            event.dedupe_key,
            record.emit_count_in_window
        );
        Admission::Suppressed
    }

    /// Remove records idle for longer than `eviction_multiplier * window`
    ///
    /// Returns the number of records removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let idle = self
            .config
            .window
            .saturating_mul(self.config.eviction_multiplier.max(1));
        let idle = chrono::Duration::from_std(idle)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));

        let before = self.records.len();
        self.records
            .retain(|_, record| now - record.last_emitted_at <= idle);
        let removed = before - self.records.len();
        if removed > 0 {
            log::debug!("Evicted {} idle suppression records", removed);
        }
        removed
    }

    /// Suppressed occurrences in the current window for a key
    pub fn suppressed_count(&self, dedupe_key: &str) -> Option<u32> {
        self.records
            .get(dedupe_key)
            .map(|record| record.emit_count_in_window)
    }

    /// Record for a key
    pub fn record(&self, dedupe_key: &str) -> Option<&SuppressionRecord> {
        self.records.get(dedupe_key)
    }

    /// Number of keys currently tracked
    pub fn active_keys(&self) -> usize {
        self.records.len()
    }

    /// Configured window
    pub fn window(&self) -> Duration {
        self.config.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventSource;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn deploy(severity: Severity, at: i64) -> Event {
        Event::builder(EventSource::ExternalReport, "ci", "deployment")
            .severity(severity)
            .build(t(at))
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(SuppressionConfig {
            window: Duration::from_secs(300),
            eviction_multiplier: 4,
        })
    }

    #[test]
    fn test_repeats_within_window_suppressed() {
        let mut d = dedup();
        assert!(d.admit(&deploy(Severity::Info, 0), t(0)));
        assert!(!d.admit(&deploy(Severity::Info, 20), t(20)));
        assert!(!d.admit(&deploy(Severity::Info, 40), t(40)));
        assert_eq!(d.suppressed_count("external-report:ci:deployment"), Some(2));
    }

    #[test]
    fn test_escalation_bypasses_and_resets_window() {
        let mut d = dedup();
        assert!(d.admit(&deploy(Severity::Info, 0), t(0)));
        assert!(!d.admit(&deploy(Severity::Info, 20), t(20)));
        assert_eq!(
            d.check(&deploy(Severity::Critical, 50), t(50)),
            Admission::Escalated
        );

        let record = d.record("external-report:ci:deployment").unwrap();
        assert_eq!(record.window_start_at, t(50));
        assert_eq!(record.emit_count_in_window, 0);
        assert_eq!(record.last_severity, Severity::Critical);

        // Same severity again is suppressed, lower too
        assert!(!d.admit(&deploy(Severity::Critical, 60), t(60)));
        assert!(!d.admit(&deploy(Severity::Warning, 70), t(70)));
    }

    #[test]
    fn test_equal_severity_is_not_escalation() {
        let mut d = dedup();
        assert!(d.admit(&deploy(Severity::Warning, 0), t(0)));
        assert!(!d.admit(&deploy(Severity::Warning, 1), t(1)));
    }

    #[test]
    fn test_window_elapsed_admits_again() {
        let mut d = dedup();
        assert!(d.admit(&deploy(Severity::Info, 0), t(0)));
        assert!(!d.admit(&deploy(Severity::Info, 299), t(299)));
        assert_eq!(
            d.check(&deploy(Severity::Info, 300), t(300)),
            Admission::WindowElapsed
        );
        assert_eq!(d.suppressed_count("external-report:ci:deployment"), Some(0));
    }

    #[test]
    fn test_lower_severity_after_window_resets_baseline() {
        let mut d = dedup();
        assert!(d.admit(&deploy(Severity::Critical, 0), t(0)));
        assert!(d.admit(&deploy(Severity::Info, 400), t(400)));
        // Baseline is now info, so warning escalates
        assert!(d.admit(&deploy(Severity::Warning, 410), t(410)));
    }

    #[test]
    fn test_distinct_keys_independent() {
        let mut d = dedup();
        let other = Event::builder(EventSource::ExternalReport, "ci", "rollback").build(t(0));
        assert!(d.admit(&deploy(Severity::Info, 0), t(0)));
        assert!(d.admit(&other, t(0)));
        assert_eq!(d.active_keys(), 2);
    }

    #[test]
    fn test_sweep_evicts_idle_records() {
        let mut d = dedup();
        d.admit(&deploy(Severity::Info, 0), t(0));
        let fresh = Event::builder(EventSource::ExternalReport, "ci", "rollback").build(t(1000));
        d.admit(&fresh, t(1000));

        assert_eq!(d.sweep(t(1200)), 0);
        assert_eq!(d.sweep(t(1201)), 1);
        assert_eq!(d.active_keys(), 1);
        assert!(d.record("external-report:ci:deployment").is_none());
    }

    #[test]
    fn test_suppressed_repeats_do_not_refresh_idle_timer() {
        let mut d = dedup();
        d.admit(&deploy(Severity::Info, 0), t(0));
        d.admit(&deploy(Severity::Info, 100), t(100));
        assert_eq!(d.sweep(t(1201)), 1);
    }
}
