//! Report normalization
//!
//! Converts schema-checked [`RawReport`]s into pipeline [`Event`]s, mapping
//! severities and deriving the dedupe identity.

use super::report::{EventReport, NewsUpdate, RawReport, StatusReport};
use crate::domain::{Event, EventSource, Severity};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};

/// Longest message body a chat message can carry
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Longest title a chat message can carry
pub const MAX_TITLE_CHARS: usize = 256;

/// Category used for status reports
pub const STATUS_CATEGORY: &str = "status";

/// Category used for news items
pub const NEWS_CATEGORY: &str = "news";

/// Metadata fields treated as identity-relevant unless configured otherwise
pub fn default_identity_fields() -> Vec<String> {
    vec!["version".to_string(), "environment".to_string()]
}

/// Report normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    identity_fields: Vec<String>,
}

impl Normalizer {
    /// Create a normalizer using the given identity-relevant metadata fields
    pub fn new(identity_fields: Vec<String>) -> Self {
        Self { identity_fields }
    }

    /// Identity-relevant metadata fields
    pub fn identity_fields(&self) -> &[String] {
        &self.identity_fields
    }

    /// Normalize a report into an event stamped at `now`
    pub fn normalize(&self, raw: RawReport, now: DateTime<Utc>) -> Result<Event, ValidationError> {
        match raw {
            RawReport::Status(report) => self.normalize_status(report, now),
            RawReport::Event(report) => self.normalize_event(report, now),
            RawReport::News(update) => self.normalize_news(update, now),
        }
    }

    fn normalize_status(
        &self,
        report: StatusReport,
        now: DateTime<Utc>,
    ) -> Result<Event, ValidationError> {
        let server = required("server_name", &report.server_name)?;
        let status = required("status", &report.status)?.to_ascii_lowercase();

        let message = report
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Status changed to {}", status));

        Ok(
            Event::builder(EventSource::ExternalReport, server, STATUS_CATEGORY)
                .severity(status_severity(&status))
                .title(truncate(&format!("Server Status: {}", server), MAX_TITLE_CHARS))
                .message(truncate(&message, MAX_MESSAGE_CHARS))
                .metadata(report.metadata.unwrap_or_default())
                .meta("status", status)
                .reported_at(report.timestamp)
                .identity_fields(self.identity_fields.iter().cloned())
                .identity_field("status")
                .build(now),
        )
    }

    fn normalize_event(
        &self,
        report: EventReport,
        now: DateTime<Utc>,
    ) -> Result<Event, ValidationError> {
        let event_type = required("event_type", &report.event_type)?;
        let source = required("source", &report.source)?;

        let severity = match report.severity.as_deref() {
            Some(s) if !s.trim().is_empty() => s.parse::<Severity>()?,
            _ => Severity::Info,
        };

        let title = report
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(event_type);

        let message = report
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "No additional details provided".to_string());

        Ok(
            Event::builder(EventSource::ExternalReport, source, event_type)
                .severity(severity)
                .title(truncate(title, MAX_TITLE_CHARS))
                .message(truncate(&message, MAX_MESSAGE_CHARS))
                .metadata(report.metadata.unwrap_or_default())
                .reported_at(report.timestamp)
                .identity_fields(self.identity_fields.iter().cloned())
                .build(now),
        )
    }

    fn normalize_news(
        &self,
        update: NewsUpdate,
        now: DateTime<Utc>,
    ) -> Result<Event, ValidationError> {
        let title = required("title", &update.title)?;
        let source = required("source", &update.source)?;
        let content = required("content", &update.content)?;

        let mut builder = Event::builder(EventSource::ExternalReport, source, NEWS_CATEGORY)
            .severity(Severity::Info)
            .title(truncate(title, MAX_TITLE_CHARS))
            .message(truncate(content, MAX_MESSAGE_CHARS))
            .meta("headline", title)
            .reported_at(update.timestamp)
            .identity_field("headline");

        if let Some(url) = update.url.filter(|u| !u.trim().is_empty()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ValidationError::InvalidValue {
                    field: "url",
                    message: "must be an http(s) URL".to_string(),
                });
            }
            builder = builder.meta("url", url);
        }

        Ok(builder.build(now))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(default_identity_fields())
    }
}

/// Map a free-form status string onto a severity
pub fn status_severity(status: &str) -> Severity {
    match status {
        "online" | "up" | "healthy" | "ok" | "recovered" => Severity::Info,
        "degraded" | "warning" | "maintenance" => Severity::Warning,
        "error" => Severity::Error,
        "offline" | "down" | "critical" => Severity::Critical,
        _ => Severity::Warning,
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed)
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
