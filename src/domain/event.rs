//! Event domain type
//!
//! An [`Event`] is the unified representation of anything that might be
//! announced to operators, whether it came from a local metric transition
//! or from an external report.

use super::metadata::{Metadata, MetadataValue};
use super::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    /// Produced by the threshold evaluator from a local metric sample
    InternalMetric,
    /// Pushed by an external reporter through ingress
    ExternalReport,
}

impl EventSource {
    /// Stable name used in dedupe keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalMetric => "internal-metric",
            Self::ExternalReport => "external-report",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized event flowing through the dispatch pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: EventId,
    /// Internal metric or external report
    pub source: EventSource,
    /// Reporter identity (external `source`/`server_name`, or host label)
    pub origin: String,
    /// Metric name, event type, `status` or `news`
    pub category: String,
    /// Event severity
    pub severity: Severity,
    /// Short display title
    pub title: String,
    /// Display body
    pub message: String,
    /// Scalar metadata, opaque to the pipeline except for identity fields
    pub metadata: Metadata,
    /// When the event was normalized
    pub created_at: DateTime<Utc>,
    /// Timestamp supplied by the reporter, if any
    pub reported_at: Option<DateTime<Utc>>,
    /// Identity of the underlying condition
    pub dedupe_key: String,
}

impl Event {
    /// Start building an event
    pub fn builder(
        source: EventSource,
        origin: impl Into<String>,
        category: impl Into<String>,
    ) -> EventBuilder {
        EventBuilder {
            source,
            origin: origin.into(),
            category: category.into(),
            severity: Severity::Info,
            title: String::new(),
            message: String::new(),
            metadata: Metadata::new(),
            reported_at: None,
            identity_fields: BTreeSet::new(),
        }
    }

    /// Whether this event is the same alert as another
    pub fn same_alert_as(&self, other: &Event) -> bool {
        self.dedupe_key == other.dedupe_key
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.id, self.severity, self.title, self.dedupe_key
        )
    }
}

/// Builder for [`Event`]
#[derive(Debug, Clone)]
pub struct EventBuilder {
    source: EventSource,
    origin: String,
    category: String,
    severity: Severity,
    title: String,
    message: String,
    metadata: Metadata,
    reported_at: Option<DateTime<Utc>>,
    identity_fields: BTreeSet<String>,
}

impl EventBuilder {
    /// Set severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set message body
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add one metadata entry
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge a metadata map
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Set the reporter-supplied timestamp
    pub fn reported_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.reported_at = at;
        self
    }

    /// Mark a metadata field as part of the event identity
    pub fn identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_fields.insert(field.into());
        self
    }

    /// Mark several metadata fields as part of the event identity
    pub fn identity_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Finish the event, stamping `created_at` and deriving the dedupe key
    pub fn build(self, now: DateTime<Utc>) -> Event {
        let dedupe_key = dedupe_key(
            self.source,
            &self.origin,
            &self.category,
            &self.metadata,
            &self.identity_fields,
        );

        let title = if self.title.is_empty() {
            self.category.clone()
        } else {
            self.title
        };

        Event {
            id: EventId::next(),
            source: self.source,
            origin: self.origin,
            category: self.category,
            severity: self.severity,
            title,
            message: self.message,
            metadata: self.metadata,
            created_at: now,
            reported_at: self.reported_at,
            dedupe_key,
        }
    }
}

/// Derive the dedupe key: `source:origin:category[:field=value...]`
///
/// Identity fields absent from `metadata` are skipped. `%`, `:` and `=`
/// inside a part are percent-encoded so distinct parts never collide.
pub fn dedupe_key(
    source: EventSource,
    origin: &str,
    category: &str,
    metadata: &Metadata,
    identity_fields: &BTreeSet<String>,
) -> String {
    let mut key = source.to_string();
    for part in [origin, category] {
        key.push(':');
        push_escaped(&mut key, part);
    }
    for field in identity_fields {
        if let Some(value) = metadata.get(field) {
            key.push(':');
            push_escaped(&mut key, field);
            key.push('=');
            push_escaped(&mut key, &value.to_string());
        }
    }
    key
}

fn push_escaped(key: &mut String, part: &str) {
    for c in part.chars() {
        match c {
            '%' => key.push_str("%25"),
            ':' => key.push_str("%3A"),
            '=' => key.push_str("%3D"),
            _ => key.push(c),
        }
    }
}
