//! External report schemas
//!
//! Wire shapes accepted from external reporters. These are checked by serde
//! at the ingress boundary; semantic checks happen during normalization.
//! Unknown top-level fields are ignored. Metadata values must be scalars.

use crate::domain::Metadata;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of report, usually taken from the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Server status change
    Status,
    /// General event
    Event,
    /// Externally submitted news item
    News,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Event => write!(f, "event"),
            Self::News => write!(f, "news"),
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "status" => Ok(Self::Status),
            "event" => Ok(Self::Event),
            "news" => Ok(Self::News),
            other => Err(format!("unknown report kind '{}'", other)),
        }
    }
}

/// Server status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Reporting server
    #[serde(alias = "source")]
    pub server_name: String,
    /// Status string, e.g. `online`, `offline`, `degraded`
    pub status: String,
    /// Optional human message
    #[serde(default)]
    pub message: Option<String>,
    /// Reporter timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Scalar metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// General event report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    /// Event type, e.g. `deployment`
    pub event_type: String,
    /// Reporting system
    pub source: String,
    /// Display title, defaults to the event type
    #[serde(default)]
    pub title: Option<String>,
    /// Optional details
    #[serde(default)]
    pub description: Option<String>,
    /// Severity string, defaults to `info`
    #[serde(default)]
    pub severity: Option<String>,
    /// Reporter timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Scalar metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Externally submitted news item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsUpdate {
    /// Headline
    pub title: String,
    /// Body text
    pub content: String,
    /// Publisher
    pub source: String,
    /// Link to the full item
    #[serde(default)]
    pub url: Option<String>,
    /// Reporter timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Local date-time layouts accepted when the offset is missing
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a reporter timestamp
///
/// RFC 3339 is preferred. Timestamps without an offset, as produced by
/// Python's `datetime.isoformat()`, are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}'", raw))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

/// Authenticated, schema-checked report awaiting normalization
///
/// The tagged form (`{"kind": "event", ...}`) is used for line-oriented
/// local ingestion where there is no request path to carry the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawReport {
    /// Server status report
    Status(StatusReport),
    /// General event report
    Event(EventReport),
    /// News item
    News(NewsUpdate),
}

impl RawReport {
    /// Parse a payload whose kind is known out of band
    pub fn from_json(kind: ReportKind, payload: &[u8]) -> serde_json::Result<Self> {
        Ok(match kind {
            ReportKind::Status => Self::Status(serde_json::from_slice(payload)?),
            ReportKind::Event => Self::Event(serde_json::from_slice(payload)?),
            ReportKind::News => Self::News(serde_json::from_slice(payload)?),
        })
    }

    /// Parse a self-describing `{"kind": ...}` payload
    pub fn from_tagged_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Report kind
    pub fn kind(&self) -> ReportKind {
        match self {
            Self::Status(_) => ReportKind::Status,
            Self::Event(_) => ReportKind::Event,
            Self::News(_) => ReportKind::News,
        }
    }
}
