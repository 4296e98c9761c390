//! Unified error types for herald
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use std::time::Duration;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External report failed authentication or schema checks
    #[error("Ingress error: {0}")]
    Ingress(#[from] IngressError),

    /// External report could not be normalized into an event
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Metrics source failure
    #[error("Metrics source error: {0}")]
    Source(#[from] SourceError),

    /// A worker thread could not be started or joined
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from normalizing an external report into an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Severity string is not one of info, warning, error, critical
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    /// Field value failed validation
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Errors raised at the ingress boundary before normalization
#[derive(Error, Debug)]
pub enum IngressError {
    /// Missing or wrong bearer token
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Payload does not match the report schema
    #[error("Schema error: {0}")]
    Schema(String),
}

impl From<serde_json::Error> for IngressError {
    fn from(err: serde_json::Error) -> Self {
        IngressError::Schema(err.to_string())
    }
}

/// The dispatch queue was full and the new item was the one dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Dispatch queue full (capacity {capacity}); dropped event {event_id}")]
pub struct QueueFullError {
    /// Queue capacity at the time of the drop
    pub capacity: usize,
    /// Event that was dropped
    pub event_id: u64,
}

/// Failure reported by a notifier when delivering a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Destination asked us to wait before sending again
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Network or server error that may succeed on retry
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// Destination is gone or we are not allowed to post there
    #[error("Permanent delivery failure: {0}")]
    Permanent(String),
}

impl SendError {
    /// Whether the failure can be retried at all
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Errors from a metrics source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Metric name not known to this source
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Metric exists but could not be read right now
    #[error("Metric '{metric}' unavailable: {reason}")]
    Unavailable { metric: String, reason: String },
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Failed to parse config file
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
