//! herald - alert and event dispatch library
//!
//! Turns host metric samples and external status/event/news reports into
//! deduplicated, rate-limit-aware chat notifications.
//!
//! # Modules
//!
//! - [`alerts`]: Threshold evaluation with hysteresis
//! - [`cli`]: Command-line interface definitions
//! - [`clock`]: Time sources
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`dispatch`]: Suppression, routing, queueing and delivery
//! - [`domain`]: Events, severities and channels
//! - [`error`]: Error types
//! - [`ingress`]: External report validation and normalization
//! - [`notify`]: Notifier boundary and message formatting
//! - [`sources`]: Metrics sources

pub mod alerts;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod ingress;
pub mod notify;
pub mod sources;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use dispatch::{HealthSnapshot, Pipeline, TickSummary};
pub use domain::{Event, Severity};
pub use error::{AppError, Result};
