//! Normalize command implementation
//!
//! Runs a report file through schema validation and normalization and shows
//! the resulting event, its dedupe key and destination. Nothing is sent.
//! When an ingress API key is configured the bearer check runs first, as it
//! would for a submission over HTTP.

use crate::cli::args::{NormalizeArgs, OutputFormat};
use crate::cli::output::{print_output, NormalizedReport};
use crate::config::{Config, ConfigBuilder};
use crate::error::{IngressError, Result};
use crate::ingress::{ApiKeyValidator, IngressValidator, Normalizer, RawReport, ReportKind};

use chrono::Utc;

/// Execute the normalize command
pub fn run_normalize(
    args: &NormalizeArgs,
    format: OutputFormat,
    config_path: Option<&str>,
) -> Result<()> {
    let config = ConfigBuilder::new()
        .with_file(config_path)?
        .with_api_key(args.api_key.clone())
        .build()?;
    let payload = std::fs::read(&args.file)?;

    let raw = accept_payload(&config, args.kind.into(), &payload, args.token.as_deref())?;
    let report = normalize_payload(&config, raw)?;
    print_output(&report, format)?;
    Ok(())
}

fn accept_payload(
    config: &Config,
    kind: ReportKind,
    payload: &[u8],
    token: Option<&str>,
) -> Result<RawReport> {
    let raw = match config.ingress.api_key.as_deref().filter(|key| !key.is_empty()) {
        Some(key) => {
            let header = token.map(|token| format!("Bearer {}", token));
            ApiKeyValidator::new(key).accept(kind, payload, header.as_deref())?
        }
        None => RawReport::from_json(kind, payload).map_err(IngressError::from)?,
    };
    Ok(raw)
}

fn normalize_payload(config: &Config, raw: RawReport) -> Result<NormalizedReport> {
    let event = Normalizer::new(config.suppression.identity_fields.clone()).normalize(raw, Utc::now())?;
    let channel = config
        .routing_table()
        .resolve(&event)
        .map(|c| c.as_str().to_string());

    Ok(NormalizedReport {
        dedupe_key: event.dedupe_key.clone(),
        channel,
        event,
    })
}
