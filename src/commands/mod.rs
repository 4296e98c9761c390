//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod check;
pub mod normalize;
pub mod run;
pub mod sample;

pub use check::run_check;
pub use normalize::run_normalize;
pub use run::run_daemon;
pub use sample::run_sample;

use crate::config::Config;
use crate::dispatch::Pipeline;
use crate::sources::MetricsSource;
use std::sync::Arc;

/// Assemble a pipeline from configuration
pub fn build_pipeline(config: &Config, source: Arc<dyn MetricsSource>) -> Pipeline {
    Pipeline::builder()
        .with_evaluator(config.evaluator_config())
        .with_suppression(config.suppression_config())
        .with_queue_capacity(config.queue.capacity)
        .with_routing(config.routing_table())
        .with_identity_fields(config.suppression.identity_fields.clone())
        .with_thresholds(config.tracked_thresholds())
        .with_source(source)
        .build()
}
