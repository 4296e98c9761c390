//! Threshold alerting
//!
//! Provides hysteresis-damped threshold evaluation for locally sampled metrics.

mod evaluator;
mod types;

pub use evaluator::{
    display_name, EvaluatorConfig, ThresholdEvaluator, DEFAULT_HYSTERESIS_COUNT,
};
pub use types::{classify, AlertLevel, AlertState, MetricThresholds};
