//! Event dispatch
//!
//! Suppression, routing, the bounded queue and the delivery worker, tied
//! together by [`Pipeline`].

mod dedupe;
mod pipeline;
mod queue;
mod routing;
mod worker;

pub use dedupe::{
    Admission, Deduplicator, SuppressionConfig, SuppressionRecord, DEFAULT_EVICTION_MULTIPLIER,
    DEFAULT_SUPPRESSION_WINDOW,
};
pub use pipeline::{HealthSnapshot, Pipeline, PipelineBuilder, Published, TickSummary};
pub use queue::{DispatchQueue, Enqueued, QueueStats, QueuedItem, DEFAULT_QUEUE_CAPACITY};
pub use routing::RoutingTable;
pub use worker::{
    DeliveryWorker, RetryPolicy, StepOutcome, WorkerStats, WorkerStatus, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, DEFAULT_SEND_TIMEOUT,
};
