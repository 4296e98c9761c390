//! Dispatch pipeline
//!
//! Single entry point shared by the metric tick loop and every ingress
//! caller. Owns the evaluator, the suppressor, the queue handle and the
//! routing table, each behind its own lock. Producers never wait on delivery.

use super::dedupe::{Admission, Deduplicator, SuppressionConfig};
use super::queue::{DispatchQueue, Enqueued, QueuedItem, DEFAULT_QUEUE_CAPACITY};
use super::routing::RoutingTable;
use super::worker::{DeliveryWorker, RetryPolicy, WorkerStatus};
use crate::alerts::{EvaluatorConfig, MetricThresholds, ThresholdEvaluator};
use crate::clock::{Clock, SystemClock};
use crate::domain::Event;
use crate::error::ValidationError;
use crate::ingress::{default_identity_fields, Normalizer, RawReport};
use crate::notify::Notifier;
use crate::sources::MetricsSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// What happened to a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    /// Admitted and queued
    Enqueued,
    /// Admitted and queued after evicting a lower-severity item
    EnqueuedWithEviction,
    /// Repeat within the suppression window
    Suppressed,
    /// No channel configured for the category
    Unrouted,
    /// Queue full and nothing lower to evict
    Dropped,
}

/// Counters from one [`Pipeline::tick`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Metrics sampled successfully
    pub sampled: usize,
    /// Metrics whose sample failed
    pub sample_errors: usize,
    /// Transition events produced by the evaluator
    pub transitions: usize,
    /// Events that reached the queue
    pub enqueued: usize,
    /// Events suppressed as repeats
    pub suppressed: usize,
    /// Idle suppression records removed
    pub swept: usize,
}

/// Point-in-time health of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Items waiting in the dispatch queue
    pub queue_depth: usize,
    /// Dedupe keys with a live suppression record
    pub suppressed_active_keys: usize,
    /// Last successful delivery
    pub worker_last_success_at: Option<DateTime<Utc>>,
    /// Incoming items dropped on a full queue
    pub dropped: u64,
    /// Queued items evicted for higher-severity arrivals
    pub evicted: u64,
    /// Items delivered
    pub delivered: u64,
    /// Items given up on after a permanent failure or exhausted retries
    pub failed: u64,
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    evaluator: EvaluatorConfig,
    suppression: SuppressionConfig,
    queue_capacity: usize,
    routing: RoutingTable,
    identity_fields: Vec<String>,
    thresholds: Vec<MetricThresholds>,
    source: Option<Arc<dyn MetricsSource>>,
    clock: Arc<dyn Clock>,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self {
            evaluator: EvaluatorConfig::default(),
            suppression: SuppressionConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            routing: RoutingTable::default(),
            identity_fields: default_identity_fields(),
            thresholds: Vec::new(),
            source: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_evaluator(mut self, config: EvaluatorConfig) -> Self {
        self.evaluator = config;
        self
    }

    pub fn with_suppression(mut self, config: SuppressionConfig) -> Self {
        self.suppression = config;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }

    /// Metadata fields that distinguish otherwise identical reports
    pub fn with_identity_fields(mut self, fields: Vec<String>) -> Self {
        self.identity_fields = fields;
        self
    }

    /// Metrics sampled on every tick
    pub fn with_thresholds(mut self, thresholds: Vec<MetricThresholds>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Clock used to stamp externally submitted reports
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            evaluator: Mutex::new(ThresholdEvaluator::new(self.evaluator)),
            suppressor: Mutex::new(Deduplicator::new(self.suppression)),
            queue: Arc::new(DispatchQueue::new(self.queue_capacity)),
            routing: self.routing,
            normalizer: Normalizer::new(self.identity_fields),
            thresholds: self.thresholds,
            source: self.source,
            clock: self.clock,
            worker_status: Arc::new(WorkerStatus::new()),
        }
    }
}

/// Coordinating structure for alert dispatch
pub struct Pipeline {
    evaluator: Mutex<ThresholdEvaluator>,
    suppressor: Mutex<Deduplicator>,
    queue: Arc<DispatchQueue>,
    routing: RoutingTable,
    normalizer: Normalizer,
    thresholds: Vec<MetricThresholds>,
    source: Option<Arc<dyn MetricsSource>>,
    clock: Arc<dyn Clock>,
    worker_status: Arc<WorkerStatus>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Create the delivery worker for this pipeline's queue
    ///
    /// The worker reports into this pipeline's health counters.
    pub fn worker(&self, notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> DeliveryWorker {
        DeliveryWorker::new(Arc::clone(&self.queue), notifier, policy)
            .with_status(Arc::clone(&self.worker_status))
    }

    /// Normalize an external report and publish it
    ///
    /// Validation errors are returned to the caller; suppression, routing and
    /// queue outcomes are handled here.
    pub fn submit_external_event(&self, raw: RawReport) -> Result<(), ValidationError> {
        let now = self.clock.now();
        let event = self.normalizer.normalize(raw, now)?;
        self.publish(event, now);
        Ok(())
    }

    /// Sample every tracked metric, publish transitions and sweep idle keys
    pub fn tick(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();

        if let Some(source) = &self.source {
            for threshold in &self.thresholds {
                let value = match source.sample(&threshold.metric) {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("Skipping {} this tick: {}", threshold.metric, e);
                        summary.sample_errors += 1;
                        continue;
                    }
                };
                summary.sampled += 1;

                let event = self.evaluator().evaluate(
                    &threshold.metric,
                    value,
                    threshold.warning,
                    threshold.critical,
                    now,
                );

                if let Some(event) = event {
                    summary.transitions += 1;
                    match self.publish(event, now) {
                        Published::Enqueued | Published::EnqueuedWithEviction => {
                            summary.enqueued += 1
                        }
                        Published::Suppressed => summary.suppressed += 1,
                        Published::Unrouted | Published::Dropped => {}
                    }
                }
            }
        }

        summary.swept = self.suppressor().sweep(now);
        summary
    }

    /// Run an event through suppression and routing into the queue
    pub fn publish(&self, event: Event, now: DateTime<Utc>) -> Published {
        let admission = self.suppressor().check(&event, now);
        if !admission.is_admitted() {
            return Published::Suppressed;
        }
        if admission == Admission::Escalated {
            log::debug!("Escalation of {} to {} bypasses suppression", event.dedupe_key, event.severity);
        }

        let Some(channel) = self.routing.resolve(&event) else {
            log::warn!(
                "No channel configured for category '{}'; dropping event {}",
                event.category,
                event.id
            );
            return Published::Unrouted;
        };

        let id = event.id;
        let key = event.dedupe_key.clone();
        let item = QueuedItem::new(event, channel.clone(), now);
        match self.queue.enqueue(item) {
            Ok(Enqueued::Accepted) => {
                log::info!("Queued event {} ({}) for #{}", id, key, channel);
                Published::Enqueued
            }
            Ok(Enqueued::Evicted(evicted)) => {
                log::warn!(
                    "Queue full; evicted {} event {} to make room for event {}",
                    evicted.event.severity,
                    evicted.event.id,
                    id
                );
                Published::EnqueuedWithEviction
            }
            Err(e) => {
                log::warn!("{}", e);
                Published::Dropped
            }
        }
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        let queue = self.queue.stats();
        let worker = self.worker_status.snapshot();
        HealthSnapshot {
            queue_depth: queue.depth,
            suppressed_active_keys: self.suppressor().active_keys(),
            worker_last_success_at: worker.last_success_at,
            dropped: queue.dropped,
            evicted: queue.evicted,
            delivered: worker.delivered,
            failed: worker.failed,
        }
    }

    /// Close the queue; the worker exits and queued items are abandoned
    pub fn shutdown(&self) {
        self.queue.close();
    }

    /// Handle to the dispatch queue
    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn thresholds(&self) -> &[MetricThresholds] {
        &self.thresholds
    }

    fn evaluator(&self) -> MutexGuard<'_, ThresholdEvaluator> {
        self.evaluator
            .lock()
            .expect("threshold evaluator mutex poisoned")
    }

    fn suppressor(&self) -> MutexGuard<'_, Deduplicator> {
        self.suppressor.lock().expect("suppressor mutex poisoned")
    }
}
