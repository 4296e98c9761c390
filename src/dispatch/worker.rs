//! Delivery worker
//!
//! Single consumer of the dispatch queue. Each claimed item is sent through
//! the [`Notifier`] and ends up in one of three places:
//!
//! - delivered: dropped from the queue, `last_success_at` recorded
//! - retry-scheduled: put back at its original position with a later
//!   `not_before` (rate limits also block the whole channel)
//! - failed-permanent: dropped, logged at error level, counted
//!
//! Rate-limit refusals never consume the retry budget. Transient failures do,
//! with exponential backoff per item.

use super::queue::DispatchQueue;
use crate::clock::Clock;
use crate::domain::ChannelId;
use crate::error::SendError;
use crate::notify::{MessageFormatter, Notifier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound on retry delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Default number of attempts before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default bound on a single send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry and timeout settings for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first transient failure
    pub base_delay: Duration,
    /// Cap on the exponential delay
    pub max_delay: Duration,
    /// Attempts (including the first) before an item is failed-permanent
    pub max_attempts: u32,
    /// Bound on one send call; `None` sends inline without a bound
    pub send_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th transient failure: `min(base * 2^(n-1), cap)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
        }
    }
}

/// Result of one [`DeliveryWorker::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Item sent and dropped
    Delivered,
    /// Channel asked us to back off; item requeued untouched
    RateLimited {
        /// Blocked channel
        channel: ChannelId,
        /// End of the backoff
        until: DateTime<Utc>,
    },
    /// Transient failure; item requeued for a later attempt
    RetryScheduled { at: DateTime<Utc> },
    /// Item dropped after a permanent failure or exhausted retries
    FailedPermanent,
    /// Nothing claimable right now
    Idle { next_due: Option<DateTime<Utc>> },
}

/// Delivery counters shared with the pipeline's health snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerStats {
    /// Time of the last successful send
    pub last_success_at: Option<DateTime<Utc>>,
    /// Items delivered
    pub delivered: u64,
    /// Items failed-permanent
    pub failed: u64,
    /// Transient failures scheduled for retry
    pub retried: u64,
    /// Rate-limit refusals
    pub rate_limited: u64,
}

/// Thread-safe holder for [`WorkerStats`]
#[derive(Debug, Default)]
pub struct WorkerStatus {
    stats: Mutex<WorkerStats>,
}

impl WorkerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> WorkerStats {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, WorkerStats> {
        self.stats.lock().expect("worker status mutex poisoned")
    }
}

/// Single-threaded consumer of the dispatch queue
pub struct DeliveryWorker {
    queue: Arc<DispatchQueue>,
    notifier: Arc<dyn Notifier>,
    formatter: MessageFormatter,
    policy: RetryPolicy,
    channel_backoff: HashMap<ChannelId, DateTime<Utc>>,
    status: Arc<WorkerStatus>,
}

impl DeliveryWorker {
    /// Create a worker draining `queue` into `notifier`
    pub fn new(queue: Arc<DispatchQueue>, notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self {
            queue,
            notifier,
            formatter: MessageFormatter::default(),
            policy,
            channel_backoff: HashMap::new(),
            status: Arc::new(WorkerStatus::new()),
        }
    }

    /// Use a custom message formatter
    pub fn with_formatter(mut self, formatter: MessageFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Report into an existing status holder
    pub fn with_status(mut self, status: Arc<WorkerStatus>) -> Self {
        self.status = status;
        self
    }

    /// Shared handle to the delivery counters
    pub fn status(&self) -> Arc<WorkerStatus> {
        Arc::clone(&self.status)
    }

    /// Deadline until which `channel` is blocked by a rate limit
    pub fn blocked_until(&self, channel: &ChannelId) -> Option<DateTime<Utc>> {
        self.channel_backoff.get(channel).copied()
    }

    /// Claim one ready item and attempt delivery
    pub fn step(&mut self, now: DateTime<Utc>) -> StepOutcome {
        self.channel_backoff.retain(|_, until| *until > now);

        let backoff = &self.channel_backoff;
        let Some(mut item) = self.queue.claim(now, |channel| backoff.contains_key(channel)) else {
            return StepOutcome::Idle {
                next_due: self.queue.next_due(|channel| backoff.get(channel).copied()),
            };
        };

        let text = self.formatter.format(&item.event);
        match self.send(&item.channel, text) {
            Ok(()) => {
                log::info!(
                    "Delivered event {} ({}) to #{}",
                    item.event.id,
                    item.event.dedupe_key,
                    item.channel
                );
                let mut stats = self.status.lock();
                stats.delivered += 1;
                stats.last_success_at = Some(now);
                StepOutcome::Delivered
            }
            Err(SendError::RateLimited { retry_after }) => {
                let until = after(now, retry_after);
                log::warn!(
                    "Channel #{} rate limited for {:?}; holding event {}",
                    item.channel,
                    retry_after,
                    item.event.id
                );
                self.channel_backoff.insert(item.channel.clone(), until);
                self.status.lock().rate_limited += 1;

                let channel = item.channel.clone();
                item.defer_until(until);
                self.queue.requeue(item);
                StepOutcome::RateLimited { channel, until }
            }
            Err(SendError::Transient(reason)) => {
                item.attempt_count += 1;
                if item.attempt_count >= self.policy.max_attempts {
                    log::error!(
                        "Giving up on event {} to #{} after {} attempts: {}",
                        item.event.id,
                        item.channel,
                        item.attempt_count,
                        reason
                    );
                    self.status.lock().failed += 1;
                    return StepOutcome::FailedPermanent;
                }

                let delay = self.policy.backoff(item.attempt_count);
                let at = after(now, delay);
                log::warn!(
                    "Delivery of event {} to #{} failed (attempt {}/{}): {}; retrying in {:?}",
                    item.event.id,
                    item.channel,
                    item.attempt_count,
                    self.policy.max_attempts,
                    reason,
                    delay
                );
                self.status.lock().retried += 1;
                item.defer_until(at);
                self.queue.requeue(item);
                StepOutcome::RetryScheduled { at }
            }
            Err(SendError::Permanent(reason)) => {
                log::error!(
                    "Dropping event {} to #{}: {}",
                    item.event.id,
                    item.channel,
                    reason
                );
                self.status.lock().failed += 1;
                StepOutcome::FailedPermanent
            }
        }
    }

    /// Drain the queue until it is closed
    ///
    /// Items still queued at close are abandoned.
    pub fn run(mut self, clock: &dyn Clock) {
        log::info!("Delivery worker started (notifier: {})", self.notifier.name());

        while !self.queue.is_closed() {
            if let StepOutcome::Idle { next_due } = self.step(clock.now()) {
                let timeout = next_due.map(|due| (due - clock.now()).to_std().unwrap_or(Duration::ZERO));
                if self.queue.wait(timeout) {
                    break;
                }
            }
        }

        let abandoned = self.queue.len();
        if abandoned > 0 {
            log::warn!("Delivery worker stopped; abandoning {} queued item(s)", abandoned);
        } else {
            log::info!("Delivery worker stopped");
        }
    }

    /// Run on a dedicated thread
    pub fn spawn(self, clock: Arc<dyn Clock>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("herald-worker".into())
            .spawn(move || self.run(clock.as_ref()))
    }

    fn send(&self, channel: &ChannelId, text: String) -> Result<(), SendError> {
        let Some(timeout) = self.policy.send_timeout else {
            return self.notifier.send(channel, &text);
        };

        let (tx, rx) = mpsc::channel();
        let notifier = Arc::clone(&self.notifier);
        let target = channel.clone();
        thread::Builder::new()
            .name("herald-send".into())
            .spawn(move || {
                // Receiver may already have timed out
                let _ = tx.send(notifier.send(&target, &text));
            })
            .map_err(|e| SendError::Transient(format!("failed to start sender: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SendError::Transient(format!(
                "send timed out after {:?}",
                timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SendError::Transient("sender thread panicked".into()))
            }
        }
    }

}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::dispatch::QueuedItem;
    use crate::domain::{Event, EventSource, Severity};
    use crate::mock::ScriptedNotifier;
    use chrono::TimeZone;
    use std::time::Instant;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn inline_policy() -> RetryPolicy {
        RetryPolicy {
            send_timeout: None,
            ..Default::default()
        }
    }

    fn enqueue(queue: &DispatchQueue, category: &str, channel: &str) {
        let event = Event::builder(EventSource::ExternalReport, "test", category)
            .severity(Severity::Warning)
            .build(t(0));
        queue
            .enqueue(QueuedItem::new(event, ChannelId::new(channel), t(0)))
            .unwrap();
    }

    fn worker(queue: &Arc<DispatchQueue>, notifier: &Arc<ScriptedNotifier>) -> DeliveryWorker {
        DeliveryWorker::new(Arc::clone(queue), notifier.clone(), inline_policy())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_successful_delivery() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        let mut worker = worker(&queue, &notifier);
        enqueue(&queue, "deployment", "status");

        assert_eq!(worker.step(t(0)), StepOutcome::Delivered);
        assert!(queue.is_empty());
        assert_eq!(notifier.sent_to("status").len(), 1);

        let stats = worker.status().snapshot();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.last_success_at, Some(t(0)));
        assert_eq!(worker.step(t(1)), StepOutcome::Idle { next_due: None });
    }

    #[test]
    fn test_rate_limit_blocks_only_that_channel() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        notifier.push(
            "status",
            Err(SendError::RateLimited {
                retry_after: Duration::from_secs(30),
            }),
        );
        let mut worker = worker(&queue, &notifier);
        enqueue(&queue, "deployment", "status");
        enqueue(&queue, "news", "news");

        assert_eq!(
            worker.step(t(0)),
            StepOutcome::RateLimited {
                channel: ChannelId::new("status"),
                until: t(30)
            }
        );
        assert_eq!(worker.blocked_until(&ChannelId::new("status")), Some(t(30)));

        // Other channel keeps flowing
        assert_eq!(worker.step(t(0)), StepOutcome::Delivered);
        assert_eq!(notifier.sent_to("news").len(), 1);

        assert_eq!(worker.step(t(10)), StepOutcome::Idle { next_due: Some(t(30)) });
        assert_eq!(notifier.sent_to("status").len(), 1);

        assert_eq!(worker.step(t(30)), StepOutcome::Delivered);
        assert_eq!(notifier.sent_to("status").len(), 2);

        let stats = worker.status().snapshot();
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.retried, 0);
    }

    #[test]
    fn test_rate_limit_does_not_consume_attempts() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        for _ in 0..6 {
            notifier.push(
                "status",
                Err(SendError::RateLimited {
                    retry_after: Duration::from_secs(1),
                }),
            );
        }
        let mut worker = worker(&queue, &notifier);
        enqueue(&queue, "deployment", "status");

        for i in 0..6 {
            assert!(matches!(worker.step(t(i)), StepOutcome::RateLimited { .. }));
        }
        assert_eq!(worker.step(t(6)), StepOutcome::Delivered);
        assert_eq!(worker.status().snapshot().failed, 0);
    }

    #[test]
    fn test_transient_failures_exhaust_retries() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        for _ in 0..5 {
            notifier.push("status", Err(SendError::Transient("503".into())));
        }
        let mut worker = worker(&queue, &notifier);
        enqueue(&queue, "deployment", "status");

        assert_eq!(worker.step(t(0)), StepOutcome::RetryScheduled { at: t(1) });
        assert_eq!(worker.step(t(0)), StepOutcome::Idle { next_due: Some(t(1)) });
        assert_eq!(worker.step(t(1)), StepOutcome::RetryScheduled { at: t(3) });
        assert_eq!(worker.step(t(3)), StepOutcome::RetryScheduled { at: t(7) });
        assert_eq!(worker.step(t(7)), StepOutcome::RetryScheduled { at: t(15) });
        assert_eq!(worker.step(t(15)), StepOutcome::FailedPermanent);

        // Never retried again
        assert!(queue.is_empty());
        assert_eq!(worker.step(t(100)), StepOutcome::Idle { next_due: None });
        assert_eq!(notifier.sent_to("status").len(), 5);

        let stats = worker.status().snapshot();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 4);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_retry_keeps_original_order() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        notifier.push("status", Err(SendError::Transient("503".into())));
        let mut worker = worker(&queue, &notifier);
        enqueue(&queue, "first", "status");
        enqueue(&queue, "second", "status");

        assert!(matches!(worker.step(t(0)), StepOutcome::RetryScheduled { .. }));
        // "second" is due now while "first" waits
        assert_eq!(worker.step(t(0)), StepOutcome::Delivered);
        assert_eq!(worker.step(t(1)), StepOutcome::Delivered);

        let sent = notifier.sent_to("status");
        assert!(sent[1].contains("second"));
        assert!(sent[2].contains("first"));
    }

    /// Fills the queue from inside `send`, as a producer racing the worker would
    struct RefillingNotifier {
        queue: Arc<DispatchQueue>,
    }

    impl Notifier for RefillingNotifier {
        fn send(&self, _channel: &ChannelId, _text: &str) -> Result<(), SendError> {
            enqueue(&self.queue, "late", "status");
            Err(SendError::Transient("503".into()))
        }

        fn name(&self) -> &str {
            "refilling"
        }
    }

    #[test]
    fn test_retry_survives_queue_refilled_during_send() {
        let queue = Arc::new(DispatchQueue::new(1));
        let notifier = Arc::new(RefillingNotifier {
            queue: Arc::clone(&queue),
        });
        let mut worker = DeliveryWorker::new(Arc::clone(&queue), notifier, inline_policy());
        enqueue(&queue, "retry", "status");

        assert_eq!(worker.step(t(0)), StepOutcome::RetryScheduled { at: t(1) });

        let stats = queue.stats();
        assert_eq!(stats.depth, 2);
        assert_eq!(stats.dropped, 0);
        let retried = queue.claim(t(1), |_| false).unwrap();
        assert_eq!(retried.event.category, "retry");
        assert_eq!(retried.attempt_count, 1);
    }

    #[test]
    fn test_permanent_failure_drops_item() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        notifier.push("gone", Err(SendError::Permanent("unknown channel".into())));
        let mut worker = worker(&queue, &notifier);
        enqueue(&queue, "deployment", "gone");

        assert_eq!(worker.step(t(0)), StepOutcome::FailedPermanent);
        assert!(queue.is_empty());
        assert_eq!(worker.status().snapshot().failed, 1);
    }

    #[test]
    fn test_send_timeout_is_transient() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new().with_latency(Duration::from_millis(500)));
        let policy = RetryPolicy {
            send_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let mut worker = DeliveryWorker::new(Arc::clone(&queue), notifier, policy);
        enqueue(&queue, "deployment", "status");

        assert_eq!(worker.step(t(0)), StepOutcome::RetryScheduled { at: t(1) });
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_spawned_worker_drains_and_stops() {
        let queue = Arc::new(DispatchQueue::new(10));
        let notifier = Arc::new(ScriptedNotifier::new());
        let worker = DeliveryWorker::new(Arc::clone(&queue), notifier.clone(), RetryPolicy::default());
        let status = worker.status();
        let handle = worker.spawn(Arc::new(SystemClock)).unwrap();

        enqueue(&queue, "deployment", "status");
        let started = Instant::now();
        while status.snapshot().delivered == 0 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(status.snapshot().delivered, 1);

        queue.close();
        handle.join().unwrap();
    }
}
