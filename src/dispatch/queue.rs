//! Bounded dispatch queue
//!
//! FIFO buffer between producers and the delivery worker. Producers never
//! block: when the queue is full the oldest item of the lowest severity
//! present is evicted to make room, provided that severity is strictly lower
//! than the incoming item's. Otherwise the incoming item is dropped. Under
//! sustained overload informational events therefore degrade first and
//! critical alerts are never starved by a backlog of low-severity ones.

use crate::domain::{ChannelId, Event};
use crate::error::QueueFullError;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// An event bound for a destination channel
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedItem {
    /// Event to deliver
    pub event: Event,
    /// Destination channel
    pub channel: ChannelId,
    /// When the item first entered the queue
    pub enqueued_at: DateTime<Utc>,
    /// Delivery attempts that consumed retry budget
    pub attempt_count: u32,
    seq: u64,
    not_before: DateTime<Utc>,
}

impl QueuedItem {
    /// Create an item ready for immediate delivery
    pub fn new(event: Event, channel: ChannelId, now: DateTime<Utc>) -> Self {
        Self {
            event,
            channel,
            enqueued_at: now,
            attempt_count: 0,
            seq: 0,
            not_before: now,
        }
    }

    /// Earliest time the item may be attempted
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Position in original enqueue order
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Defer the next attempt until `at`
    pub fn defer_until(&mut self, at: DateTime<Utc>) {
        self.not_before = at;
    }
}

/// Successful enqueue outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    /// Item added without displacing anything
    Accepted,
    /// Item added after evicting a lower-severity item
    Evicted(Box<QueuedItem>),
}

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items currently queued
    pub depth: usize,
    /// Incoming items dropped because the queue was full
    pub dropped: u64,
    /// Queued items evicted for a higher-severity arrival
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<QueuedItem>,
    next_seq: u64,
    notified: bool,
    closed: bool,
    dropped: u64,
    evicted: u64,
}

/// Bounded, ordered, thread-safe dispatch queue
#[derive(Debug)]
pub struct DispatchQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
    capacity: usize,
}

impl DispatchQueue {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Add a new item at the back of the queue
    pub fn enqueue(&self, mut item: QueuedItem) -> Result<Enqueued, QueueFullError> {
        let mut inner = self.lock();
        item.seq = inner.next_seq;
        inner.next_seq += 1;
        let outcome = self.insert(&mut inner, item);
        if outcome.is_ok() {
            inner.notified = true;
            self.ready.notify_one();
        }
        outcome
    }

    /// Return a previously claimed item to its original position
    ///
    /// The item kept its slot while in flight, so it is reinserted even if
    /// producers filled the queue in the meantime. Depth can therefore exceed
    /// capacity by the number of items in flight.
    pub fn requeue(&self, item: QueuedItem) {
        let mut inner = self.lock();
        Self::place(&mut inner, item);
        inner.notified = true;
        self.ready.notify_one();
    }

    /// Remove and return the first item that is due and whose channel is not blocked
    pub fn claim<F>(&self, now: DateTime<Utc>, is_blocked: F) -> Option<QueuedItem>
    where
        F: Fn(&ChannelId) -> bool,
    {
        let mut inner = self.lock();
        let idx = inner
            .items
            .iter()
            .position(|item| item.not_before <= now && !is_blocked(&item.channel))?;
        inner.items.remove(idx)
    }

    /// Earliest instant at which some queued item becomes claimable
    ///
    /// `blocked_until` reports a channel's backoff deadline, if any.
    pub fn next_due<F>(&self, blocked_until: F) -> Option<DateTime<Utc>>
    where
        F: Fn(&ChannelId) -> Option<DateTime<Utc>>,
    {
        let inner = self.lock();
        inner
            .items
            .iter()
            .map(|item| match blocked_until(&item.channel) {
                Some(until) if until > item.not_before => until,
                _ => item.not_before,
            })
            .min()
    }

    /// Block until new work arrives, the queue is closed, or `timeout` passes
    ///
    /// Returns `true` if the queue has been closed.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut inner = self.lock();
        if !inner.notified && !inner.closed {
            inner = match timeout {
                Some(timeout) => {
                    self.ready
                        .wait_timeout_while(inner, timeout, |i| !i.notified && !i.closed)
                        .expect("dispatch queue mutex poisoned")
                        .0
                }
                None => self
                    .ready
                    .wait_while(inner, |i| !i.notified && !i.closed)
                    .expect("dispatch queue mutex poisoned"),
            };
        }
        inner.notified = false;
        inner.closed
    }

    /// Close the queue and wake the consumer
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        self.ready.notify_all();
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the queue counters
    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();
        QueueStats {
            depth: inner.items.len(),
            dropped: inner.dropped,
            evicted: inner.evicted,
        }
    }

    fn insert(
        &self,
        inner: &mut QueueInner,
        item: QueuedItem,
    ) -> Result<Enqueued, QueueFullError> {
        let mut outcome = Enqueued::Accepted;

        if inner.items.len() >= self.capacity {
            let lowest = inner.items.iter().map(|i| i.event.severity).min();
            let victim = match lowest {
                Some(low) if low < item.event.severity => inner
                    .items
                    .iter()
                    .position(|i| i.event.severity == low),
                _ => None,
            };

            match victim.and_then(|idx| inner.items.remove(idx)) {
                Some(evicted) => {
                    inner.evicted += 1;
                    outcome = Enqueued::Evicted(Box::new(evicted));
                }
                None => {
                    inner.dropped += 1;
                    return Err(QueueFullError {
                        capacity: self.capacity,
                        event_id: item.event.id.as_u64(),
                    });
                }
            }
        }

        Self::place(inner, item);
        Ok(outcome)
    }

    fn place(inner: &mut QueueInner, item: QueuedItem) {
        let pos = inner.items.partition_point(|queued| queued.seq < item.seq);
        inner.items.insert(pos, item);
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // Poisoning is fatal: the item list may be half-updated.
        self.inner.lock().expect("dispatch queue mutex poisoned")
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
