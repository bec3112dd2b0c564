//! Sharded in-process delivery queue with bounded retries.
//!
//! [`DeliveryQueue`] sits between producers that detect terminal phases and
//! the [`ChannelDispatcher`]. Events are routed to one of `workers` bounded
//! channels by hashing their [`RuleKey`], so:
//!
//! - events for the same rule are delivered in arrival order;
//! - different rules and executions proceed in parallel with no ordering
//!   guarantee between them;
//! - enqueueing only waits for channel capacity, never for transport I/O.
//!
//! Each recipient is delivered independently: a transient failure is retried
//! with back-off per [`RetrySchedule`]; a non-retryable failure or an
//! exhausted retry budget is recorded on the [`DeadLetterSink`]. Once an
//! event is accepted it is delivered or dead-lettered; there is no
//! cancellation of an in-flight notification.
//!
//! A rule is marked as fired only once its event holds a reserved slot, so a
//! caller that abandons [`DeliveryQueue::enqueue`] while it waits for
//! capacity leaves the rule free to fire on the next offer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use notifications::{
    DeadLetter, DeadLetterReason, DeadLetterSink, DeliveryConfig, ExecutionId, ExecutionPhase,
    NotificationEvent, NotifyError, OutboundMessage, PhaseTransition, RetrySchedule, RuleKey,
    Timestamp,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::dispatcher::ChannelDispatcher;
use crate::ledger::FiredLedger;
use crate::stats::{Counter, DeliveryStats, StatsCounters};

// ---------------------------------------------------------------------------
// Options and errors
// ---------------------------------------------------------------------------

/// Sizing and retry behaviour of a [`DeliveryQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// Number of worker tasks, one per shard.
    pub workers: usize,
    /// Buffered events per shard.
    pub capacity: usize,
    /// Fired-ledger size; see [`DeliveryConfig::fired_ledger_capacity`].
    pub fired_ledger_capacity: usize,
    pub retry: RetrySchedule,
}

impl QueueOptions {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            workers: config.workers,
            capacity: config.queue_capacity,
            fired_ledger_capacity: config.fired_ledger_capacity,
            retry: config.retry_schedule(),
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

/// Errors returned to producers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// [`DeliveryQueue::shutdown`] has been called.
    #[error("delivery queue is shut down")]
    Closed,

    /// The shard for this event is at capacity (only from `try_enqueue`).
    #[error("delivery queue shard {shard} is full")]
    Full { shard: usize },
}

/// Result of offering an event to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The rule already fired for this execution and phase.
    Duplicate,
}

type FiredKey = (ExecutionId, ExecutionPhase, RuleKey);

// ---------------------------------------------------------------------------
// DeliveryQueue
// ---------------------------------------------------------------------------

/// Producer handle to the delivery queue. Cheap to clone; every clone feeds
/// the same workers.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    /// `None` once shut down.
    shards: RwLock<Option<Vec<mpsc::Sender<NotificationEvent>>>>,
    /// (execution, phase, rule) triples that have already produced an event.
    fired: Mutex<FiredLedger<FiredKey>>,
    stats: Arc<StatsCounters>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryQueue {
    /// Spawns the worker tasks and returns the producer handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        dispatcher: Arc<ChannelDispatcher>,
        dead_letters: Arc<dyn DeadLetterSink>,
        options: QueueOptions,
    ) -> Self {
        let shard_count = options.workers.max(1);
        let capacity = options.capacity.max(1);
        let stats = Arc::new(StatsCounters::default());

        let mut senders = Vec::with_capacity(shard_count);
        let mut handles = Vec::with_capacity(shard_count);
        for shard in 0..shard_count {
            let (tx, rx) = mpsc::channel(capacity);
            let worker = Worker {
                shard,
                dispatcher: Arc::clone(&dispatcher),
                dead_letters: Arc::clone(&dead_letters),
                retry: options.retry.clone(),
                stats: Arc::clone(&stats),
            };
            handles.push(tokio::spawn(worker.run(rx)));
            senders.push(tx);
        }

        tracing::info!(
            workers = shard_count,
            capacity,
            max_attempts = options.retry.max_attempts,
            "Delivery queue started"
        );

        Self {
            inner: Arc::new(QueueInner {
                shards: RwLock::new(Some(senders)),
                fired: Mutex::new(FiredLedger::new(options.fired_ledger_capacity)),
                stats,
                workers: tokio::sync::Mutex::new(handles),
            }),
        }
    }

    /// Matches `transition` against its rules and enqueues one event per
    /// matching rule that has not fired yet.
    ///
    /// Returns the number of events queued; zero when nothing matched.
    pub async fn submit(&self, transition: &PhaseTransition) -> Result<usize, QueueError> {
        let events = transition.events();
        if events.is_empty() {
            tracing::debug!(
                execution = %transition.execution.id,
                phase = %transition.execution.phase,
                "No notification rule matches"
            );
            return Ok(0);
        }

        let mut queued = 0;
        for event in events {
            if self.enqueue(event).await? == EnqueueOutcome::Queued {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Enqueues one event, waiting for shard capacity if necessary.
    ///
    /// Cancel-safe: if the returned future is dropped before it completes,
    /// the event is not queued and its rule is not marked as fired.
    pub async fn enqueue(&self, event: NotificationEvent) -> Result<EnqueueOutcome, QueueError> {
        let key = fired_key(&event);
        if self.has_fired(&key) {
            self.note_duplicate(&event);
            return Ok(EnqueueOutcome::Duplicate);
        }

        let Some((_, sender)) = self.shard_for(&event.rule_key) else {
            return Err(QueueError::Closed);
        };
        let permit = sender.reserve().await.map_err(|_| QueueError::Closed)?;

        // Another producer may have offered the same rule while we waited.
        if !self.mark_fired(&key) {
            self.note_duplicate(&event);
            return Ok(EnqueueOutcome::Duplicate);
        }
        permit.send(event);
        self.inner.stats.bump(Counter::Enqueued);
        Ok(EnqueueOutcome::Queued)
    }

    /// Enqueues one event without waiting; fails with [`QueueError::Full`]
    /// when the shard is at capacity.
    pub fn try_enqueue(&self, event: NotificationEvent) -> Result<EnqueueOutcome, QueueError> {
        let key = fired_key(&event);
        if self.has_fired(&key) {
            self.note_duplicate(&event);
            return Ok(EnqueueOutcome::Duplicate);
        }

        let Some((shard, sender)) = self.shard_for(&event.rule_key) else {
            return Err(QueueError::Closed);
        };
        let permit = sender.try_reserve().map_err(|err| match err {
            mpsc::error::TrySendError::Full(()) => QueueError::Full { shard },
            mpsc::error::TrySendError::Closed(()) => QueueError::Closed,
        })?;

        if !self.mark_fired(&key) {
            self.note_duplicate(&event);
            return Ok(EnqueueOutcome::Duplicate);
        }
        permit.send(event);
        self.inner.stats.bump(Counter::Enqueued);
        Ok(EnqueueOutcome::Queued)
    }

    /// Current outcome counters.
    pub fn stats(&self) -> DeliveryStats {
        self.inner.stats.snapshot()
    }

    /// Stops accepting events and waits until every accepted event has been
    /// delivered or dead-lettered. Safe to call more than once.
    pub async fn shutdown(&self) {
        let closed = self
            .inner
            .shards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(closed);

        let handles = std::mem::take(&mut *self.inner.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Delivery worker terminated abnormally");
            }
        }
        tracing::info!(stats = ?self.stats(), "Delivery queue drained");
    }

    fn shard_for(&self, rule_key: &RuleKey) -> Option<(usize, mpsc::Sender<NotificationEvent>)> {
        let guard = self
            .inner
            .shards
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let senders = guard.as_ref()?;
        let mut hasher = DefaultHasher::new();
        rule_key.hash(&mut hasher);
        let shard = (hasher.finish() % senders.len() as u64) as usize;
        Some((shard, senders[shard].clone()))
    }

    fn has_fired(&self, key: &FiredKey) -> bool {
        self.inner
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Returns `false` if the key was already present.
    fn mark_fired(&self, key: &FiredKey) -> bool {
        self.inner
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone())
    }

    fn note_duplicate(&self, event: &NotificationEvent) {
        self.inner.stats.bump(Counter::Duplicate);
        tracing::debug!(
            execution = %event.execution.id,
            phase = %event.execution.phase,
            rule = %event.rule_key,
            "Rule already fired for this execution and phase"
        );
    }
}

fn fired_key(event: &NotificationEvent) -> FiredKey {
    (
        event.execution.id.clone(),
        event.execution.phase,
        event.rule_key.clone(),
    )
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    shard: usize,
    dispatcher: Arc<ChannelDispatcher>,
    dead_letters: Arc<dyn DeadLetterSink>,
    retry: RetrySchedule,
    stats: Arc<StatsCounters>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<NotificationEvent>) {
        while let Some(event) = rx.recv().await {
            let span = tracing::info_span!(
                "deliver",
                shard = self.shard,
                delivery_id = %event.delivery_id,
                execution = %event.execution.id,
                phase = %event.execution.phase,
                rule = %event.rule_key,
                channel = %event.rule.channel(),
            );
            self.process(&event).instrument(span).await;
        }
        tracing::debug!(shard = self.shard, "Delivery worker finished");
    }

    async fn process(&self, event: &NotificationEvent) {
        // Templates are parsed before the queue starts, so the only way
        // `prepare` fails is a channel with no transport.
        let messages = match self.dispatcher.prepare(event) {
            Ok(messages) => messages,
            Err(e) => {
                let error = match e {
                    NotifyError::Configuration { message } => message,
                    other => other.to_string(),
                };
                self.dead_letter(event, None, DeadLetterReason::Configuration, 0, error)
                    .await;
                return;
            }
        };

        for message in &messages {
            self.deliver(event, message).await;
        }
    }

    /// Sends one message, retrying transient failures.
    async fn deliver(&self, event: &NotificationEvent, message: &OutboundMessage) {
        let recipient = message.recipient().map(|r| r.as_str()).unwrap_or_default();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match self.dispatcher.send(message).await {
                Ok(()) => {
                    self.stats.bump(Counter::Delivered);
                    tracing::info!(recipient, attempts, "Notification delivered");
                    return;
                }
                Err(err) => err,
            };

            let policy = err.retry_policy();
            if !policy.is_retryable() {
                self.dead_letter(
                    event,
                    Some(message),
                    DeadLetterReason::Rejected,
                    attempts,
                    err.to_string(),
                )
                .await;
                return;
            }
            if !self.retry.allows_another(attempts) {
                self.dead_letter(
                    event,
                    Some(message),
                    DeadLetterReason::RetriesExhausted,
                    attempts,
                    err.to_string(),
                )
                .await;
                return;
            }

            let delay = self.retry.delay_after(attempts, policy);
            self.stats.bump(Counter::Retried);
            tracing::warn!(
                recipient,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Delivery attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn dead_letter(
        &self,
        event: &NotificationEvent,
        message: Option<&OutboundMessage>,
        reason: DeadLetterReason,
        attempts: u32,
        error: String,
    ) {
        self.stats.bump(Counter::DeadLettered);
        let letter = DeadLetter {
            delivery_id: event.delivery_id,
            execution_id: event.execution.id.clone(),
            phase: event.execution.phase,
            rule_key: event.rule_key.clone(),
            channel: event.rule.channel(),
            recipient: message.and_then(|m| m.recipient().cloned()),
            reason,
            attempts,
            error,
            recorded_at: Timestamp::now(),
        };
        if let Err(e) = self.dead_letters.record(&letter).await {
            tracing::error!(
                error = %e,
                dead_letter = ?letter,
                "Failed to record dead letter"
            );
        }
    }
}
