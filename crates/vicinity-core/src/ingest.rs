//! Producer pool and the fan-in conduit.
//!
//! [`ProducerPool::spawn`] starts one task per producer plus a single
//! conduit task. Producers generate batches on a fixed cadence and push
//! them into a bounded channel; the conduit is the channel's only consumer
//! and appends every batch it receives to the [`EventStore`], unchanged and
//! in arrival order.
//!
//! # Concurrency
//!
//! - At most `max_concurrent_producers` producers generate or send at the
//!   same time. A [`Semaphore`] hands out permits; the rest wait.
//! - Every suspension point (cadence tick, permit, blocking send) is raced
//!   against [`ControlState::stopped`], so a stop request is honored within
//!   one scheduling step.
//! - Each producer id gets its own task. Tasks that are waiting for a
//!   cadence step or a permit hold no batch and cost only their stack
//!   state, so a large `producer_count` is memory-bound, not CPU-bound. The
//!   permit cap is what bounds concurrent generation and sending.
//! - When the channel is full, [`OverflowPolicy::Block`] waits for capacity
//!   and [`OverflowPolicy::Drop`] discards the batch. Either way every batch
//!   that was offered ends up counted as appended or dropped in
//!   [`IngestStats`]; nothing disappears silently.
//!
//! # Shutdown
//!
//! [`IngestHandle::shutdown`] requests a stop, waits for every producer to
//! exit (dropping its sender), then waits for the conduit to drain what is
//! still buffered. Data accepted by the channel is always appended.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};
use vicinity_events::EventStore;
use vicinity_types::{EventBatch, UserId};

use crate::clock::{Clock, SystemClock};
use crate::config::{IngestConfig, OverflowPolicy};
use crate::control::ControlState;
use crate::source::EventSource;

/// Errors from the ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The conduit went away while a producer was still sending.
    #[error("ingestion channel closed while producer {producer} was sending")]
    ChannelClosed {
        /// The producer whose send failed.
        producer: UserId,
    },

    /// The ingest configuration cannot be run.
    #[error("invalid ingest configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A producer or conduit task panicked or was cancelled.
    #[error("ingest task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Live counters shared by producers and the conduit.
///
/// "Sent" counts every non-empty batch a producer offered to the conduit.
/// Each sent batch is eventually counted exactly once more, as appended or
/// as dropped.
#[derive(Debug, Default)]
pub struct IngestStats {
    batches_sent: AtomicU64,
    events_sent: AtomicU64,
    batches_appended: AtomicU64,
    events_appended: AtomicU64,
    batches_dropped: AtomicU64,
    events_dropped: AtomicU64,
}

impl IngestStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_sent(&self, events: u64) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.events_sent.fetch_add(events, Ordering::Relaxed);
    }

    fn record_appended(&self, events: u64) {
        self.batches_appended.fetch_add(1, Ordering::Relaxed);
        self.events_appended.fetch_add(events, Ordering::Relaxed);
    }

    fn record_dropped(&self, events: u64) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.events_dropped.fetch_add(events, Ordering::Relaxed);
    }

    /// Read all counters.
    ///
    /// While the pipeline runs the values may be mid-update relative to each
    /// other; after [`IngestHandle::shutdown`] they are final.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            batches_appended: self.batches_appended.load(Ordering::Relaxed),
            events_appended: self.events_appended.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// A plain copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    /// Batches offered to the conduit.
    pub batches_sent: u64,
    /// Events offered to the conduit.
    pub events_sent: u64,
    /// Batches appended to the store.
    pub batches_appended: u64,
    /// Events appended to the store.
    pub events_appended: u64,
    /// Batches discarded (full channel, shutdown, or store failure).
    pub batches_dropped: u64,
    /// Events discarded.
    pub events_dropped: u64,
}

impl IngestStatsSnapshot {
    /// Whether every sent event is accounted for as appended or dropped.
    pub const fn is_conserved(&self) -> bool {
        self.events_appended.saturating_add(self.events_dropped) == self.events_sent
            && self.batches_appended.saturating_add(self.batches_dropped) == self.batches_sent
    }
}

// ---------------------------------------------------------------------------
// Conduit
// ---------------------------------------------------------------------------

/// Append every received batch until all senders are gone.
async fn run_conduit(
    mut receiver: mpsc::Receiver<EventBatch>,
    store: Arc<EventStore>,
    stats: Arc<IngestStats>,
) {
    while let Some(batch) = receiver.recv().await {
        let events = event_count(batch.len());
        let batch_id = batch.id;
        let producer = batch.producer;
        match store.append_batch(batch).await {
            Ok(_) => stats.record_appended(events),
            Err(e) => {
                // The store is unchanged; the batch is lost but accounted for.
                error!(
                    batch_id = %batch_id,
                    producer = %producer,
                    error = %e,
                    "Append failed, batch dropped"
                );
                stats.record_dropped(events);
            }
        }
    }
    debug!("Conduit drained, all producers gone");
}

// ---------------------------------------------------------------------------
// Producers
// ---------------------------------------------------------------------------

fn event_count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

/// What happened to one cadence step.
enum Delivery {
    Skipped,
    Sent,
    Dropped,
    Stopped,
    Closed,
}

struct Producer<S> {
    id: UserId,
    source: S,
    sender: mpsc::Sender<EventBatch>,
    permits: Arc<Semaphore>,
    control: Arc<ControlState>,
    clock: Arc<dyn Clock>,
    stats: Arc<IngestStats>,
    policy: OverflowPolicy,
    emit_interval: Duration,
}

impl<S: EventSource> Producer<S> {
    /// Emit on every cadence step until stopped. Returns the number of
    /// batches the channel accepted.
    async fn run(mut self) -> Result<u64, IngestError> {
        let mut cadence = tokio::time::interval(self.emit_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut delivered: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = self.control.stopped() => break,
                _ = cadence.tick() => {}
            }

            if self.control.is_paused() {
                self.control.wait_if_paused().await;
                // Emit once on resume, then a full period before the next step.
                cadence.reset();
            }
            if self.control.is_stop_requested() {
                break;
            }

            let permit = tokio::select! {
                biased;
                () = self.control.stopped() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // Closed semaphore: the pool is gone.
                    Err(_) => break,
                },
            };

            match self.emit(permit).await {
                Delivery::Sent => delivered = delivered.saturating_add(1),
                Delivery::Skipped | Delivery::Dropped => {}
                Delivery::Stopped => break,
                Delivery::Closed => {
                    error!(producer = %self.id, "Conduit closed, producer exiting");
                    return Err(IngestError::ChannelClosed { producer: self.id });
                }
            }
        }

        trace!(producer = %self.id, delivered, "Producer stopped");
        Ok(delivered)
    }

    /// Generate one batch and hand it to the conduit while holding `permit`.
    async fn emit(&mut self, permit: OwnedSemaphorePermit) -> Delivery {
        let now = self.clock.now();
        let events = self.source.next_batch(self.id, now);
        if events.is_empty() {
            drop(permit);
            return Delivery::Skipped;
        }

        let batch = EventBatch::new(self.id, now, events);
        let count = event_count(batch.len());
        let batch_id = batch.id;
        self.stats.record_sent(count);

        let delivery = match self.policy {
            OverflowPolicy::Drop => match self.sender.try_send(batch) {
                Ok(()) => Delivery::Sent,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        producer = %self.id,
                        batch_id = %batch_id,
                        events = count,
                        "Channel full, batch dropped"
                    );
                    self.stats.record_dropped(count);
                    Delivery::Dropped
                }
                Err(TrySendError::Closed(_)) => {
                    self.stats.record_dropped(count);
                    Delivery::Closed
                }
            },
            OverflowPolicy::Block => tokio::select! {
                biased;
                sent = self.sender.send(batch) => match sent {
                    Ok(()) => Delivery::Sent,
                    Err(_) => {
                        self.stats.record_dropped(count);
                        Delivery::Closed
                    }
                },
                () = self.control.stopped() => {
                    warn!(
                        producer = %self.id,
                        batch_id = %batch_id,
                        events = count,
                        "Stopped while waiting for channel capacity, batch dropped"
                    );
                    self.stats.record_dropped(count);
                    Delivery::Stopped
                }
            },
        };
        drop(permit);
        delivery
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Builder for the producer tasks and the conduit.
#[derive(Debug)]
pub struct ProducerPool {
    config: IngestConfig,
    store: Arc<EventStore>,
    control: Arc<ControlState>,
    clock: Arc<dyn Clock>,
}

impl ProducerPool {
    /// Create a pool that timestamps events with the system clock.
    pub fn new(config: IngestConfig, store: Arc<EventStore>, control: Arc<ControlState>) -> Self {
        Self {
            config,
            store,
            control,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for event timestamps instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn check_config(&self) -> Result<(), IngestError> {
        let invalid = |reason: &str| {
            Err(IngestError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };
        if self.config.producer_count == 0 {
            return invalid("producer_count must be at least 1");
        }
        if self.config.max_concurrent_producers == 0 {
            return invalid("max_concurrent_producers must be at least 1");
        }
        if self.config.channel_capacity == 0 {
            return invalid("channel_capacity must be at least 1");
        }
        if self.config.emit_interval_ms == 0 {
            return invalid("emit_interval_ms must be at least 1");
        }
        if self.config.batch_size.min > self.config.batch_size.max {
            return invalid("batch_size.min exceeds batch_size.max");
        }
        Ok(())
    }

    /// Start the conduit and one producer per configured producer id.
    ///
    /// Producer `i` emits on behalf of `UserId(i)`, with a source built by
    /// `make_source`. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidConfig`] if the configuration has a
    /// zero count, capacity, concurrency cap or interval, or an inverted
    /// batch size range. Nothing is spawned in that case.
    pub fn spawn<F, S>(self, mut make_source: F) -> Result<IngestHandle, IngestError>
    where
        F: FnMut(UserId) -> S,
        S: EventSource + 'static,
    {
        self.check_config()?;

        let stats = Arc::new(IngestStats::new());
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity);
        let conduit = tokio::spawn(run_conduit(
            receiver,
            Arc::clone(&self.store),
            Arc::clone(&stats),
        ));

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_producers));
        let emit_interval = Duration::from_millis(self.config.emit_interval_ms);
        let mut producers = JoinSet::new();
        for index in 0..self.config.producer_count {
            let id = UserId(index);
            let producer = Producer {
                id,
                source: make_source(id),
                sender: sender.clone(),
                permits: Arc::clone(&permits),
                control: Arc::clone(&self.control),
                clock: Arc::clone(&self.clock),
                stats: Arc::clone(&stats),
                policy: self.config.overflow_policy,
                emit_interval,
            };
            producers.spawn(producer.run());
        }
        // Only producers hold senders now; the conduit ends when they all exit.
        drop(sender);

        info!(
            producers = self.config.producer_count,
            max_concurrent = self.config.max_concurrent_producers,
            channel_capacity = self.config.channel_capacity,
            emit_interval_ms = self.config.emit_interval_ms,
            overflow_policy = ?self.config.overflow_policy,
            "Ingestion started"
        );

        Ok(IngestHandle {
            producers,
            conduit,
            stats,
            control: self.control,
        })
    }
}

/// Handle to a running ingestion pipeline.
#[derive(Debug)]
pub struct IngestHandle {
    producers: JoinSet<Result<u64, IngestError>>,
    conduit: JoinHandle<()>,
    stats: Arc<IngestStats>,
    control: Arc<ControlState>,
}

impl IngestHandle {
    /// Current counter values.
    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of producer tasks still running.
    pub fn running_producers(&self) -> usize {
        self.producers.len()
    }

    /// Stop all producers, drain the conduit, and return final counters.
    ///
    /// A producer that failed is logged and does not prevent the drain.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Join`] if a producer or the conduit panicked.
    /// The drain still completes before the error is returned.
    pub async fn shutdown(mut self) -> Result<IngestStatsSnapshot, IngestError> {
        self.control.request_stop();

        let mut first_panic: Option<tokio::task::JoinError> = None;
        let mut failed: usize = 0;
        while let Some(joined) = self.producers.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    failed = failed.saturating_add(1);
                    warn!(error = %e, "Producer ended with an error");
                }
                Err(e) => {
                    failed = failed.saturating_add(1);
                    error!(error = %e, "Producer task failed");
                    first_panic.get_or_insert(e);
                }
            }
        }

        // Every sender is gone, so the conduit finishes once the buffer drains.
        self.conduit.await?;

        let stats = self.stats.snapshot();
        info!(
            batches_sent = stats.batches_sent,
            events_sent = stats.events_sent,
            events_appended = stats.events_appended,
            events_dropped = stats.events_dropped,
            failed_producers = failed,
            "Ingestion stopped"
        );

        match first_panic {
            Some(source) => Err(IngestError::Join { source }),
            None => Ok(stats),
        }
    }
}
