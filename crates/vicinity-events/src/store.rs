//! The shared, append-only event accumulator.
//!
//! [`EventStore`] is the only shared mutable collection in the pipeline.
//! All mutation goes through [`EventStore::append`] under a single write
//! lock, and each call adds one whole batch, so a batch is either fully
//! visible to readers or not at all.
//!
//! The batch list lives behind an `Arc`. A snapshot clones that `Arc` under
//! the read lock and leaves; the next append copies the list of batch
//! handles (never the events) if a snapshot still references the old one.
//! Readers therefore wait at most for one in-flight push, and a long ranking
//! scan never holds the lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, trace};
use vicinity_types::{ContentEvent, EventBatch};

use crate::error::StoreError;
use crate::snapshot::{BatchList, EventSnapshot};

/// Mutable state guarded by the store's lock.
#[derive(Debug, Default)]
struct StoreInner {
    /// Sealed batches in append order.
    batches: Arc<BatchList>,
    /// Total events across all batches.
    len: usize,
    /// Number of non-empty appends accepted.
    version: u64,
}

/// Concurrency-safe accumulator of content events.
///
/// Share it as `Arc<EventStore>`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct EventStore {
    inner: RwLock<StoreInner>,
    /// Mirror of `inner.len` for lock-free progress reporting.
    len_hint: AtomicUsize,
    /// Number of sealed batches, read without the lock.
    batch_hint: AtomicUsize,
}

impl EventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically append a batch of events.
    ///
    /// Returns the total number of stored events after the append. An empty
    /// batch is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CountOverflow`] if the running count would
    /// overflow. The store is left unchanged in that case.
    pub async fn append(&self, events: Vec<ContentEvent>) -> Result<usize, StoreError> {
        let adding = events.len();
        let mut inner = self.inner.write().await;
        if adding == 0 {
            return Ok(inner.len);
        }

        let new_len = inner
            .len
            .checked_add(adding)
            .ok_or(StoreError::CountOverflow {
                current: inner.len,
                adding,
            })?;

        let sealed: Arc<[ContentEvent]> = Arc::from(events);
        let batches = Arc::make_mut(&mut inner.batches);
        batches.push(sealed);
        self.batch_hint.store(batches.len(), Ordering::Release);
        inner.len = new_len;
        inner.version = inner.version.saturating_add(1);
        self.len_hint.store(new_len, Ordering::Release);

        trace!(adding, total = new_len, version = inner.version, "Appended events");
        Ok(new_len)
    }

    /// Atomically append an [`EventBatch`] handed over by the ingestion conduit.
    ///
    /// # Errors
    ///
    /// Same conditions as [`EventStore::append`].
    pub async fn append_batch(&self, batch: EventBatch) -> Result<usize, StoreError> {
        let batch_id = batch.id;
        let producer = batch.producer;
        let total = self.append(batch.events).await?;
        debug!(batch_id = %batch_id, producer = %producer, total, "Batch stored");
        Ok(total)
    }

    /// Take a consistent point-in-time view of every stored event.
    ///
    /// The returned snapshot can be iterated without holding any lock and is
    /// unaffected by later appends.
    pub async fn snapshot(&self) -> EventSnapshot {
        let inner = self.inner.read().await;
        EventSnapshot::new(Arc::clone(&inner.batches), inner.len, inner.version)
    }

    /// Number of stored events, read without taking the lock.
    ///
    /// May lag an append that is completing concurrently.
    pub fn len(&self) -> usize {
        self.len_hint.load(Ordering::Acquire)
    }

    /// Number of non-empty batches appended, read without taking the lock.
    pub fn batch_count(&self) -> usize {
        self.batch_hint.load(Ordering::Acquire)
    }

    /// Whether the store is empty, read without taking the lock.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use vicinity_types::{TopicId, UserId};

    use super::*;

    fn make_events(user: u32, count: u64) -> Vec<ContentEvent> {
        let now = Utc::now();
        (0..count)
            .map(|topic| ContentEvent {
                topic_id: TopicId(topic),
                user_id: UserId(user),
                like_count: 1,
                score: 1,
                location: None,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    #[tokio::test]
    async fn append_grows_store() {
        let store = EventStore::new();
        assert!(store.is_empty());
        assert_eq!(store.append(make_events(1, 3)).await.unwrap(), 3);
        assert_eq!(store.append(make_events(2, 4)).await.unwrap(), 7);
        assert_eq!(store.len(), 7);
        assert_eq!(store.batch_count(), 2);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 7);
        assert_eq!(snapshot.batch_count(), 2);
        assert_eq!(snapshot.version(), 2);
    }

    #[tokio::test]
    async fn empty_append_is_a_no_op() {
        let store = EventStore::new();
        assert_eq!(store.append(Vec::new()).await.unwrap(), 0);
        let snapshot = store.snapshot().await;
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version(), 0);
        assert_eq!(store.batch_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_later_appends() {
        let store = EventStore::new();
        store.append(make_events(1, 2)).await.unwrap();
        let before = store.snapshot().await;

        store.append(make_events(2, 5)).await.unwrap();
        let after = store.snapshot().await;

        assert_eq!(before.len(), 2);
        assert_eq!(before.iter().count(), 2);
        assert!(before.iter().all(|e| e.user_id == UserId(1)));
        assert_eq!(after.len(), 7);
        assert!(after.version() > before.version());
    }

    #[tokio::test]
    async fn batch_append_keeps_event_order() {
        let store = EventStore::new();
        let batch = EventBatch::new(UserId(3), Utc::now(), make_events(3, 4));
        assert_eq!(store.append_batch(batch).await.unwrap(), 4);

        let topics: Vec<u64> = store.snapshot().await.iter().map(|e| e.topic_id.0).collect();
        assert_eq!(topics, vec![0, 1, 2, 3]);
    }
}
