//! Immutable point-in-time views of the event store.
//!
//! A snapshot shares the store's sealed batches by reference count. Taking
//! one copies no events, and holding one never blocks writers: the store
//! copies its (small) batch list on the next append instead.

use std::sync::Arc;

use vicinity_types::ContentEvent;

/// Sealed batches in append order.
pub(crate) type BatchList = Vec<Arc<[ContentEvent]>>;

/// A consistent, read-only view of every event appended before it was taken.
///
/// Cloning a snapshot is cheap (one reference-count bump).
#[derive(Debug, Clone)]
pub struct EventSnapshot {
    batches: Arc<BatchList>,
    len: usize,
    version: u64,
}

impl EventSnapshot {
    pub(crate) const fn new(batches: Arc<BatchList>, len: usize, version: u64) -> Self {
        Self {
            batches,
            len,
            version,
        }
    }

    /// An empty snapshot, as taken from a fresh store.
    pub fn empty() -> Self {
        Self::new(Arc::new(Vec::new()), 0, 0)
    }

    /// Total number of events visible in this snapshot.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the snapshot holds no events.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of batches visible in this snapshot.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Number of appends the store had accepted when this snapshot was taken.
    ///
    /// Two snapshots with the same version see exactly the same events.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Iterate over every event, batch by batch, in append order.
    pub fn iter(&self) -> impl Iterator<Item = &ContentEvent> + '_ {
        self.batches.iter().flat_map(|batch| batch.iter())
    }

    /// Copy every event into an owned vector.
    pub fn to_vec(&self) -> Vec<ContentEvent> {
        let mut events = Vec::with_capacity(self.len);
        for batch in self.batches.iter() {
            events.extend_from_slice(batch);
        }
        events
    }
}

impl Default for EventSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
