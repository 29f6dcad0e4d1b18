//! Error types for the `vicinity-events` crate.

/// Errors that can occur while appending to the event store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The running event count would overflow `usize`.
    #[error("event count overflow: store already holds {current} events, cannot add {adding}")]
    CountOverflow {
        /// Events already stored.
        current: usize,
        /// Size of the rejected batch.
        adding: usize,
    },
}
