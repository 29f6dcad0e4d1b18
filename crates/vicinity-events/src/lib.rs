//! Event storage and snapshots for the Vicinity pipeline.
//!
//! Every content event that crosses the ingestion conduit lands in the
//! [`EventStore`]. The store only grows: batches are appended atomically and
//! never modified or removed. Readers take an [`EventSnapshot`], an
//! immutable point-in-time view they can scan without holding any lock.
//!
//! # Modules
//!
//! - [`error`] -- Error types for store operations.
//! - [`snapshot`] -- [`EventSnapshot`], the read-only view handed to ranking.
//! - [`store`] -- [`EventStore`], the shared append-only accumulator.

pub mod error;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use snapshot::EventSnapshot;
pub use store::EventStore;
