//! Shared type definitions for the Vicinity nearby-feed pipeline.
//!
//! This crate is the single source of truth for the data that flows between
//! producers, the event store and the query path.
//!
//! # Modules
//!
//! - [`ids`] -- Integer user/topic identifiers and UUID batch identifiers
//! - [`structs`] -- Users, coordinates, content events and event batches

pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{BatchId, TopicId, UserId};
pub use structs::{
    ContentEvent, EventBatch, GeoPoint, MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE,
    MIN_LONGITUDE, User,
};
