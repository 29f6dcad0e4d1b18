//! Geography for the Vicinity pipeline.
//!
//! This crate answers "who is near whom": it measures great-circle
//! distances, holds the static user registry, and selects the K nearest
//! users to a target by flat linear scan.
//!
//! # Modules
//!
//! - [`distance`] -- Haversine distance and checked coordinate construction.
//! - [`error`] -- Error types for registry and neighbor operations.
//! - [`neighbors`] -- Bounded-heap K-nearest-neighbor selection plus a
//!   full-sort reference.
//! - [`registry`] -- [`UserRegistry`], the immutable id-indexed user table.

pub mod distance;
pub mod error;
pub mod neighbors;
pub mod registry;

// Re-export primary types at crate root.
pub use distance::{EARTH_RADIUS_KM, checked_point, distance_km, user_distance_km};
pub use error::GeoError;
pub use neighbors::{DistancePair, find_nearest, find_nearest_by_sort, find_nearest_pairs};
pub use registry::UserRegistry;
