//! Error types for the `vicinity-geo` crate.
//!
//! All fallible operations in this crate return [`GeoError`].

use vicinity_types::UserId;

/// Errors that can occur during registry construction or neighbor search.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// The requested user is not present in the registry.
    #[error("unknown user: {0}")]
    UnknownUser(UserId),

    /// A neighbor count of zero was requested.
    #[error("invalid neighbor count {k}: must be at least 1")]
    InvalidK {
        /// The rejected value.
        k: usize,
    },

    /// Coordinates are non-finite or outside their valid ranges.
    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        /// The rejected latitude.
        latitude: f64,
        /// The rejected longitude.
        longitude: f64,
    },

    /// A user's id does not match its position in the registry.
    #[error("user at registry index {index} has id {found}")]
    NonContiguousId {
        /// Position in the supplied user list.
        index: usize,
        /// The id actually found at that position.
        found: UserId,
    },

    /// The registry would hold more users than a `UserId` can address.
    #[error("registry size {0} exceeds the user id range")]
    TooManyUsers(usize),
}
