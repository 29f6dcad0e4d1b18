//! Type-safe identifier wrappers.
//!
//! Users and topics are identified by plain integers. User ids double as
//! indices into the user registry, so they are dense and start at zero.
//! Batches crossing the ingestion conduit get a UUID v7 (time-ordered) so
//! log lines from producers and the conduit can be correlated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around an unsigned integer with standard derives.
macro_rules! define_int_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Wrap a raw integer value.
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_int_id! {
    /// Identifier of a user. Equal to the user's index in the registry.
    UserId(u32)
}

define_int_id! {
    /// Identifier of a piece of content (a post or topic).
    TopicId(u64)
}

impl UserId {
    /// Return the registry index this id refers to.
    ///
    /// Saturates to `usize::MAX` on targets where `u32` does not fit, which
    /// can never be a valid index.
    pub fn index(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }

    /// Build an id from a registry index.
    ///
    /// Returns `None` if the index does not fit in a `u32`.
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }
}

/// Unique identifier for a batch of events handed to the ingestion conduit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn user_id_index_round_trip() {
        let id = UserId::from_index(42).unwrap();
        assert_eq!(id, UserId(42));
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn user_ids_order_numerically() {
        assert!(UserId(2) < UserId(10));
        assert!(TopicId(7) > TopicId(3));
    }

    #[test]
    fn user_id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&UserId(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn batch_ids_are_unique() {
        let a = BatchId::new();
        let b = BatchId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }
}
