//! The static user registry.
//!
//! A [`UserRegistry`] is an array of users indexed by [`UserId`]. It is
//! built once per session and never mutated, so it can be shared behind an
//! `Arc` without any locking.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use vicinity_types::{
    MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE, User, UserId,
};

use crate::distance::checked_point;
use crate::error::GeoError;

/// Immutable, densely indexed collection of users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRegistry {
    users: Vec<User>,
}

impl UserRegistry {
    /// Build a registry from a list of users.
    ///
    /// The user at position `i` must carry id `i`, and every location must
    /// be a valid coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::NonContiguousId`] if ids are not `0..n` in order,
    /// [`GeoError::InvalidCoordinates`] for an out-of-range location, or
    /// [`GeoError::TooManyUsers`] if the list exceeds the id range.
    pub fn new(users: Vec<User>) -> Result<Self, GeoError> {
        if u32::try_from(users.len()).is_err() {
            return Err(GeoError::TooManyUsers(users.len()));
        }
        for (index, user) in users.iter().enumerate() {
            if user.id.index() != index {
                return Err(GeoError::NonContiguousId {
                    index,
                    found: user.id,
                });
            }
            checked_point(user.location.latitude, user.location.longitude)?;
        }
        Ok(Self { users })
    }

    /// Build a registry from `(latitude, longitude)` pairs, assigning ids in
    /// order.
    ///
    /// # Errors
    ///
    /// Same conditions as [`UserRegistry::new`].
    pub fn from_coordinates(coordinates: &[(f64, f64)]) -> Result<Self, GeoError> {
        let users = coordinates
            .iter()
            .enumerate()
            .map(|(index, &(latitude, longitude))| {
                UserId::from_index(index)
                    .map(|id| User::new(id, latitude, longitude))
                    .ok_or(GeoError::TooManyUsers(coordinates.len()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(users)
    }

    /// Generate `count` users scattered uniformly over the coordinate ranges.
    ///
    /// The same seed always yields the same registry.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::TooManyUsers`] if `count` exceeds the id range.
    pub fn random(count: usize, seed: u64) -> Result<Self, GeoError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut users = Vec::with_capacity(count);
        for index in 0..count {
            let id = UserId::from_index(index).ok_or(GeoError::TooManyUsers(count))?;
            let latitude = rng.random_range(MIN_LATITUDE..=MAX_LATITUDE);
            let longitude = rng.random_range(MIN_LONGITUDE..=MAX_LONGITUDE);
            users.push(User::new(id, latitude, longitude));
        }
        debug!(count, seed, "Generated random user registry");
        Ok(Self { users })
    }

    /// Look up a user by id.
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(id.index())
    }

    /// Whether the id refers to a registered user.
    pub fn contains(&self, id: UserId) -> bool {
        id.index() < self.users.len()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the registry has no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Iterate over all users in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, User> {
        self.users.iter()
    }

    /// Borrow the users as a slice.
    pub fn as_slice(&self) -> &[User] {
        &self.users
    }
}

impl<'a> IntoIterator for &'a UserRegistry {
    type Item = &'a User;
    type IntoIter = std::slice::Iter<'a, User>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.iter()
    }
}
