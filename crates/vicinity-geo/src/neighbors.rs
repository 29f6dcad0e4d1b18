//! K-nearest-neighbor search over the user registry.
//!
//! [`find_nearest`] does a flat linear scan, keeping the best `k` candidates
//! in a bounded max-heap whose root is the current worst keeper. Each
//! candidate costs at most one `O(log k)` sift, so a query is `O(n log k)`.
//! [`find_nearest_by_sort`] is the full-sort reference and must return the
//! same answer.
//!
//! Ordering is by distance, then by ascending user id, so results are fully
//! deterministic even when several users sit at the same spot.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;
use tracing::debug;
use vicinity_types::UserId;

use crate::distance::distance_km;
use crate::error::GeoError;
use crate::registry::UserRegistry;

/// A user and its distance from the query target.
///
/// Only lives for the duration of one search.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistancePair {
    /// The candidate neighbor.
    pub user_id: UserId,
    /// Great-circle distance from the target, in kilometers.
    pub distance_km: f64,
}

impl PartialEq for DistancePair {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DistancePair {}

impl PartialOrd for DistancePair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistancePair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km
            .total_cmp(&other.distance_km)
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

/// Check the request and return the target's index plus the clamped count.
fn prepare(registry: &UserRegistry, target: UserId, k: usize) -> Result<usize, GeoError> {
    if k == 0 {
        return Err(GeoError::InvalidK { k });
    }
    if !registry.contains(target) {
        return Err(GeoError::UnknownUser(target));
    }
    Ok(k.min(registry.len().saturating_sub(1)))
}

/// Distances from `target` to every other user, in registry order.
fn candidates(
    registry: &UserRegistry,
    target: UserId,
) -> Result<impl Iterator<Item = DistancePair> + '_, GeoError> {
    let origin = registry
        .get(target)
        .ok_or(GeoError::UnknownUser(target))?
        .location;
    Ok(registry
        .iter()
        .filter(move |user| user.id != target)
        .map(move |user| DistancePair {
            user_id: user.id,
            distance_km: distance_km(&origin, &user.location),
        }))
}

/// The `k` users nearest to `target`, with their distances, nearest first.
///
/// `k` larger than the number of other users returns all of them.
///
/// # Errors
///
/// Returns [`GeoError::InvalidK`] if `k` is zero, or
/// [`GeoError::UnknownUser`] if `target` is not registered.
pub fn find_nearest_pairs(
    registry: &UserRegistry,
    target: UserId,
    k: usize,
) -> Result<Vec<DistancePair>, GeoError> {
    let limit = prepare(registry, target, k)?;
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<DistancePair> = BinaryHeap::with_capacity(limit);
    for candidate in candidates(registry, target)? {
        if heap.len() < limit {
            heap.push(candidate);
        } else if let Some(mut worst) = heap.peek_mut() {
            if candidate < *worst {
                // Replacing through `PeekMut` re-sifts the root on drop.
                *worst = candidate;
            }
        }
    }

    let nearest = heap.into_sorted_vec();
    debug!(
        target_user = %target,
        requested = k,
        returned = nearest.len(),
        "Nearest neighbors selected"
    );
    Ok(nearest)
}

/// The ids of the `k` users nearest to `target`, nearest first.
///
/// # Errors
///
/// Same conditions as [`find_nearest_pairs`].
pub fn find_nearest(
    registry: &UserRegistry,
    target: UserId,
    k: usize,
) -> Result<Vec<UserId>, GeoError> {
    Ok(find_nearest_pairs(registry, target, k)?
        .into_iter()
        .map(|pair| pair.user_id)
        .collect())
}

/// Full-sort variant of [`find_nearest_pairs`].
///
/// `O(n log n)`; kept as the reference the heap selection is checked against.
///
/// # Errors
///
/// Same conditions as [`find_nearest_pairs`].
pub fn find_nearest_by_sort(
    registry: &UserRegistry,
    target: UserId,
    k: usize,
) -> Result<Vec<DistancePair>, GeoError> {
    let limit = prepare(registry, target, k)?;
    let mut all: Vec<DistancePair> = candidates(registry, target)?.collect();
    all.sort_unstable();
    all.truncate(limit);
    Ok(all)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn three_on_equator() -> UserRegistry {
        UserRegistry::from_coordinates(&[(0.0, 0.0), (0.0, 1.0), (0.0, 90.0)]).unwrap()
    }

    #[test]
    fn nearest_single_neighbor() {
        let registry = three_on_equator();
        assert_eq!(find_nearest(&registry, UserId(0), 1).unwrap(), vec![UserId(1)]);
    }

    #[test]
    fn nearest_two_neighbors_in_distance_order() {
        let registry = three_on_equator();
        assert_eq!(
            find_nearest(&registry, UserId(0), 2).unwrap(),
            vec![UserId(1), UserId(2)]
        );
        assert_eq!(
            find_nearest(&registry, UserId(2), 2).unwrap(),
            vec![UserId(1), UserId(0)]
        );
    }

    #[test]
    fn oversized_k_returns_everyone_else() {
        let registry = three_on_equator();
        let all = find_nearest(&registry, UserId(1), 50).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all.contains(&UserId(1)));
    }

    #[test]
    fn zero_k_rejected() {
        let registry = three_on_equator();
        assert_eq!(
            find_nearest(&registry, UserId(0), 0).unwrap_err(),
            GeoError::InvalidK { k: 0 }
        );
    }

    #[test]
    fn unknown_target_rejected() {
        let registry = three_on_equator();
        assert_eq!(
            find_nearest(&registry, UserId(3), 1).unwrap_err(),
            GeoError::UnknownUser(UserId(3))
        );
    }

    #[test]
    fn lone_user_has_no_neighbors() {
        let registry = UserRegistry::from_coordinates(&[(10.0, 10.0)]).unwrap();
        assert!(find_nearest(&registry, UserId(0), 3).unwrap().is_empty());
        assert!(find_nearest_by_sort(&registry, UserId(0), 3).unwrap().is_empty());
    }

    #[test]
    fn ties_break_by_ascending_id() {
        // Users 1..=4 all sit on the same spot, equidistant from user 0.
        let registry = UserRegistry::from_coordinates(&[
            (0.0, 0.0),
            (5.0, 5.0),
            (5.0, 5.0),
            (5.0, 5.0),
            (5.0, 5.0),
        ])
        .unwrap();
        assert_eq!(
            find_nearest(&registry, UserId(0), 2).unwrap(),
            vec![UserId(1), UserId(2)]
        );
    }

    #[test]
    fn heap_matches_sort_on_small_registry() {
        let registry = UserRegistry::random(64, 3).unwrap();
        for k in [1, 2, 5, 17, 63, 100] {
            let heap = find_nearest_pairs(&registry, UserId(10), k).unwrap();
            let sorted = find_nearest_by_sort(&registry, UserId(10), k).unwrap();
            assert_eq!(heap, sorted, "k = {k}");
        }
    }

    #[test]
    fn pair_ordering_is_total() {
        let near = DistancePair {
            user_id: UserId(9),
            distance_km: 1.0,
        };
        let far = DistancePair {
            user_id: UserId(1),
            distance_km: 2.0,
        };
        let far_higher_id = DistancePair {
            user_id: UserId(2),
            distance_km: 2.0,
        };
        assert!(near < far);
        assert!(far < far_higher_id);
    }
}
