//! The nearby-feed query path.
//!
//! [`QueryService`] is the single read entry point. A query finds the `k`
//! users nearest to the target, takes a snapshot of the event store, and
//! ranks the neighbors' content by popularity.
//!
//! Reads are best-effort: a query sees whatever the store holds when the
//! snapshot is taken and never waits for more events to arrive. Queries
//! never block producers beyond the instant it takes to clone the snapshot
//! handle, and a failed query leaves the store untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use vicinity_events::EventStore;
use vicinity_geo::{DistancePair, GeoError, UserRegistry, find_nearest_pairs};
use vicinity_types::{ContentEvent, UserId};

use crate::ranker::{rank_by_users, rank_by_users_limited};

/// Errors returned to query callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// The target user is not in the registry.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// A request parameter is out of range.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the request.
        reason: String,
    },

    /// Any other failure from the neighbor search.
    #[error("neighbor search failed: {source}")]
    Geo {
        /// The underlying geography error.
        source: GeoError,
    },
}

impl From<GeoError> for QueryError {
    fn from(source: GeoError) -> Self {
        match source {
            GeoError::UnknownUser(id) => Self::UnknownUser(id),
            GeoError::InvalidK { k } => Self::InvalidArgument {
                reason: format!("k must be positive, got {k}"),
            },
            other => Self::Geo { source: other },
        }
    }
}

/// Full result of one query, for callers that want to log or display more
/// than the ranked events.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// The user the query was made for.
    pub target: UserId,
    /// Requested neighborhood size.
    pub k: usize,
    /// The neighbors found, nearest first.
    pub neighbors: Vec<DistancePair>,
    /// The neighbors' content, most popular first.
    pub events: Vec<ContentEvent>,
    /// Number of events in the snapshot the query ranked.
    pub snapshot_len: usize,
    /// Store version of that snapshot.
    pub snapshot_version: u64,
}

/// Answers "what is popular near this user right now".
///
/// Cheap to clone; both the registry and the store are shared.
#[derive(Debug, Clone)]
pub struct QueryService {
    registry: Arc<UserRegistry>,
    store: Arc<EventStore>,
}

impl QueryService {
    /// Create a service over a registry and a store.
    pub const fn new(registry: Arc<UserRegistry>, store: Arc<EventStore>) -> Self {
        Self { registry, store }
    }

    /// The registry queries are answered against.
    pub fn registry(&self) -> &UserRegistry {
        &self.registry
    }

    /// The store queries read from.
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Ranked content authored by the `k` users nearest to `target`.
    ///
    /// `k` larger than the number of other users uses all of them.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] if `k <= 0` and
    /// [`QueryError::UnknownUser`] if `target` is not registered.
    pub async fn query(&self, target: UserId, k: i64) -> Result<Vec<ContentEvent>, QueryError> {
        let k = checked_k(k)?;
        let neighbors = find_nearest_pairs(&self.registry, target, k)?;
        let users = neighbor_set(&neighbors);
        let snapshot = self.store.snapshot().await;
        Ok(rank_by_users(snapshot.iter(), &users))
    }

    /// Like [`QueryService::query`], but also return the neighbors and
    /// snapshot metadata, keeping at most `limit` events when given.
    ///
    /// # Errors
    ///
    /// Same conditions as [`QueryService::query`].
    pub async fn query_detailed(
        &self,
        target: UserId,
        k: i64,
        limit: Option<usize>,
    ) -> Result<QueryOutcome, QueryError> {
        let k = checked_k(k)?;
        let neighbors = find_nearest_pairs(&self.registry, target, k)?;
        let users = neighbor_set(&neighbors);
        let snapshot = self.store.snapshot().await;
        let events = match limit {
            Some(limit) => rank_by_users_limited(snapshot.iter(), &users, limit),
            None => rank_by_users(snapshot.iter(), &users),
        };

        debug!(
            target_user = %target,
            k,
            neighbors = neighbors.len(),
            snapshot_len = snapshot.len(),
            snapshot_version = snapshot.version(),
            ranked = events.len(),
            "Query answered"
        );

        Ok(QueryOutcome {
            target,
            k,
            neighbors,
            events,
            snapshot_len: snapshot.len(),
            snapshot_version: snapshot.version(),
        })
    }
}

/// Reject non-positive `k` instead of clamping it.
fn checked_k(k: i64) -> Result<usize, QueryError> {
    if k <= 0 {
        return Err(QueryError::InvalidArgument {
            reason: format!("k must be positive, got {k}"),
        });
    }
    // Positive, so only an oversized value on a narrow target can fail;
    // that still means "everyone".
    Ok(usize::try_from(k).unwrap_or(usize::MAX))
}

fn neighbor_set(neighbors: &[DistancePair]) -> BTreeSet<UserId> {
    neighbors.iter().map(|pair| pair.user_id).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};
    use vicinity_types::TopicId;

    use super::*;

    fn event(topic: u64, user: u32, likes: u32) -> ContentEvent {
        let created = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        ContentEvent {
            topic_id: TopicId(topic),
            user_id: UserId(user),
            like_count: likes,
            score: 0,
            location: None,
            created_at: created,
            updated_at: created,
        }
    }

    async fn equator_service() -> QueryService {
        let registry =
            UserRegistry::from_coordinates(&[(0.0, 0.0), (0.0, 1.0), (0.0, 90.0)]).unwrap();
        let store = EventStore::new();
        store.append(vec![event(10, 1, 5)]).await.unwrap();
        store.append(vec![event(20, 2, 50)]).await.unwrap();
        QueryService::new(Arc::new(registry), Arc::new(store))
    }

    #[tokio::test]
    async fn neighbors_content_ranked_by_likes() {
        let service = equator_service().await;
        let ranked = service.query(UserId(0), 2).await.unwrap();
        let authors: Vec<UserId> = ranked.iter().map(|e| e.user_id).collect();
        assert_eq!(authors, vec![UserId(2), UserId(1)]);
    }

    #[tokio::test]
    async fn nearest_only_neighborhood() {
        let service = equator_service().await;
        let ranked = service.query(UserId(0), 1).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked.first().unwrap().user_id, UserId(1));
    }

    #[tokio::test]
    async fn target_content_is_not_included() {
        let service = equator_service().await;
        service.store().append(vec![event(30, 0, 500)]).await.unwrap();
        let ranked = service.query(UserId(0), 5).await.unwrap();
        assert!(ranked.iter().all(|e| e.user_id != UserId(0)));
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn non_positive_k_rejected() {
        let service = equator_service().await;
        for k in [0, -1, i64::MIN] {
            let err = service.query(UserId(0), k).await.unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument { .. }));
        }
    }

    #[tokio::test]
    async fn unknown_target_rejected() {
        let service = equator_service().await;
        assert_eq!(
            service.query(UserId(3), 1).await.unwrap_err(),
            QueryError::UnknownUser(UserId(3))
        );
    }

    #[tokio::test]
    async fn empty_store_gives_empty_feed() {
        let registry = UserRegistry::from_coordinates(&[(0.0, 0.0), (1.0, 1.0)]).unwrap();
        let service = QueryService::new(Arc::new(registry), Arc::new(EventStore::new()));
        assert!(service.query(UserId(0), 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unattributable_events_are_never_ranked() {
        let service = equator_service().await;
        service.store().append(vec![event(40, 77, 1_000)]).await.unwrap();
        let ranked = service.query(UserId(0), 10).await.unwrap();
        assert!(ranked.iter().all(|e| e.user_id != UserId(77)));
        assert_eq!(service.store().len(), 3);
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let service = equator_service().await;
        let first = service.query(UserId(2), 2).await.unwrap();
        let second = service.query(UserId(2), 2).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn detailed_query_reports_neighbors_and_snapshot() {
        let service = equator_service().await;
        let outcome = service.query_detailed(UserId(0), 2, Some(1)).await.unwrap();
        assert_eq!(outcome.target, UserId(0));
        assert_eq!(outcome.k, 2);
        let neighbor_ids: Vec<UserId> = outcome.neighbors.iter().map(|p| p.user_id).collect();
        assert_eq!(neighbor_ids, vec![UserId(1), UserId(2)]);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events.first().unwrap().like_count, 50);
        assert_eq!(outcome.snapshot_len, 2);
        assert_eq!(outcome.snapshot_version, 2);
    }

    #[test]
    fn geo_errors_map_to_query_errors() {
        assert_eq!(
            QueryError::from(GeoError::UnknownUser(UserId(5))),
            QueryError::UnknownUser(UserId(5))
        );
        assert!(matches!(
            QueryError::from(GeoError::InvalidK { k: 0 }),
            QueryError::InvalidArgument { .. }
        ));
    }
}
