//! Query callback that logs nearby feeds.
//!
//! This is the engine's presentation layer: it turns each
//! [`QueryOutcome`] into structured log lines and remembers the latest
//! feed per target for the shutdown summary. It carries no ranking logic.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use vicinity_core::query::{QueryError, QueryOutcome};
use vicinity_core::runner::QueryCallback;
use vicinity_types::UserId;

/// Latest result seen for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    /// Round the result came from.
    pub round: u64,
    /// Number of neighbors found.
    pub neighbors: usize,
    /// Number of ranked events reported.
    pub events: usize,
    /// Like count of the top event, if any.
    pub top_likes: Option<u32>,
    /// Store size the feed was ranked from.
    pub snapshot_len: usize,
}

/// Callback that logs every feed and keeps the latest per target.
#[derive(Debug, Default)]
pub struct LogCallback {
    latest: BTreeMap<UserId, FeedSummary>,
    failures: u64,
}

impl LogCallback {
    /// Create an empty callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest feed summary for `target`, if any query succeeded.
    pub fn latest(&self, target: UserId) -> Option<&FeedSummary> {
        self.latest.get(&target)
    }

    /// Number of failed queries seen.
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    /// Log the latest feed of every target.
    pub fn log_summary(&self) {
        for (target, feed) in &self.latest {
            info!(
                target_user = %target,
                round = feed.round,
                neighbors = feed.neighbors,
                events = feed.events,
                top_likes = feed.top_likes,
                snapshot_len = feed.snapshot_len,
                "Final nearby feed"
            );
        }
        if self.failures > 0 {
            warn!(failures = self.failures, "Some queries failed during the run");
        }
    }
}

impl QueryCallback for LogCallback {
    fn on_result(&mut self, round: u64, outcome: &QueryOutcome) {
        let summary = FeedSummary {
            round,
            neighbors: outcome.neighbors.len(),
            events: outcome.events.len(),
            top_likes: outcome.events.first().map(|e| e.like_count),
            snapshot_len: outcome.snapshot_len,
        };

        info!(
            round,
            target_user = %outcome.target,
            k = outcome.k,
            neighbors = summary.neighbors,
            events = summary.events,
            top_likes = summary.top_likes,
            snapshot_len = outcome.snapshot_len,
            snapshot_version = outcome.snapshot_version,
            "Nearby feed"
        );

        // Full payload only at debug level; serializing is not free.
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(outcome) {
                Ok(json) => {
                    debug!(
                        round,
                        target_user = %outcome.target,
                        feed = %json,
                        "Nearby feed payload"
                    );
                }
                Err(e) => warn!(error = %e, "Failed to serialize feed"),
            }
        }

        self.latest.insert(outcome.target, summary);
    }

    fn on_error(&mut self, round: u64, target: UserId, error: &QueryError) {
        self.failures = self.failures.saturating_add(1);
        debug!(round, target_user = %target, error = %error, "Feed unavailable");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};
    use vicinity_geo::DistancePair;
    use vicinity_types::{ContentEvent, TopicId};

    use super::*;

    fn outcome(target: u32, likes: &[u32]) -> QueryOutcome {
        let created = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        QueryOutcome {
            target: UserId(target),
            k: 2,
            neighbors: vec![
                DistancePair {
                    user_id: UserId(8),
                    distance_km: 1.5,
                },
                DistancePair {
                    user_id: UserId(9),
                    distance_km: 2.5,
                },
            ],
            events: likes
                .iter()
                .enumerate()
                .map(|(i, &like_count)| ContentEvent {
                    topic_id: TopicId(u64::try_from(i).unwrap()),
                    user_id: UserId(8),
                    like_count,
                    score: 0,
                    location: None,
                    created_at: created,
                    updated_at: created,
                })
                .collect(),
            snapshot_len: 40,
            snapshot_version: 4,
        }
    }

    #[test]
    fn keeps_latest_feed_per_target() {
        let mut cb = LogCallback::new();
        cb.on_result(1, &outcome(0, &[30, 10]));
        cb.on_result(2, &outcome(0, &[90, 30, 10]));
        cb.on_result(2, &outcome(5, &[]));

        let latest = cb.latest(UserId(0)).unwrap();
        assert_eq!(latest.round, 2);
        assert_eq!(latest.events, 3);
        assert_eq!(latest.top_likes, Some(90));
        assert_eq!(latest.neighbors, 2);
        assert_eq!(latest.snapshot_len, 40);

        assert_eq!(cb.latest(UserId(5)).unwrap().top_likes, None);
        assert!(cb.latest(UserId(1)).is_none());
    }

    #[test]
    fn counts_failures() {
        let mut cb = LogCallback::new();
        cb.on_error(1, UserId(7), &QueryError::UnknownUser(UserId(7)));
        cb.on_error(2, UserId(7), &QueryError::UnknownUser(UserId(7)));
        assert_eq!(cb.failures(), 2);
        assert!(cb.latest(UserId(7)).is_none());
        cb.log_summary();
    }

    #[test]
    fn outcome_serializes_for_debug_output() {
        let json = serde_json::to_value(outcome(3, &[12])).unwrap();
        assert_eq!(json["target"], 3);
        assert_eq!(json["neighbors"][0]["user_id"], 8);
        assert_eq!(json["events"][0]["like_count"], 12);
        assert!(json["events"][0].get("location").is_none());
    }
}
