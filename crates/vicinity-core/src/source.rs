//! Event source trait and its implementations.
//!
//! Each producer task owns one [`EventSource`] and asks it for a batch on
//! every cadence step. The trait hides where content comes from: the
//! engine uses [`RandomEventSource`], which generates synthetic posts, and
//! tests use [`ScriptedEventSource`] to feed exact batches.
//!
//! Sources do not check registry membership. An event may name a user the
//! registry has never heard of; it is stored anyway and simply never ranked.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vicinity_types::{
    ContentEvent, GeoPoint, MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE, TopicId,
    UserId,
};

use crate::config::BatchSizeRange;

/// Exclusive upper bound for generated topic ids.
pub const TOPIC_ID_SPACE: u64 = 1_000_000;

/// Exclusive upper bound for generated like counts and scores.
pub const ENGAGEMENT_SPACE: u32 = 1_000;

/// A source of content events for one producer.
pub trait EventSource: Send {
    /// Produce the next batch of events on behalf of `producer`.
    ///
    /// `now` is the producer's clock reading for this step; sources should
    /// use it for `created_at`/`updated_at`. An empty batch is allowed and
    /// means "nothing to emit this step".
    fn next_batch(&mut self, producer: UserId, now: DateTime<Utc>) -> Vec<ContentEvent>;
}

// ---------------------------------------------------------------------------
// RandomEventSource
// ---------------------------------------------------------------------------

/// Generates synthetic posts with random topics, engagement and geotags.
///
/// Batch sizes are drawn uniformly from the configured range. Every event
/// is attributed to the producer that asked for it.
#[derive(Debug, Clone)]
pub struct RandomEventSource {
    rng: StdRng,
    batch_size: BatchSizeRange,
}

impl RandomEventSource {
    /// Create a source seeded with `seed`.
    pub fn new(seed: u64, batch_size: BatchSizeRange) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            batch_size,
        }
    }

    /// Create a source for one producer, deriving a distinct stream from a
    /// shared base seed.
    pub fn for_producer(base_seed: u64, producer: UserId, batch_size: BatchSizeRange) -> Self {
        // Golden-ratio multiplier spreads neighboring producer ids apart.
        let mixed =
            base_seed ^ u64::from(producer.into_inner()).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self::new(mixed, batch_size)
    }

    fn batch_len(&mut self) -> usize {
        let BatchSizeRange { min, max } = self.batch_size;
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    fn random_point(&mut self) -> GeoPoint {
        GeoPoint::new(
            self.rng.random_range(MIN_LATITUDE..=MAX_LATITUDE),
            self.rng.random_range(MIN_LONGITUDE..=MAX_LONGITUDE),
        )
    }
}

impl EventSource for RandomEventSource {
    fn next_batch(&mut self, producer: UserId, now: DateTime<Utc>) -> Vec<ContentEvent> {
        let len = self.batch_len();
        let mut events = Vec::with_capacity(len);
        for _ in 0..len {
            events.push(ContentEvent {
                topic_id: TopicId(self.rng.random_range(0..TOPIC_ID_SPACE)),
                user_id: producer,
                like_count: self.rng.random_range(0..ENGAGEMENT_SPACE),
                score: self.rng.random_range(0..ENGAGEMENT_SPACE),
                location: Some(self.random_point()),
                created_at: now,
                updated_at: now,
            });
        }
        events
    }
}

// ---------------------------------------------------------------------------
// ScriptedEventSource
// ---------------------------------------------------------------------------

/// Replays a fixed list of batches, then emits nothing.
///
/// Events are returned exactly as scripted; `producer` and `now` are
/// ignored. Used by tests that need precise control over what is ingested.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEventSource {
    script: VecDeque<Vec<ContentEvent>>,
}

impl ScriptedEventSource {
    /// Create a source that will return `batches` in order.
    pub fn new(batches: impl IntoIterator<Item = Vec<ContentEvent>>) -> Self {
        Self {
            script: batches.into_iter().collect(),
        }
    }

    /// Number of scripted batches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl EventSource for ScriptedEventSource {
    fn next_batch(&mut self, _producer: UserId, _now: DateTime<Utc>) -> Vec<ContentEvent> {
        self.script.pop_front().unwrap_or_default()
    }
}
