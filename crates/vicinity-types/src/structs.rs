//! Core entity structs for the Vicinity pipeline.
//!
//! Covers `GeoPoint`, `User`, `ContentEvent` and `EventBatch`. All of them
//! are plain data: behavior lives in `vicinity-geo` (distances, neighbor
//! search) and `vicinity-core` (ranking, ingestion).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BatchId, TopicId, UserId};

/// Lowest valid latitude in degrees.
pub const MIN_LATITUDE: f64 = -90.0;
/// Highest valid latitude in degrees.
pub const MAX_LATITUDE: f64 = 90.0;
/// Lowest valid longitude in degrees.
pub const MIN_LONGITUDE: f64 = -180.0;
/// Highest valid longitude in degrees.
pub const MAX_LONGITUDE: f64 = 180.0;

// ---------------------------------------------------------------------------
// GeoPoint
// ---------------------------------------------------------------------------

/// A latitude/longitude pair in decimal degrees.
///
/// Construction does not validate. Use [`GeoPoint::is_valid`] or the checked
/// constructor in `vicinity-geo` before feeding a point into distance math.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point without range checks.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (MIN_LATITUDE..=MAX_LATITUDE).contains(&self.latitude)
            && (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&self.longitude)
    }
}

impl core::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user with a fixed home location.
///
/// Users are created once when the registry is built and never change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Registry index of this user.
    pub id: UserId,
    /// Where the user is.
    pub location: GeoPoint,
}

impl User {
    /// Create a user at the given coordinates.
    pub const fn new(id: UserId, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            location: GeoPoint::new(latitude, longitude),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentEvent
// ---------------------------------------------------------------------------

/// A single piece of content emitted by a user.
///
/// Events are immutable once stored. An edit is modeled as a new event with
/// a later `updated_at`, never as an in-place change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEvent {
    /// Identifier of the content item.
    pub topic_id: TopicId,
    /// Author. May reference a user that is not in the registry.
    pub user_id: UserId,
    /// Number of likes; the popularity signal used for ranking.
    pub like_count: u32,
    /// Secondary engagement score carried through untouched.
    pub score: u32,
    /// Where the content was posted, when the source knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// When the content was created.
    pub created_at: DateTime<Utc>,
    /// When the content was last updated.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventBatch
// ---------------------------------------------------------------------------

/// A batch of events emitted by one producer in one cadence step.
///
/// Batches are the unit of atomic append: a batch is either fully visible in
/// the event store or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Correlation id for logging.
    pub id: BatchId,
    /// The producer that generated the batch.
    pub producer: UserId,
    /// When the producer handed the batch to the conduit.
    pub emitted_at: DateTime<Utc>,
    /// The events, in the order the producer generated them.
    pub events: Vec<ContentEvent>,
}

impl EventBatch {
    /// Wrap a list of events in a new batch with a fresh id.
    pub fn new(producer: UserId, emitted_at: DateTime<Utc>, events: Vec<ContentEvent>) -> Self {
        Self {
            id: BatchId::new(),
            producer,
            emitted_at,
            events,
        }
    }

    /// Number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the batch carries no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_event(user: u32) -> ContentEvent {
        let now = Utc::now();
        ContentEvent {
            topic_id: TopicId(1),
            user_id: UserId(user),
            like_count: 3,
            score: 9,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn geo_point_validity() {
        assert!(GeoPoint::new(0.0, 0.0).is_valid());
        assert!(GeoPoint::new(90.0, 180.0).is_valid());
        assert!(GeoPoint::new(-90.0, -180.0).is_valid());
        assert!(!GeoPoint::new(90.5, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn geo_point_display() {
        assert_eq!(GeoPoint::new(1.5, -2.25).to_string(), "1.5,-2.25");
    }

    #[test]
    fn batch_reports_length() {
        let batch = EventBatch::new(UserId(4), Utc::now(), vec![make_event(4), make_event(4)]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert_eq!(batch.producer, UserId(4));
    }

    #[test]
    fn event_without_location_omits_field() {
        let json = serde_json::to_value(make_event(1)).unwrap();
        assert!(json.get("location").is_none());
        assert_eq!(json.get("user_id").and_then(serde_json::Value::as_u64), Some(1));
    }
}
