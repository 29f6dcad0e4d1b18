//! Great-circle distance on a spherical Earth.
//!
//! Uses the haversine formula with the mean Earth radius. Inputs are assumed
//! valid; invalid coordinates are rejected earlier, when a point is built
//! with [`checked_point`] or a registry is built from user records.

use vicinity_types::{GeoPoint, User};

use crate::error::GeoError;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Build a [`GeoPoint`], rejecting non-finite or out-of-range coordinates.
pub fn checked_point(latitude: f64, longitude: f64) -> Result<GeoPoint, GeoError> {
    let point = GeoPoint::new(latitude, longitude);
    if point.is_valid() {
        Ok(point)
    } else {
        Err(GeoError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

/// Great-circle distance between two points, in kilometers.
///
/// Symmetric up to floating-point rounding. Identical points yield `0.0`.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lng = (b.longitude - a.longitude).to_radians();

    let half_chord = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push the chord a hair outside [0, 1] for antipodal points.
    let half_chord = half_chord.clamp(0.0, 1.0);
    let angle = 2.0 * half_chord.sqrt().atan2((1.0 - half_chord).sqrt());

    EARTH_RADIUS_KM * angle
}

/// Distance between two users' home locations, in kilometers.
pub fn user_distance_km(a: &User, b: &User) -> f64 {
    distance_km(&a.location, &b.location)
}
