//! Distances and extents on GPS tracks.
//!
//! - [`haversine_distance`]: meters between two points
//! - [`polyline_length`]: meters along a whole track
//! - [`compute_bounds`]: lat/lng extent of a track
//!
//! ```rust
//! use track_narrator::{GpsPoint, geo_utils};
//!
//! let ride = [
//!     GpsPoint::new(48.1372, 11.5756),
//!     GpsPoint::new(48.1500, 11.5800),
//!     GpsPoint::new(48.1650, 11.5900),
//! ];
//!
//! let along = geo_utils::polyline_length(&ride);
//! let direct = geo_utils::haversine_distance(&ride[0], &ride[2]);
//! assert!(along >= direct);
//! ```
//!
//! Spherical earth with a fixed radius of 6,371,000 m ([`EARTH_RADIUS_M`]).

use geo::{BoundingRect, Coord, LineString};
use crate::{Bounds, GpsPoint};

/// Earth radius in meters used by every distance computation in the crate.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters (haversine, radius [`EARTH_RADIUS_M`]).
///
/// ```rust
/// use track_narrator::{GpsPoint, geo_utils};
///
/// let berlin = GpsPoint::new(52.5200, 13.4050);
/// let potsdam = GpsPoint::new(52.3906, 13.0645);
///
/// let distance = geo_utils::haversine_distance(&berlin, &potsdam);
/// assert!((distance - 27_000.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (p2.longitude - p1.longitude).to_radians();

    let s = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * s.sqrt().asin()
}

/// Sum of consecutive segment distances; 0.0 for fewer than two points.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .iter()
        .zip(points.iter().skip(1))
        .map(|(a, b)| haversine_distance(a, b))
        .sum()
}

/// Extent of a track, `None` when it has no points.
///
/// ```rust
/// use track_narrator::{GpsPoint, geo_utils};
///
/// let track = [
///     GpsPoint::new(52.50, 13.41),
///     GpsPoint::new(52.51, 13.42),
///     GpsPoint::new(52.505, 13.40),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track).unwrap();
/// assert_eq!(bounds.min_lat, 52.50);
/// assert_eq!(bounds.max_lng, 13.42);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord { x: p.longitude, y: p.latitude })
        .collect();

    line.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}
