//! # Geographic Utilities
//!
//! Spherical-Earth distance helpers shared by the projector, the track and the
//! statistics aggregator.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine`] | Great-circle distance between two `geo` coordinates |
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`distance_3d`] | Segment length including the elevation delta |
//! | [`polyline_length`] | Total surface length of a GPS track in meters |
//! | [`polyline_length_3d`] | Total 3-D length of a GPS track in meters |
//! | [`compute_bounds`] | Bounding box of a GPS track |
//!
//! ## Example
//!
//! ```rust
//! use peak_matcher::{GeoPoint, geo_utils};
//!
//! let track = vec![
//!     GeoPoint::new(47.58359, -121.95062),
//!     GeoPoint::new(47.58878, -121.94447),
//!     GeoPoint::new(47.58622, -121.93814),
//! ];
//!
//! let length = geo_utils::polyline_length(&track);
//! println!("Track length: {:.0}m", length);
//!
//! let bounds = geo_utils::compute_bounds(&track);
//! println!("Bounds: {:.4}N to {:.4}N", bounds.min_lat, bounds.max_lat);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! `d = 2R·asin(√(hav(Δlat) + cos(lat1)·cos(lat2)·hav(Δlon)))` with
//! `hav(θ) = sin²(θ/2)` and `R` = [`EARTH_RADIUS_METERS`].
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Coordinate System
//!
//! WGS84 degrees. When a `geo::Coord` is used, `x` is the longitude and `y`
//! the latitude. Out-of-range inputs are not rejected here; they produce NaN
//! or meaningless values, so callers validate at ingestion
//! (see [`GeoPoint::is_valid`](crate::GeoPoint::is_valid)).

use geo::Coord;
use crate::{Bounds, GeoPoint};

/// Radius of the spherical Earth model, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

// =============================================================================
// Distance Functions
// =============================================================================

#[inline]
fn hav(theta: f64) -> f64 {
    let s = (theta / 2.0).sin();
    s * s
}

/// Great-circle distance in meters between two coordinates (`x` = lon, `y` = lat).
///
/// # Example
///
/// ```rust
/// use geo::Coord;
/// use peak_matcher::geo_utils;
///
/// let a = Coord { x: -121.9411, y: 47.5896 };
/// assert_eq!(geo_utils::haversine(a, a), 0.0);
/// ```
#[inline]
pub fn haversine(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.x - a.x).to_radians();

    let h = hav(d_lat) + lat1.cos() * lat2.cos() * hav(d_lon);
    // Rounding can push h a hair above 1 for antipodal inputs; NaN passes through
    2.0 * EARTH_RADIUS_METERS * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Calculate the great-circle distance between two GPS points.
///
/// Elevation is ignored. Returns meters along the surface of a sphere with
/// radius [`EARTH_RADIUS_METERS`].
///
/// # Example
///
/// ```rust
/// use peak_matcher::{GeoPoint, geo_utils};
///
/// let zurich = GeoPoint::new(47.3769, 8.5417);
/// let geneva = GeoPoint::new(46.2044, 6.1432);
///
/// let d = geo_utils::haversine_distance(&zurich, &geneva);
/// assert!((d - 224_600.0).abs() < 100.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine(p1.coord(), p2.coord())
}

/// Length of the segment between two points, accounting for elevation.
///
/// `sqrt(horizontal² + Δelevation²)`. When either point lacks an elevation the
/// vertical term is zero.
pub fn distance_3d(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let horizontal = haversine_distance(p1, p2);
    let vertical = match (p1.elevation, p2.elevation) {
        (Some(e1), Some(e2)) => (e2 - e1).abs(),
        _ => 0.0,
    };
    horizontal.hypot(vertical)
}

/// Surface length of a point sequence in meters; 0.0 below two points.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Sum of [`distance_3d`] over consecutive pairs.
pub fn polyline_length_3d(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| distance_3d(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Local Frame
// =============================================================================

/// Map a coordinate into a local equirectangular frame.
///
/// Longitudes are scaled by `cos_lat` so that one unit along either axis covers
/// roughly the same ground distance near the reference latitude. Only valid for
/// points close to that latitude.
#[inline]
pub(crate) fn to_local(c: Coord<f64>, cos_lat: f64) -> Coord<f64> {
    Coord {
        x: c.x * cos_lat,
        y: c.y,
    }
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Smallest lat/lng box holding every point.
///
/// For empty input, returns inverted bounds (MIN/MAX sentinels) that contain
/// nothing; use [`Bounds::from_points`] to get an `Option` instead.
///
/// # Example
///
/// ```rust
/// use peak_matcher::{GeoPoint, geo_utils};
///
/// let track = vec![
///     GeoPoint::new(47.5836, -121.9506),
///     GeoPoint::new(47.5958, -121.9357),
///     GeoPoint::new(47.5862, -121.9381),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track);
/// assert_eq!(bounds.min_lat, 47.5836);
/// assert_eq!(bounds.max_lat, 47.5958);
/// assert_eq!(bounds.min_lng, -121.9506);
/// assert_eq!(bounds.max_lng, -121.9357);
/// ```
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    let empty = Bounds {
        min_lat: f64::MAX,
        max_lat: f64::MIN,
        min_lng: f64::MAX,
        max_lng: f64::MIN,
    };

    points.iter().fold(empty, |b, p| Bounds {
        min_lat: b.min_lat.min(p.latitude),
        max_lat: b.max_lat.max(p.latitude),
        min_lng: b.min_lng.min(p.longitude),
        max_lng: b.max_lng.max(p.longitude),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
