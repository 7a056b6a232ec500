//! # Peak Matcher
//!
//! GPS track geometry for matching recorded activities to known summits.
//!
//! This library provides:
//! - Projection of arbitrary locations (candidate peaks) onto a recorded track
//! - Great-circle distances on a spherical Earth
//! - Track statistics: duration, 3-D distance, noise-filtered elevation gain/loss
//! - Splitting a track at the summit into ascent and descent halves
//! - Fixed-stride decimation for upload size limits
//! - Assembly of ascent records from the matched peaks
//!
//! ## Features
//!
//! - **`parallel`** - Match many peaks in parallel with rayon
//! - **`serde`** - Serialize/deserialize the public value types
//! - **`gpx`** - Build tracks from GPX documents
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use peak_matcher::{GeoPoint, MatchConfig, Peak, Track, match_peak};
//!
//! let track = Track::new(vec![
//!     GeoPoint::new(47.58359, -121.95062),
//!     GeoPoint::new(47.58878, -121.94447),
//!     GeoPoint::new(47.58622, -121.93814),
//!     GeoPoint::new(47.59582, -121.93571),
//! ])?;
//!
//! let peak = Peak::new("1234", "Tiger Mountain", 47.58878, -121.94447);
//! let m = match_peak(&track, &peak, &MatchConfig::default());
//!
//! assert!(m.on_track);
//! assert_eq!(m.closest_index, 1);
//! # Ok::<(), peak_matcher::TrackError>(())
//! ```
//!
//! Coordinates are not range-checked on construction. Out-of-range values
//! propagate as NaN through every distance computation; validate input with
//! [`GeoPoint::is_valid`] at ingestion.

use chrono::{DateTime, Utc};
use geo::Coord;

pub mod geo_utils;

pub mod projector;
pub use projector::{PolylineProjector, Projection};

pub mod stats;
pub use stats::{compute_stats, elevation_gain_loss, Stats};

pub mod track;
pub use track::Track;

pub mod ascent;
pub use ascent::{
    Ascent, AscentLeg, AscentLegs, AscentPlan, BoxError, ExistingAscent, PeakLookup, PeakMatch,
    build_ascents, has_ascent, match_peak, match_peaks, peaks_on_track, prepare_ascents,
    search_bounds,
};

#[cfg(feature = "parallel")]
pub use ascent::match_peaks_parallel;

// ============================================================================
// Defaults
// ============================================================================

/// Maximum distance in meters between a peak and the track for the peak to
/// count as summited.
pub const DEFAULT_ON_TRACK_THRESHOLD: f64 = 25.0;

/// Minimum elevation change in meters between kept samples when accumulating
/// gain and loss.
pub const DEFAULT_ELEVATION_NOISE_THRESHOLD: f64 = 18.0;

/// Margin in decimal degrees added around the track when searching for peaks.
pub const DEFAULT_BOUNDS_MARGIN_DEGREES: f64 = 0.01;

/// Point ceiling of the record-keeping site's track upload.
pub const DEFAULT_MAX_UPLOAD_POINTS: usize = 3000;

// ============================================================================
// Core Types
// ============================================================================

/// A recorded GPS fix: position, optional elevation and time.
///
/// # Example
/// ```
/// use peak_matcher::GeoPoint;
/// let point = GeoPoint::new(47.5896, -121.9411).with_elevation(610.0);
/// assert_eq!(point.elevation, Some(610.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level, when the device recorded one.
    pub elevation: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl GeoPoint {
    /// Create a point with no elevation, timestamped at the Unix epoch.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            timestamp: DateTime::<Utc>::default(),
        }
    }

    /// Create a fully specified point.
    pub fn with_all(
        latitude: f64,
        longitude: f64,
        elevation: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
            timestamp,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Position as a `geo` coordinate (`x` = lon, `y` = lat).
    #[inline]
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    /// True when both coordinates are finite and within WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned latitude/longitude bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Bounding box of `points`, or `None` when there are none.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Widen every side by `increment` decimal degrees.
    ///
    /// Plain degree arithmetic, no geodesic correction. A negative increment
    /// shrinks the box, so `b.extend(x).extend(-x)` gives back `b` up to
    /// floating-point rounding.
    ///
    /// # Example
    /// ```
    /// use peak_matcher::Bounds;
    ///
    /// let b = Bounds {
    ///     min_lat: 48.1344333,
    ///     max_lat: 48.2714123,
    ///     min_lng: -121.8064235,
    ///     max_lng: -121.6771830,
    /// };
    /// let wider = b.extend(0.01);
    /// assert!((wider.min_lat - 48.1244333).abs() < 1e-9);
    /// assert!((wider.max_lng - -121.6671830).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn extend(&self, increment: f64) -> Self {
        Self {
            min_lat: self.min_lat - increment,
            max_lat: self.max_lat + increment,
            min_lng: self.min_lng - increment,
            max_lng: self.max_lng + increment,
        }
    }

    /// Check whether a location lies inside the bounds (edges included).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lng
            && longitude <= self.max_lng
    }

    /// Midpoint of the box, at the epoch with no elevation.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// A named summit supplied by the peak-lookup collaborator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Peak {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
        }
    }

    #[inline]
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Thresholds used when matching peaks and preparing uploads.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchConfig {
    /// A peak closer than this to the track (in meters) counts as summited.
    /// Default: 25.0 meters
    pub on_track_threshold: f64,

    /// Elevation samples must differ by more than this from the last kept
    /// sample to contribute to gain/loss.
    /// Default: 18.0 meters (suppresses altimeter and GPS jitter)
    pub elevation_noise_threshold: f64,

    /// Margin added around the track bounds when searching for peaks.
    /// Default: 0.01 decimal degrees
    pub bounds_margin_degrees: f64,

    /// Maximum number of points in an uploaded track.
    /// Default: 3000
    pub max_upload_points: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            on_track_threshold: DEFAULT_ON_TRACK_THRESHOLD,
            elevation_noise_threshold: DEFAULT_ELEVATION_NOISE_THRESHOLD,
            bounds_margin_degrees: DEFAULT_BOUNDS_MARGIN_DEGREES,
            max_upload_points: DEFAULT_MAX_UPLOAD_POINTS,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by track construction and derivation.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Track has no points")]
    EmptyTrack,

    #[error("Split index {index} out of range for track of {len} points")]
    InvalidSplitIndex { index: usize, len: usize },

    #[error("Stream lengths differ: {latlngs} locations, {elevations} elevations, {times} times")]
    StreamLengthMismatch {
        latlngs: usize,
        elevations: usize,
        times: usize,
    },

    #[error("Time offset {offset}s of point {index} is out of range")]
    InvalidTimeOffset { index: usize, offset: i64 },

    #[cfg(feature = "gpx")]
    #[error("Point {index} has no timestamp")]
    MissingTimestamp { index: usize },

    #[cfg(feature = "gpx")]
    #[error("GPX parsing error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("Peak lookup failed: {0}")]
    PeakLookup(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, TrackError>;

// ============================================================================
// Tests
// ============================================================================
