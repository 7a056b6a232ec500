//! Track statistics: duration, 3-D distance and noise-filtered elevation gain/loss.
//!
//! Elevation from consumer GPS units and barometric altimeters jitters by
//! several meters between fixes. Summing every delta inflates cumulative relief,
//! so gain and loss are accumulated over a thinned sequence: a sample is kept
//! only if it differs from the last kept sample by more than a threshold.

use chrono::Duration;

use crate::geo_utils::polyline_length_3d;
use crate::GeoPoint;

/// Summary of a track or track segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Last timestamp minus first timestamp.
    #[cfg_attr(feature = "serde", serde(with = "duration_seconds"))]
    pub duration: Duration,
    /// Filtered cumulative climb in meters, never negative.
    pub elevation_gain: f64,
    /// Filtered cumulative descent in meters, never negative.
    pub elevation_loss: f64,
    /// Raw elevation of the first point.
    pub start_elevation: Option<f64>,
    /// Raw elevation of the last point.
    pub end_elevation: Option<f64>,
    /// Cumulative 3-D length in meters.
    pub distance: f64,
}

/// Summarize an ordered point sequence.
///
/// An empty slice yields zeroed stats with no elevations.
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, TimeZone, Utc};
/// use peak_matcher::{GeoPoint, compute_stats};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap();
/// let points = vec![
///     GeoPoint::with_all(46.000, 7.0, Some(1000.0), t0),
///     GeoPoint::with_all(46.001, 7.0, Some(1050.0), t0 + Duration::minutes(10)),
/// ];
///
/// let stats = compute_stats(&points, 18.0);
/// assert_eq!(stats.elevation_gain, 50.0);
/// assert_eq!(stats.duration, Duration::minutes(10));
/// ```
pub fn compute_stats(points: &[GeoPoint], noise_threshold: f64) -> Stats {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Stats {
                duration: Duration::zero(),
                elevation_gain: 0.0,
                elevation_loss: 0.0,
                start_elevation: None,
                end_elevation: None,
                distance: 0.0,
            }
        }
    };

    let (elevation_gain, elevation_loss) = elevation_gain_loss(points, noise_threshold);

    Stats {
        duration: last.timestamp - first.timestamp,
        elevation_gain,
        elevation_loss,
        start_elevation: first.elevation,
        end_elevation: last.elevation,
        distance: polyline_length_3d(points),
    }
}

/// Cumulative (gain, loss) in meters over the thinned elevation sequence.
///
/// Points without elevation are skipped. The first defined sample is always
/// kept; later samples are kept only when they differ from the last kept one by
/// strictly more than `threshold`. Both values are non-negative for any
/// threshold, including zero or negative ones (which keep every sample).
pub fn elevation_gain_loss(points: &[GeoPoint], threshold: f64) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut last_kept: Option<f64> = None;

    for elevation in points.iter().filter_map(|p| p.elevation) {
        match last_kept {
            None => last_kept = Some(elevation),
            Some(prev) => {
                let delta = elevation - prev;
                if delta.abs() > threshold {
                    if delta > 0.0 {
                        gain += delta;
                    } else {
                        loss -= delta;
                    }
                    last_kept = Some(elevation);
                }
            }
        }
    }

    (gain, loss)
}

/// Serde adapter storing a `chrono::Duration` as whole seconds.
#[cfg(feature = "serde")]
pub(crate) mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.num_seconds().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::seconds)
    }
}
