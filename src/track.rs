//! Recorded GPS tracks.
//!
//! A [`Track`] owns a non-empty, chronologically ordered sequence of
//! [`GeoPoint`]s. It is never mutated after construction: [`Track::split`] and
//! [`Track::reduce`] return new, independently owned tracks. The polyline
//! projector used for nearest-point queries is built on first use and then
//! frozen, so a track can be shared across threads without locking.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use geo::Coord;
use log::{debug, info};

use crate::geo_utils::haversine;
use crate::projector::{PolylineProjector, Projection};
use crate::stats::{compute_stats, Stats};
use crate::{Bounds, GeoPoint, Result, TrackError, DEFAULT_ELEVATION_NOISE_THRESHOLD};

/// An ordered, immutable GPS track.
#[derive(Debug, Clone)]
pub struct Track {
    points: Vec<GeoPoint>,
    projector: OnceLock<PolylineProjector>,
}

impl Track {
    /// Create a track from points in recording order.
    ///
    /// Fails with [`TrackError::EmptyTrack`] when `points` is empty.
    ///
    /// # Example
    /// ```
    /// use peak_matcher::{GeoPoint, Track, TrackError};
    ///
    /// let track = Track::new(vec![GeoPoint::new(47.5896, -121.9411)]).unwrap();
    /// assert_eq!(track.len(), 1);
    ///
    /// assert!(matches!(Track::new(vec![]), Err(TrackError::EmptyTrack)));
    /// ```
    pub fn new(points: Vec<GeoPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(TrackError::EmptyTrack);
        }
        debug!("Created track with {} points", points.len());
        Ok(Self {
            points,
            projector: OnceLock::new(),
        })
    }

    /// Build a track from parallel activity streams.
    ///
    /// Point `i` is `latlngs[i]` (`[lat, lng]`), `elevations[i]` and
    /// `start + time_offsets[i]` seconds. `elevations` may be empty, in which
    /// case no point has an elevation. Offsets that push a timestamp outside
    /// chrono's range fail with [`TrackError::InvalidTimeOffset`].
    pub fn from_streams(
        start: DateTime<Utc>,
        latlngs: &[[f64; 2]],
        elevations: &[f64],
        time_offsets: &[i64],
    ) -> Result<Self> {
        let elevations_ok = elevations.is_empty() || elevations.len() == latlngs.len();
        if !elevations_ok || time_offsets.len() != latlngs.len() {
            return Err(TrackError::StreamLengthMismatch {
                latlngs: latlngs.len(),
                elevations: elevations.len(),
                times: time_offsets.len(),
            });
        }

        let points = latlngs
            .iter()
            .zip(time_offsets)
            .enumerate()
            .map(|(index, (&[lat, lng], &offset))| {
                let timestamp = Duration::try_seconds(offset)
                    .and_then(|delta| start.checked_add_signed(delta))
                    .ok_or(TrackError::InvalidTimeOffset { index, offset })?;
                Ok(GeoPoint {
                    latitude: lat,
                    longitude: lng,
                    elevation: elevations.get(index).copied(),
                    timestamp,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(points)
    }

    /// Build a track from the first segment of the first track of a GPX document.
    #[cfg(feature = "gpx")]
    pub fn from_gpx(doc: &gpx::Gpx) -> Result<Self> {
        let waypoints = doc
            .tracks
            .first()
            .and_then(|t| t.segments.first())
            .map(|s| s.points.as_slice())
            .unwrap_or_default();

        let points = waypoints
            .iter()
            .enumerate()
            .map(|(index, wp)| {
                let timestamp = wp
                    .time
                    .as_ref()
                    .and_then(|t| t.format().ok())
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .ok_or(TrackError::MissingTimestamp { index })?;
                let position = wp.point();
                Ok(GeoPoint {
                    latitude: position.y(),
                    longitude: position.x(),
                    elevation: wp.elevation,
                    timestamp,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(points)
    }

    /// Parse a GPX document and build a track from it (see [`Track::from_gpx`]).
    #[cfg(feature = "gpx")]
    pub fn read_gpx<R: std::io::Read>(reader: R) -> Result<Self> {
        let doc = gpx::read(reader)?;
        Self::from_gpx(&doc)
    }

    /// All points in recording order.
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Number of points (always at least one).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &GeoPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &GeoPoint {
        &self.points[self.points.len() - 1]
    }

    fn projector(&self) -> &PolylineProjector {
        self.projector
            .get_or_init(|| PolylineProjector::from_points(&self.points))
    }

    fn project(&self, target: Coord<f64>) -> Projection {
        match self.projector().project(target) {
            Some(projection) => projection,
            // Unreachable for a constructed track; mirror the single-point rule
            None => Projection {
                segment_index: self.points.len(),
                location: self.last().coord(),
                distance: haversine(target, self.last().coord()),
            },
        }
    }

    /// Closest recorded point to `target`, with its index.
    ///
    /// `target` is projected onto the track; of the two recorded points
    /// bracketing the projection, the one nearer the projected location is
    /// returned (the earlier one on exact ties). When the projection falls past
    /// the final point, the last point is returned.
    ///
    /// # Example
    /// ```
    /// use geo::Coord;
    /// use peak_matcher::{GeoPoint, Track};
    ///
    /// let track = Track::new(vec![
    ///     GeoPoint::new(47.58359, -121.95062),
    ///     GeoPoint::new(47.58878, -121.94447),
    ///     GeoPoint::new(47.58622, -121.93814),
    ///     GeoPoint::new(47.59582, -121.93571),
    /// ])?;
    ///
    /// let (point, index) = track.closest_point(Coord { x: -121.9411, y: 47.5896 });
    /// assert_eq!(index, 1);
    /// assert_eq!(point.latitude, 47.58878);
    /// # Ok::<(), peak_matcher::TrackError>(())
    /// ```
    pub fn closest_point(&self, target: Coord<f64>) -> (&GeoPoint, usize) {
        let projection = self.project(target);
        let n = self.points.len();

        if projection.segment_index >= n {
            return (self.last(), n - 1);
        }

        let later = projection.segment_index;
        let earlier = later - 1;
        let to_later = haversine(projection.location, self.points[later].coord());
        let to_earlier = haversine(projection.location, self.points[earlier].coord());

        let index = if to_later < to_earlier { later } else { earlier };
        (&self.points[index], index)
    }

    /// Great-circle distance in meters from `target` to the nearest location
    /// on the track (interpolated, not the nearest recorded point).
    pub fn shortest_distance_from_point(&self, target: Coord<f64>) -> f64 {
        self.project(target).distance
    }

    /// Bounding box of all points.
    pub fn bounds(&self) -> Bounds {
        crate::geo_utils::compute_bounds(&self.points)
    }

    /// Statistics with the default elevation noise threshold (18 m).
    pub fn stats(&self) -> Stats {
        self.stats_with_threshold(DEFAULT_ELEVATION_NOISE_THRESHOLD)
    }

    /// Statistics with a custom elevation noise threshold.
    pub fn stats_with_threshold(&self, noise_threshold: f64) -> Stats {
        compute_stats(&self.points, noise_threshold)
    }

    /// Split into `[0..=index]` and `[index..]`.
    ///
    /// The point at `index` ends the first half and starts the second, so the
    /// halves together hold `len() + 1` points. Fails with
    /// [`TrackError::InvalidSplitIndex`] when `index >= len()`.
    ///
    /// # Example
    /// ```
    /// use peak_matcher::{GeoPoint, Track};
    ///
    /// let points = (0..5).map(|i| GeoPoint::new(46.0 + i as f64 * 0.001, 7.0)).collect();
    /// let track = Track::new(points)?;
    /// let (up, down) = track.split(2)?;
    /// assert_eq!(up.len(), 3);
    /// assert_eq!(down.len(), 3);
    /// assert_eq!(up.last(), down.first());
    /// # Ok::<(), peak_matcher::TrackError>(())
    /// ```
    pub fn split(&self, index: usize) -> Result<(Track, Track)> {
        let len = self.points.len();
        if index >= len {
            return Err(TrackError::InvalidSplitIndex { index, len });
        }

        let first = Track::new(self.points[..=index].to_vec())?;
        let second = Track::new(self.points[index..].to_vec())?;
        debug!(
            "Split track of {} points at {} into {} + {}",
            len,
            index,
            first.len(),
            second.len()
        );
        Ok((first, second))
    }

    /// Decimate to at most `max_points` points by fixed-stride sampling.
    ///
    /// Keeps every `ceil(len / max_points)`-th point. The first and last points
    /// are always kept; if appending the last point would exceed the ceiling,
    /// it replaces the final sampled point. With `max_points < 2` the result
    /// holds just the first and last points. Tracks already within the
    /// ceiling, and single-point tracks, are copied unchanged.
    pub fn reduce(&self, max_points: usize) -> Track {
        let n = self.points.len();
        // A lone point is both first and last
        if n <= max_points || n == 1 {
            return self.clone_points();
        }

        let reduced = if max_points < 2 {
            vec![*self.first(), *self.last()]
        } else {
            let stride = n.div_ceil(max_points);
            let mut sampled: Vec<GeoPoint> = self.points.iter().step_by(stride).copied().collect();
            if (n - 1) % stride != 0 {
                if sampled.len() >= max_points {
                    sampled.pop();
                }
                sampled.push(*self.last());
            }
            sampled
        };

        info!("Reduced track from {} to {} points (limit {})", n, reduced.len(), max_points);
        Track {
            points: reduced,
            projector: OnceLock::new(),
        }
    }

    fn clone_points(&self) -> Track {
        Track {
            points: self.points.clone(),
            projector: OnceLock::new(),
        }
    }
}
