//! Nearest-point-on-polyline queries.
//!
//! A [`PolylineProjector`] is built once from the lat/lon sequence of a track and
//! answers "where on this path is the point closest to X" for arbitrary query
//! locations, typically candidate peaks.
//!
//! Each segment is treated as a straight line in a local equirectangular frame
//! centred on the query latitude (longitudes scaled by `cos(lat)`), which is an
//! adequate stand-in for the great-circle arc between two nearby GPS fixes. The
//! winning segment is the one whose projected location has the smallest
//! great-circle distance to the query.

use geo::{Coord, Line, LineString};

use crate::geo_utils::{haversine, to_local};
use crate::GeoPoint;

/// Result of projecting a location onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Index of the later endpoint of the winning segment.
    ///
    /// Always `>= 1`. For a single-vertex polyline this is `1`, one past the
    /// last vertex.
    pub segment_index: usize,
    /// Interpolated location on the segment (`x` = lon, `y` = lat).
    pub location: Coord<f64>,
    /// Great-circle distance in meters from the query to `location`.
    pub distance: f64,
}

/// Cached polyline geometry for a track.
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineProjector {
    line: LineString<f64>,
}

impl PolylineProjector {
    /// Build a projector from lat/lon coordinates in traversal order.
    pub fn new(coords: Vec<Coord<f64>>) -> Self {
        Self {
            line: LineString::new(coords),
        }
    }

    /// Build a projector from GPS points. Elevation and time are ignored.
    pub fn from_points(points: &[GeoPoint]) -> Self {
        Self::new(points.iter().map(GeoPoint::coord).collect())
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.line.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.0.is_empty()
    }

    /// Vertex at `index`, if any.
    pub fn vertex(&self, index: usize) -> Option<Coord<f64>> {
        self.line.0.get(index).copied()
    }

    /// Project `target` onto the nearest point of the polyline.
    ///
    /// Returns `None` only for an empty polyline. On equal distances the
    /// segment with the lower index wins.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo::Coord;
    /// use peak_matcher::PolylineProjector;
    ///
    /// let projector = PolylineProjector::new(vec![
    ///     Coord { x: 7.00, y: 45.0 },
    ///     Coord { x: 7.01, y: 45.0 },
    /// ]);
    ///
    /// let p = projector.project(Coord { x: 7.005, y: 45.001 }).unwrap();
    /// assert_eq!(p.segment_index, 1);
    /// assert!((p.location.x - 7.005).abs() < 1e-9);
    /// assert!((p.distance - 111.3).abs() < 1.0);
    /// ```
    pub fn project(&self, target: Coord<f64>) -> Option<Projection> {
        let first = *self.line.0.first()?;
        let cos_lat = target.y.to_radians().cos();

        if self.line.0.len() == 1 {
            return Some(Projection {
                segment_index: 1,
                location: first,
                distance: haversine(target, first),
            });
        }

        let mut best: Option<Projection> = None;
        for (i, segment) in self.line.lines().enumerate() {
            let location = project_onto_segment(segment, target, cos_lat);
            let candidate = Projection {
                segment_index: i + 1,
                location,
                distance: haversine(target, location),
            };

            // Strict comparison keeps the earliest segment on ties
            if best.map_or(true, |current| candidate.distance < current.distance) {
                best = Some(candidate);
            }
        }

        best
    }
}

/// Closest point of `segment` to `target`, computed in the local frame.
///
/// A zero-length segment projects onto its single point.
fn project_onto_segment(segment: Line<f64>, target: Coord<f64>, cos_lat: f64) -> Coord<f64> {
    let a = to_local(segment.start, cos_lat);
    let b = to_local(segment.end, cos_lat);
    let q = to_local(target, cos_lat);

    let ab = b - a;
    let len2 = ab.x * ab.x + ab.y * ab.y;
    if len2 == 0.0 {
        return segment.start;
    }

    let aq = q - a;
    let t = ((aq.x * ab.x + aq.y * ab.y) / len2).clamp(0.0, 1.0);

    segment.start + segment.delta() * t
}
