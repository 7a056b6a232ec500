//! Peak matching and ascent assembly.
//!
//! Turns a recorded [`Track`] and a set of candidate [`Peak`]s into ascent
//! records ready for upload:
//!
//! 1. The track bounds, widened by a small margin, are handed to a
//!    [`PeakLookup`] to find nearby summits.
//! 2. Each candidate is projected onto the track; peaks within the on-track
//!    threshold count as summited.
//! 3. Each summited peak becomes an [`Ascent`] dated by the closest recorded
//!    point. When exactly one peak was summited the track is split there and
//!    separate up/down figures are attached.
//! 4. The track is decimated to the upload ceiling if needed.
//!
//! Network access (peak lookup, upload, activity download) stays behind the
//! [`PeakLookup`] trait and the caller.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};

use crate::{Bounds, GeoPoint, MatchConfig, Peak, Result, Track, TrackError};

/// Error type returned by collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Source of candidate peaks inside a bounding box.
pub trait PeakLookup {
    fn find_peaks(&self, bounds: &Bounds) -> std::result::Result<Vec<Peak>, BoxError>;
}

impl<F> PeakLookup for F
where
    F: Fn(&Bounds) -> std::result::Result<Vec<Peak>, BoxError>,
{
    fn find_peaks(&self, bounds: &Bounds) -> std::result::Result<Vec<Peak>, BoxError> {
        self(bounds)
    }
}

// ============================================================================
// Peak Matching
// ============================================================================

/// How a single peak relates to a track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakMatch {
    pub peak: Peak,
    /// `shortest_distance` is below the on-track threshold
    pub on_track: bool,
    /// Recorded point nearest the peak's projection on the track
    pub closest_point: GeoPoint,
    pub closest_index: usize,
    /// Distance in meters from the peak to the track
    pub shortest_distance: f64,
}

/// Bounds to query for peaks: the track bounds widened by the configured margin.
pub fn search_bounds(track: &Track, config: &MatchConfig) -> Bounds {
    track.bounds().extend(config.bounds_margin_degrees)
}

/// Project one peak onto the track.
pub fn match_peak(track: &Track, peak: &Peak, config: &MatchConfig) -> PeakMatch {
    let target = peak.coord();
    let shortest_distance = track.shortest_distance_from_point(target);
    let (closest_point, closest_index) = track.closest_point(target);

    PeakMatch {
        peak: peak.clone(),
        on_track: shortest_distance < config.on_track_threshold,
        closest_point: *closest_point,
        closest_index,
        shortest_distance,
    }
}

/// Project every peak onto the track, preserving input order.
pub fn match_peaks(track: &Track, peaks: &[Peak], config: &MatchConfig) -> Vec<PeakMatch> {
    let matches: Vec<PeakMatch> = peaks.iter().map(|p| match_peak(track, p, config)).collect();
    debug!(
        "Matched {} peaks against track of {} points, {} on track",
        matches.len(),
        track.len(),
        matches.iter().filter(|m| m.on_track).count()
    );
    matches
}

/// Same as [`match_peaks`] but spreads the projections over the rayon pool.
#[cfg(feature = "parallel")]
pub fn match_peaks_parallel(track: &Track, peaks: &[Peak], config: &MatchConfig) -> Vec<PeakMatch> {
    use rayon::prelude::*;

    peaks
        .par_iter()
        .map(|p| match_peak(track, p, config))
        .collect()
}

/// Keep only the peaks lying on the track.
pub fn peaks_on_track(track: &Track, peaks: &[Peak], config: &MatchConfig) -> Vec<PeakMatch> {
    match_peaks(track, peaks, config)
        .into_iter()
        .filter(|m| m.on_track)
        .collect()
}

// ============================================================================
// Ascents
// ============================================================================

/// Figures for one direction of travel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AscentLeg {
    /// End elevation minus start elevation of the leg
    pub net_elevation_change: Option<f64>,
    /// Climbing against the leg's direction: loss on the way up, gain on the way down
    pub extra_elevation: f64,
    /// 3-D distance in meters
    pub distance: f64,
    #[cfg_attr(feature = "serde", serde(with = "crate::stats::duration_seconds"))]
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AscentLegs {
    pub up: AscentLeg,
    pub down: AscentLeg,
}

/// An ascent ready to be filed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ascent {
    pub peak_id: String,
    pub peak_name: String,
    /// Time of the recorded point closest to the summit
    pub date: DateTime<Utc>,
    pub closest_index: usize,
    /// Elevation at the start of the whole track
    pub start_elevation: Option<f64>,
    /// Elevation at the end of the whole track
    pub end_elevation: Option<f64>,
    /// Up/down figures, present only when the track summits a single peak
    pub legs: Option<AscentLegs>,
}

/// An ascent already on record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExistingAscent {
    pub ascent_id: String,
    pub peak_id: String,
    pub date: NaiveDate,
}

/// True when `peak_id` was already logged on the calendar day of `date` (UTC).
pub fn has_ascent(existing: &[ExistingAscent], peak_id: &str, date: &DateTime<Utc>) -> bool {
    let day = date.date_naive();
    existing.iter().any(|a| a.peak_id == peak_id && a.date == day)
}

/// Split the track at `index` and summarize each half.
fn ascent_legs(track: &Track, index: usize, config: &MatchConfig) -> Result<AscentLegs> {
    let (up_track, down_track) = track.split(index)?;
    let up = up_track.stats_with_threshold(config.elevation_noise_threshold);
    let down = down_track.stats_with_threshold(config.elevation_noise_threshold);

    let net = |start: Option<f64>, end: Option<f64>| Some(end? - start?);

    Ok(AscentLegs {
        up: AscentLeg {
            net_elevation_change: net(up.start_elevation, up.end_elevation),
            extra_elevation: up.elevation_loss,
            distance: up.distance,
            duration: up.duration,
        },
        down: AscentLeg {
            net_elevation_change: net(down.start_elevation, down.end_elevation),
            extra_elevation: down.elevation_gain,
            distance: down.distance,
            duration: down.duration,
        },
    })
}

/// Build one ascent per on-track match.
///
/// Up/down legs are computed only when `matches` holds exactly one peak; with
/// several summits there is no single turnaround point.
pub fn build_ascents(
    track: &Track,
    matches: &[PeakMatch],
    config: &MatchConfig,
) -> Result<Vec<Ascent>> {
    let with_legs = matches.len() == 1;

    matches
        .iter()
        .map(|m| {
            let legs = if with_legs {
                Some(ascent_legs(track, m.closest_index, config)?)
            } else {
                None
            };
            Ok(Ascent {
                peak_id: m.peak.id.clone(),
                peak_name: m.peak.name.clone(),
                date: m.closest_point.timestamp,
                closest_index: m.closest_index,
                start_elevation: track.first().elevation,
                end_elevation: track.last().elevation,
                legs,
            })
        })
        .collect()
}

/// Everything needed to file the ascents of one activity.
#[derive(Debug, Clone)]
pub struct AscentPlan {
    /// Peaks found on the track, in lookup order
    pub peaks_on_track: Vec<PeakMatch>,
    /// New ascents to file
    pub ascents: Vec<Ascent>,
    /// Ascents skipped because the same peak was already logged that day
    pub duplicates: Vec<Ascent>,
    /// Track capped to the upload point limit
    pub upload_track: Track,
}

/// Run the whole matching flow for one track.
///
/// Queries `lookup` around the track, keeps on-track peaks, builds ascents,
/// sets aside those already present in `existing`, and caps the track for
/// upload.
pub fn prepare_ascents<L: PeakLookup + ?Sized>(
    track: &Track,
    lookup: &L,
    existing: &[ExistingAscent],
    config: &MatchConfig,
) -> Result<AscentPlan> {
    let bounds = search_bounds(track, config);
    let candidates = lookup.find_peaks(&bounds).map_err(TrackError::PeakLookup)?;
    info!("Found {} candidate peaks around the track", candidates.len());

    let on_track = peaks_on_track(track, &candidates, config);
    if on_track.is_empty() {
        warn!("No peaks found on track");
    } else {
        info!("Found {} peaks on track", on_track.len());
    }

    let built = build_ascents(track, &on_track, config)?;
    let (duplicates, ascents): (Vec<Ascent>, Vec<Ascent>) = built
        .into_iter()
        .partition(|a| has_ascent(existing, &a.peak_id, &a.date));
    for dup in &duplicates {
        warn!(
            "Ascent of '{}' on {} already exists",
            dup.peak_name,
            dup.date.format("%b %-d, %Y")
        );
    }

    let upload_track = track.reduce(config.max_upload_points);

    Ok(AscentPlan {
        peaks_on_track: on_track,
        ascents,
        duplicates,
        upload_track,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 14, 7, 0, 0).unwrap()
    }

    /// Out-and-back hike: climbs north for 6 fixes, then returns south.
    fn summit_track() -> Track {
        let elevations = [
            1000.0, 1100.0, 1150.0, 1300.0, 1420.0, 1500.0, 1380.0, 1250.0, 1100.0, 1010.0,
        ];
        let lats = [46.000, 46.002, 46.004, 46.006, 46.008, 46.010, 46.008, 46.006, 46.004, 46.002];
        let points = lats
            .iter()
            .zip(elevations)
            .enumerate()
            .map(|(i, (&lat, ele))| {
                // Return leg runs slightly east of the way up
                let lng = if i > 5 { 7.0005 } else { 7.0 };
                let time = start_time() + Duration::minutes(i as i64 * 10);
                GeoPoint::with_all(lat, lng, Some(ele), time)
            })
            .collect();
        Track::new(points).unwrap()
    }

    fn summit() -> Peak {
        Peak::new("101", "Pointe Nord", 46.0101, 7.0)
    }

    fn far_peak() -> Peak {
        Peak::new("202", "Far Away", 46.005, 7.02)
    }

    #[test]
    fn test_search_bounds_adds_margin() {
        let track = summit_track();
        let b = search_bounds(&track, &MatchConfig::default());
        assert!(approx_eq(b.min_lat, 45.99, 1e-9));
        assert!(approx_eq(b.max_lat, 46.02, 1e-9));
        assert!(approx_eq(b.min_lng, 6.99, 1e-9));
        assert!(approx_eq(b.max_lng, 7.0105, 1e-9));
    }

    #[test]
    fn test_match_peak_on_track() {
        let track = summit_track();
        let m = match_peak(&track, &summit(), &MatchConfig::default());
        assert!(m.on_track);
        assert_eq!(m.closest_index, 5);
        assert_eq!(m.closest_point.elevation, Some(1500.0));
        assert!(m.shortest_distance < 15.0);
    }

    #[test]
    fn test_match_peak_off_track() {
        let track = summit_track();
        let m = match_peak(&track, &far_peak(), &MatchConfig::default());
        assert!(!m.on_track);
        assert!(m.shortest_distance > 1000.0);
    }

    #[test]
    fn test_nan_peak_is_never_on_track() {
        let track = summit_track();
        let broken = Peak::new("x", "Unknown", f64::NAN, 7.0);
        let m = match_peak(&track, &broken, &MatchConfig::default());
        assert!(m.shortest_distance.is_nan());
        assert!(!m.on_track);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let track = summit_track();
        let strict = MatchConfig {
            on_track_threshold: 1.0,
            ..MatchConfig::default()
        };
        assert!(!match_peak(&track, &summit(), &strict).on_track);
    }

    #[test]
    fn test_peaks_on_track_filters_and_keeps_order() {
        let track = summit_track();
        let also_on = Peak::new("303", "Shoulder", 46.004, 7.0);
        let candidates = [summit(), far_peak(), also_on];
        let matches = peaks_on_track(&track, &candidates, &MatchConfig::default());
        let ids: Vec<&str> = matches.iter().map(|m| m.peak.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "303"]);
    }

    #[test]
    fn test_single_summit_gets_legs() {
        let track = summit_track();
        let config = MatchConfig::default();
        let matches = peaks_on_track(&track, &[summit()], &config);
        let ascents = build_ascents(&track, &matches, &config).unwrap();

        assert_eq!(ascents.len(), 1);
        let ascent = &ascents[0];
        assert_eq!(ascent.peak_id, "101");
        assert_eq!(ascent.date, start_time() + Duration::minutes(50));
        assert_eq!(ascent.start_elevation, Some(1000.0));
        assert_eq!(ascent.end_elevation, Some(1010.0));

        let legs = ascent.legs.as_ref().unwrap();
        assert_eq!(legs.up.net_elevation_change, Some(500.0));
        assert_eq!(legs.up.extra_elevation, 0.0);
        assert_eq!(legs.up.duration, Duration::minutes(50));
        assert_eq!(legs.down.net_elevation_change, Some(-490.0));
        assert_eq!(legs.down.extra_elevation, 0.0);
        assert_eq!(legs.down.duration, Duration::minutes(40));

        let total = track.stats().distance;
        assert!(legs.up.distance > 0.0 && legs.down.distance > 0.0);
        assert!(approx_eq(legs.up.distance + legs.down.distance, total, 1e-6));
    }

    #[test]
    fn test_extra_elevation_counts_counter_direction() {
        // Dips 40 m on the way up, climbs 30 m on the way down
        let elevations = [1000.0, 1200.0, 1160.0, 1400.0, 1250.0, 1280.0, 1000.0];
        let points = elevations
            .iter()
            .enumerate()
            .map(|(i, &e)| {
                let time = start_time() + Duration::minutes(i as i64);
                GeoPoint::with_all(46.0 + i as f64 * 0.001, 7.0, Some(e), time)
            })
            .collect();
        let track = Track::new(points).unwrap();
        let summit = Peak::new("9", "Top", 46.003, 7.0);

        let config = MatchConfig::default();
        let matches = peaks_on_track(&track, &[summit], &config);
        let ascents = build_ascents(&track, &matches, &config).unwrap();
        let legs = ascents[0].legs.as_ref().unwrap();

        assert_eq!(ascents[0].closest_index, 3);
        assert_eq!(legs.up.extra_elevation, 40.0);
        assert_eq!(legs.down.extra_elevation, 30.0);
    }

    #[test]
    fn test_multiple_summits_have_no_legs() {
        let track = summit_track();
        let config = MatchConfig::default();
        let shoulder = Peak::new("303", "Shoulder", 46.004, 7.0);
        let matches = peaks_on_track(&track, &[summit(), shoulder], &config);
        let ascents = build_ascents(&track, &matches, &config).unwrap();

        assert_eq!(ascents.len(), 2);
        assert!(ascents.iter().all(|a| a.legs.is_none()));
        assert!(ascents.iter().all(|a| a.start_elevation == Some(1000.0)));
    }

    #[test]
    fn test_has_ascent_same_day_only() {
        let existing = vec![ExistingAscent {
            ascent_id: "a1".to_string(),
            peak_id: "101".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 7, 14).unwrap(),
        }];
        let same_day = Utc.with_ymd_and_hms(2024, 7, 14, 18, 30, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap();

        assert!(has_ascent(&existing, "101", &same_day));
        assert!(!has_ascent(&existing, "101", &next_day));
        assert!(!has_ascent(&existing, "202", &same_day));
    }

    #[test]
    fn test_prepare_ascents_end_to_end() {
        let track = summit_track();
        let lookup = |bounds: &Bounds| -> std::result::Result<Vec<Peak>, BoxError> {
            Ok([summit(), far_peak()]
                .into_iter()
                .filter(|p| bounds.contains(p.latitude, p.longitude))
                .collect())
        };

        let plan = prepare_ascents(&track, &lookup, &[], &MatchConfig::default()).unwrap();
        assert_eq!(plan.peaks_on_track.len(), 1);
        assert_eq!(plan.ascents.len(), 1);
        assert!(plan.duplicates.is_empty());
        assert!(plan.ascents[0].legs.is_some());
        assert_eq!(plan.upload_track.points(), track.points());
    }

    #[test]
    fn test_prepare_ascents_skips_duplicates() {
        let track = summit_track();
        let lookup =
            |_: &Bounds| -> std::result::Result<Vec<Peak>, BoxError> { Ok(vec![summit()]) };
        let existing = vec![ExistingAscent {
            ascent_id: "a1".to_string(),
            peak_id: "101".to_string(),
            date: start_time().date_naive(),
        }];

        let plan = prepare_ascents(&track, &lookup, &existing, &MatchConfig::default()).unwrap();
        assert!(plan.ascents.is_empty());
        assert_eq!(plan.duplicates.len(), 1);
    }

    #[test]
    fn test_prepare_ascents_caps_upload_track() {
        let track = summit_track();
        let lookup = |_: &Bounds| -> std::result::Result<Vec<Peak>, BoxError> { Ok(vec![]) };
        let config = MatchConfig {
            max_upload_points: 4,
            ..MatchConfig::default()
        };

        let plan = prepare_ascents(&track, &lookup, &[], &config).unwrap();
        assert!(plan.ascents.is_empty());
        assert!(plan.upload_track.len() <= 4);
        assert_eq!(plan.upload_track.last(), track.last());
    }

    #[test]
    fn test_prepare_ascents_propagates_lookup_errors() {
        let track = summit_track();
        let lookup = |_: &Bounds| -> std::result::Result<Vec<Peak>, BoxError> {
            Err("service unavailable".into())
        };

        let err = prepare_ascents(&track, &lookup, &[], &MatchConfig::default()).unwrap_err();
        assert!(matches!(err, TrackError::PeakLookup(_)));
        assert_eq!(err.to_string(), "Peak lookup failed: service unavailable");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let track = summit_track();
        let peaks: Vec<Peak> = (0..50)
            .map(|i| {
                let (lat, lng) = (46.0 + i as f64 * 0.0003, 7.0 + i as f64 * 0.0001);
                Peak::new(i.to_string(), format!("P{}", i), lat, lng)
            })
            .collect();
        let config = MatchConfig::default();
        assert_eq!(
            match_peaks_parallel(&track, &peaks, &config),
            match_peaks(&track, &peaks, &config)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ascent_serializes_leg_durations_as_seconds() {
        let track = summit_track();
        let config = MatchConfig::default();
        let matches = peaks_on_track(&track, &[summit()], &config);
        let ascents = build_ascents(&track, &matches, &config).unwrap();

        let json = serde_json::to_value(&ascents[0]).unwrap();
        assert_eq!(json["legs"]["up"]["duration"], 3000);
        assert_eq!(json["peak_id"], "101");
    }
}
