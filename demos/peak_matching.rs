//! Match a short out-and-back hike against a few nearby peaks.
//!
//! Run with: cargo run --example peak_matching

use chrono::{TimeZone, Utc};
use peak_matcher::{
    match_peaks, prepare_ascents, BoxError, Bounds, ExistingAscent, MatchConfig, Peak, Track,
};

fn main() -> peak_matcher::Result<()> {
    // Up the ridge due north, back down a parallel path ~40 m to the east
    let latlngs = [
        [46.000, 7.0000],
        [46.002, 7.0000],
        [46.004, 7.0000],
        [46.006, 7.0000],
        [46.008, 7.0000],
        [46.010, 7.0000], // Summit
        [46.008, 7.0005],
        [46.006, 7.0005],
        [46.004, 7.0005],
        [46.002, 7.0005],
    ];
    let elevations = [
        1000.0, 1100.0, 1150.0, 1300.0, 1420.0, 1500.0, 1380.0, 1250.0, 1100.0, 1010.0,
    ];
    let offsets: Vec<i64> = (0..latlngs.len() as i64).map(|i| i * 600).collect();

    let start = Utc.with_ymd_and_hms(2024, 7, 14, 7, 0, 0).unwrap();
    let track = Track::from_streams(start, &latlngs, &elevations, &offsets)?;

    let peaks = vec![
        Peak::new("101", "Pointe du Midi", 46.0101, 7.0),
        Peak::new("102", "Col Rouge", 46.004, 7.0),
        Peak::new("103", "Dent Blanche", 46.005, 7.02),
    ];

    let config = MatchConfig::default();

    println!("Peak Matching Example\n");
    println!(
        "Config: on_track_threshold={}m, elevation_noise_threshold={}m, margin={} deg\n",
        config.on_track_threshold, config.elevation_noise_threshold, config.bounds_margin_degrees
    );

    let stats = track.stats();
    println!("1. Track summary ({} points):", track.len());
    println!("   Duration: {} min", stats.duration.num_minutes());
    println!("   Distance: {:.0}m", stats.distance);
    println!("   Gain/loss: +{:.0}m / -{:.0}m\n", stats.elevation_gain, stats.elevation_loss);

    println!("2. Distance from each peak to the track:");
    for m in match_peaks(&track, &peaks, &config) {
        println!(
            "   {} ({}): {:.1}m, closest point #{}{}",
            m.peak.name,
            m.peak.id,
            m.shortest_distance,
            m.closest_index,
            if m.on_track { " [on track]" } else { "" }
        );
    }
    println!();

    // A previous upload already recorded the col for this day
    let existing = vec![ExistingAscent {
        ascent_id: "a-77".to_string(),
        peak_id: "102".to_string(),
        date: start.date_naive(),
    }];

    let lookup = |bounds: &Bounds| -> Result<Vec<Peak>, BoxError> {
        Ok(peaks
            .iter()
            .filter(|p| bounds.contains(p.latitude, p.longitude))
            .cloned()
            .collect())
    };

    let plan = prepare_ascents(&track, &lookup, &existing, &config)?;

    println!("3. Ascent plan:");
    for ascent in &plan.ascents {
        println!("   New: {} at {}", ascent.peak_name, ascent.date.format("%H:%M"));
        if let Some(legs) = &ascent.legs {
            println!(
                "      up {:.0}m in {} min, down {:.0}m in {} min",
                legs.up.distance,
                legs.up.duration.num_minutes(),
                legs.down.distance,
                legs.down.duration.num_minutes()
            );
        }
    }
    for ascent in &plan.duplicates {
        println!("   Already logged: {}", ascent.peak_name);
    }
    println!("   Upload track: {} points", plan.upload_track.len());

    // Halves around the summit
    let (up, down) = track.split(5)?;
    println!("\n4. Split at the summit: {} points up, {} points down", up.len(), down.len());

    Ok(())
}
