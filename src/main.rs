use std::env;

use byte_track::{ByteTracker, FrameGeometry, RawDetection, TrackerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> byte_track::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = match env::args().nth(1) {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    let mut tracker = ByteTracker::new(config)?;

    // detector input is half the size of the original frame
    let geometry = FrameGeometry::new((720, 1280), (360, 640));

    let frames = vec![
        vec![
            RawDetection::new(5.0, 5.0, 30.0, 30.0, 0.9, 0),
            RawDetection::new(100.0, 50.0, 120.0, 90.0, 0.8, 0),
        ],
        vec![
            RawDetection::new(6.0, 5.5, 31.0, 30.5, 0.88, 0),
            RawDetection::new(101.0, 50.0, 121.0, 90.0, 0.3, 0),
        ],
        vec![RawDetection::new(7.0, 6.0, 32.0, 31.0, 0.91, 0)],
        vec![],
    ];

    for detections in frames {
        let tracks = tracker.update(&detections, &geometry);
        info!(
            frame_id = tracker.frame_id(),
            tracks = tracks.len(),
            lost = tracker.lost_tracks().len(),
            "tracks: {:?}",
            tracks
        );
    }

    Ok(())
}
