use crate::{bbox::BBox, detection::Detection, kalman_filter::KalmanFilter};

pub type TrackId = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrackState {
    /// Spawned but not yet confirmed.
    #[default]
    New,
    Tracked,
    Lost,
    Removed,
}

/// A confirmed track as reported for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerOutput {
    pub track_id: TrackId,
    pub tlwh: [f64; 4],
    pub score: f64,
}

/// A single object identity and its motion state.
#[derive(Clone, Debug)]
pub struct Track {
    id: TrackId,
    state: TrackState,
    kalman_filter: KalmanFilter,
    score: f64,
    class: u32,
    frame_id: u32,
    start_frame: u32,
    time_since_update: u32,
    tracklet_len: u32,
}

impl Track {
    pub fn new(id: TrackId, detection: &Detection) -> Self {
        Self {
            id,
            state: TrackState::New,
            kalman_filter: KalmanFilter::new(&detection.bbox),
            score: detection.score,
            class: detection.class,
            frame_id: 0,
            start_frame: 0,
            time_since_update: 0,
            tracklet_len: 0,
        }
    }

    /// Starts the track from `detection`. An unconfirmed track stays `New`
    /// until its next match.
    pub fn activate(&mut self, detection: &Detection, frame_id: u32, confirmed: bool) {
        self.kalman_filter = KalmanFilter::new(&detection.bbox);
        self.score = detection.score;
        self.class = detection.class;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
        self.time_since_update = 0;
        self.tracklet_len = 1;
        self.state = if confirmed {
            TrackState::Tracked
        } else {
            TrackState::New
        };
    }

    /// Picks a lost track back up.
    pub fn re_activate(&mut self, detection: &Detection, frame_id: u32) {
        self.kalman_filter.update(&detection.bbox);
        self.score = detection.score;
        self.frame_id = frame_id;
        self.time_since_update = 0;
        self.tracklet_len = 1;
        self.state = TrackState::Tracked;
    }

    pub fn update(&mut self, detection: &Detection, frame_id: u32) {
        self.kalman_filter.update(&detection.bbox);
        self.score = detection.score;
        self.frame_id = frame_id;
        self.time_since_update = 0;
        self.tracklet_len += 1;
        self.state = TrackState::Tracked;
    }

    /// Advances the motion model one frame and ages the track. A match later
    /// in the same frame resets the age.
    pub fn predict(&mut self) {
        if self.state != TrackState::Tracked {
            self.kalman_filter.freeze_height_velocity();
        }
        self.kalman_filter.predict();
        self.time_since_update += 1;
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn class(&self) -> u32 {
        self.class
    }

    /// Last frame this track was matched on.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn start_frame(&self) -> u32 {
        self.start_frame
    }

    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    pub fn tracklet_len(&self) -> u32 {
        self.tracklet_len
    }

    /// Frames between the first and the latest match.
    pub fn lifetime(&self) -> u32 {
        self.frame_id - self.start_frame
    }

    pub fn bbox(&self) -> BBox {
        self.kalman_filter.to_bbox()
    }

    pub fn tlwh(&self) -> [f64; 4] {
        self.kalman_filter.to_tlwh()
    }

    pub fn output(&self) -> TrackerOutput {
        TrackerOutput {
            track_id: self.id,
            tlwh: self.tlwh(),
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x: f64, y: f64, w: f64, h: f64, score: f64) -> Detection {
        Detection::from_tlwh([x, y, w, h], score, 0).unwrap()
    }

    #[test]
    fn test_activate_confirms_track() {
        let det = detection(10.0, 10.0, 40.0, 40.0, 0.9);
        let mut track = Track::new(7, &det);
        assert_eq!(track.state(), TrackState::New);

        track.activate(&det, 3, true);

        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(track.start_frame(), 3);
        assert_eq!(track.tracklet_len(), 1);
        assert_eq!(track.id(), 7);
    }

    #[test]
    fn test_unconfirmed_activation_stays_new() {
        let det = detection(10.0, 10.0, 40.0, 40.0, 0.9);
        let mut track = Track::new(1, &det);

        track.activate(&det, 2, false);

        assert_eq!(track.state(), TrackState::New);
    }

    #[test]
    fn test_update_resets_age_and_extends_tracklet() {
        let det = detection(10.0, 10.0, 40.0, 40.0, 0.9);
        let mut track = Track::new(1, &det);
        track.activate(&det, 1, true);

        track.predict();
        assert_eq!(track.time_since_update(), 1);
        track.update(&detection(12.0, 11.0, 40.0, 40.0, 0.8), 2);

        assert_eq!(track.time_since_update(), 0);
        assert_eq!(track.tracklet_len(), 2);
        assert_eq!(track.score(), 0.8);
        assert_eq!(track.lifetime(), 1);
    }

    #[test]
    fn test_lost_track_is_reactivated() {
        let det = detection(10.0, 10.0, 40.0, 40.0, 0.9);
        let mut track = Track::new(1, &det);
        track.activate(&det, 1, true);

        for _ in 0..3 {
            track.predict();
        }
        track.mark_lost();
        assert_eq!(track.state(), TrackState::Lost);
        assert_eq!(track.time_since_update(), 3);

        track.re_activate(&det, 4);

        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(track.time_since_update(), 0);
        assert_eq!(track.frame_id(), 4);
    }

    #[test]
    fn test_output_reports_motion_box() {
        let det = detection(10.0, 10.0, 40.0, 40.0, 0.9);
        let mut track = Track::new(5, &det);
        track.activate(&det, 1, true);

        let output = track.output();

        assert_eq!(output.track_id, 5);
        assert_eq!(output.score, 0.9);
        assert!((output.tlwh[2] - 40.0).abs() < 1e-9);
    }
}
