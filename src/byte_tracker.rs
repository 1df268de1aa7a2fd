use std::mem;

use itertools::{Either, Itertools, iproduct};
use tracing::{debug, trace};

use crate::{
    associate::{associate, iou_distance},
    bbox::BBox,
    config::{Confirmation, TrackerConfig},
    detection::{Detection, FrameGeometry, RawDetection, prepare_detections},
    error::Result,
    track::{Track, TrackId, TrackState, TrackerOutput},
};

// A tracked and a lost track overlapping this much describe the same object.
const DUPLICATE_IOU_DISTANCE: f64 = 0.15;

/// Multi object tracker associating detections in two confidence tiers.
///
/// Every frame the active tracks are predicted forward, matched against the
/// high score detections, and the tracks that are still unmatched get a second
/// chance against the low score ones. Low score detections never start a
/// track.
pub struct ByteTracker {
    config: TrackerConfig,
    max_time_lost: u32,
    frame_id: u32,
    next_id: TrackId,
    // tracked and unconfirmed tracks, ascending id
    tracked_tracks: Vec<Track>,
    lost_tracks: Vec<Track>,
}

impl ByteTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_time_lost: config.max_time_lost(),
            config,
            frame_id: 0,
            next_id: 1,
            tracked_tracks: Vec::new(),
            lost_tracks: Vec::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames processed so far.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Tracks currently `Tracked`, plus unconfirmed `New` ones.
    pub fn tracked_tracks(&self) -> &[Track] {
        &self.tracked_tracks
    }

    pub fn lost_tracks(&self) -> &[Track] {
        &self.lost_tracks
    }

    /// Drops every track and restarts the frame count. Ids keep increasing so
    /// none is ever handed out twice.
    pub fn reset(&mut self) {
        for track in self.tracked_tracks.iter_mut().chain(self.lost_tracks.iter_mut()) {
            track.mark_removed();
        }
        self.tracked_tracks.clear();
        self.lost_tracks.clear();
        self.frame_id = 0;
    }

    /// Runs one frame of raw detector output, given in detector-input
    /// coordinates.
    pub fn update(
        &mut self,
        detections: &[RawDetection],
        geometry: &FrameGeometry,
    ) -> Vec<TrackerOutput> {
        let detections = prepare_detections(detections, geometry);
        self.update_detections(&detections)
    }

    /// Runs one frame of detections already in original-frame coordinates.
    pub fn update_detections(&mut self, detections: &[Detection]) -> Vec<TrackerOutput> {
        let frame_id = self.frame_id + 1;
        let track_thresh = self.config.track_thresh;
        let low_thresh = self.config.low_thresh;

        let (high_detections, low_detections): (Vec<Detection>, Vec<Detection>) = detections
            .iter()
            .filter(|detection| detection.score >= track_thresh || detection.score > low_thresh)
            .partition_map(|detection| {
                if detection.score >= track_thresh {
                    Either::Left(*detection)
                } else {
                    Either::Right(*detection)
                }
            });

        let (mut unconfirmed, tracked): (Vec<Track>, Vec<Track>) =
            mem::take(&mut self.tracked_tracks)
                .into_iter()
                .partition(|track| track.state() == TrackState::New);

        let mut pool: Vec<Track> = tracked
            .into_iter()
            .chain(mem::take(&mut self.lost_tracks))
            .collect();
        pool.iter_mut().for_each(Track::predict);

        // first association, high score detections against every active track
        let first = associate(
            &track_bboxes(&pool),
            &high_detections,
            self.config.match_thresh,
            self.config.fuse_score,
        );

        for &(track_index, detection_index) in &first.matches {
            let track = &mut pool[track_index];
            let detection = &high_detections[detection_index];
            trace!(track_id = track.id(), ?detection, "first association");
            if track.state() == TrackState::Tracked {
                track.update(detection, frame_id);
            } else {
                track.re_activate(detection, frame_id);
            }
        }

        // second association, low score detections against tracks that were
        // tracked on the previous frame
        let remaining: Vec<usize> = first
            .unmatched_tracks
            .iter()
            .copied()
            .filter(|&index| pool[index].state() == TrackState::Tracked)
            .collect();
        let remaining_bboxes: Vec<BBox> = remaining.iter().map(|&i| pool[i].bbox()).collect();
        let second = associate(
            &remaining_bboxes,
            &low_detections,
            self.config.low_match_thresh,
            false,
        );

        for &(remaining_index, detection_index) in &second.matches {
            let track = &mut pool[remaining[remaining_index]];
            trace!(track_id = track.id(), "second association");
            track.update(&low_detections[detection_index], frame_id);
        }
        for &remaining_index in &second.unmatched_tracks {
            pool[remaining[remaining_index]].mark_lost();
        }

        // unconfirmed tracks get the high score detections nobody claimed
        let leftovers: Vec<Detection> = first
            .unmatched_detections
            .iter()
            .map(|&index| high_detections[index])
            .collect();
        let third = associate(
            &track_bboxes(&unconfirmed),
            &leftovers,
            self.config.new_match_thresh,
            self.config.fuse_score,
        );

        for &(track_index, detection_index) in &third.matches {
            unconfirmed[track_index].update(&leftovers[detection_index], frame_id);
        }
        for &track_index in &third.unmatched_tracks {
            unconfirmed[track_index].mark_removed();
        }

        let mut spawned = Vec::new();
        let confirmed = self.config.confirmation == Confirmation::Immediate || frame_id == 1;
        for &index in &third.unmatched_detections {
            let detection = &leftovers[index];
            if detection.score < self.config.new_track_thresh() {
                continue;
            }
            let mut track = Track::new(self.next_id, detection);
            self.next_id += 1;
            track.activate(detection, frame_id, confirmed);
            spawned.push(track);
        }

        let mut removed = 0;
        let mut tracked_tracks = Vec::new();
        let mut lost_tracks = Vec::new();
        for mut track in pool.into_iter().chain(unconfirmed).chain(spawned) {
            match track.state() {
                TrackState::New | TrackState::Tracked => tracked_tracks.push(track),
                TrackState::Lost if track.time_since_update() >= self.max_time_lost => {
                    track.mark_removed();
                    removed += 1;
                }
                TrackState::Lost => lost_tracks.push(track),
                TrackState::Removed => removed += 1,
            }
        }
        tracked_tracks.sort_by_key(Track::id);
        lost_tracks.sort_by_key(Track::id);
        self.tracked_tracks = tracked_tracks;
        self.lost_tracks = lost_tracks;
        removed += self.remove_duplicate_tracks();

        self.frame_id = frame_id;

        debug!(
            frame_id,
            high = high_detections.len(),
            low = low_detections.len(),
            tracked = self.tracked_tracks.len(),
            lost = self.lost_tracks.len(),
            removed,
            "frame processed"
        );

        self.confirmed_outputs()
    }

    /// Confirmed tracks that pass the box area and aspect ratio filters.
    pub fn confirmed_outputs(&self) -> Vec<TrackerOutput> {
        self.tracked_tracks
            .iter()
            .filter(|track| track.state() == TrackState::Tracked)
            .filter(|track| self.passes_output_filter(&track.bbox()))
            .map(Track::output)
            .collect()
    }

    fn passes_output_filter(&self, bbox: &BBox) -> bool {
        if bbox.area() < self.config.min_box_area {
            return false;
        }
        match (self.config.aspect_ratio_thresh, bbox.aspect_ratio()) {
            (Some(thresh), Some(ratio)) => ratio <= thresh,
            _ => true,
        }
    }

    /// Resolves tracked/lost pairs that sit on top of each other, keeping the
    /// one that has been alive longer. Returns how many tracks were dropped.
    fn remove_duplicate_tracks(&mut self) -> usize {
        if self.tracked_tracks.is_empty() || self.lost_tracks.is_empty() {
            return 0;
        }
        let distances = iou_distance(
            &track_bboxes(&self.tracked_tracks),
            &track_bboxes(&self.lost_tracks),
        );

        let mut duplicate_tracked = vec![false; self.tracked_tracks.len()];
        let mut duplicate_lost = vec![false; self.lost_tracks.len()];
        for (i, j) in iproduct!(0..distances.rows, 0..distances.columns) {
            if distances[(i, j)] >= DUPLICATE_IOU_DISTANCE {
                continue;
            }
            if self.tracked_tracks[i].lifetime() > self.lost_tracks[j].lifetime() {
                duplicate_lost[j] = true;
            } else {
                duplicate_tracked[i] = true;
            }
        }

        let before = self.tracked_tracks.len() + self.lost_tracks.len();
        retain_unmarked(&mut self.tracked_tracks, &duplicate_tracked);
        retain_unmarked(&mut self.lost_tracks, &duplicate_lost);
        before - self.tracked_tracks.len() - self.lost_tracks.len()
    }
}

fn track_bboxes(tracks: &[Track]) -> Vec<BBox> {
    tracks.iter().map(Track::bbox).collect()
}

fn retain_unmarked(tracks: &mut Vec<Track>, marked: &[bool]) {
    let mut flags = marked.iter();
    tracks.retain_mut(|track| {
        let duplicate = flags.next().copied().unwrap_or(false);
        if duplicate {
            track.mark_removed();
        }
        !duplicate
    });
}
