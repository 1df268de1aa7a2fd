use tracing::debug;

use crate::{
    byte_tracker::ByteTracker,
    config::TrackerConfig,
    detection::{FrameGeometry, RawDetection},
    error::{Error, Result},
    track::TrackerOutput,
};

/// What a detector reports for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorOutput {
    pub detections: Vec<RawDetection>,
    pub geometry: FrameGeometry,
}

/// Object detector producing boxes for a frame. Decoding, letterboxing and
/// model execution all live behind this trait.
pub trait Detector {
    type Frame: ?Sized;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `None` when the model produced no output for the frame.
    fn detect(
        &mut self,
        frame: &Self::Frame,
    ) -> std::result::Result<Option<DetectorOutput>, Self::Error>;
}

/// Couples a detector with a tracking session.
pub struct TrackingPipeline<D> {
    detector: D,
    tracker: ByteTracker,
}

impl<D: Detector> TrackingPipeline<D> {
    pub fn new(detector: D, config: TrackerConfig) -> Result<Self> {
        Ok(Self {
            detector,
            tracker: ByteTracker::new(config)?,
        })
    }

    /// Detects and tracks one frame, returning the confirmed tracks that pass
    /// the output filters.
    pub fn forward(&mut self, frame: &D::Frame) -> Result<Vec<TrackerOutput>> {
        let output = self
            .detector
            .detect(frame)
            .map_err(|err| Error::Detector(Box::new(err)))?;

        match output {
            Some(output) => Ok(self.tracker.update(&output.detections, &output.geometry)),
            None => {
                debug!(frame_id = self.tracker.frame_id() + 1, "detector returned no output");
                Ok(self.tracker.update_detections(&[]))
            }
        }
    }

    pub fn tracker(&self) -> &ByteTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ByteTracker {
        &mut self.tracker
    }

    pub fn into_parts(self) -> (D, ByteTracker) {
        (self.detector, self.tracker)
    }
}
