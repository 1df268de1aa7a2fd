pub mod associate;
mod bbox;
mod byte_tracker;
mod config;
mod detection;
mod error;
mod kalman_filter;
mod pipeline;
#[cfg(feature = "python")]
mod python_api;
mod track;

pub use bbox::BBox;
pub use byte_tracker::ByteTracker;
pub use config::{Confirmation, TrackerConfig};
pub use detection::{Detection, FrameGeometry, RawDetection, prepare_detections};
pub use error::{Error, Result};
pub use kalman_filter::KalmanFilter;
pub use pipeline::{Detector, DetectorOutput, TrackingPipeline};
pub use track::{Track, TrackId, TrackState, TrackerOutput};

#[cfg(feature = "python")]
use pyo3::{
    Bound, PyResult, pymodule,
    types::{PyModule, PyModuleMethods},
};

#[cfg(feature = "python")]
use crate::python_api::{PyBBox, PyByteTracker, PyDetection, PyTrackerOutput};

#[cfg(feature = "python")]
#[pymodule]
fn byte_track(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBBox>()?;
    m.add_class::<PyDetection>()?;
    m.add_class::<PyByteTracker>()?;
    m.add_class::<PyTrackerOutput>()?;

    Ok(())
}
