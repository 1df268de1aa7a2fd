use pyo3::{PyErr, PyRef, PyResult, exceptions::PyValueError, pyclass, pymethods};

use crate::{
    ByteTracker, Confirmation, Detection, FrameGeometry, RawDetection, TrackerConfig,
    python_api::{PyDetection, PyTrackerOutput},
};

#[pyclass(name = "ByteTracker")]
pub struct PyByteTracker {
    inner: ByteTracker,
}

#[pymethods]
impl PyByteTracker {
    #[new]
    #[pyo3(signature = (
        track_thresh = 0.5,
        match_thresh = 0.8,
        track_buffer = 30,
        frame_rate = 30.0,
        min_box_area = 10.0,
        aspect_ratio_thresh = None,
        probation = false,
        low_thresh = 0.1,
        new_track_thresh = None,
        low_match_thresh = 0.5,
        new_match_thresh = 0.7,
        fuse_score = false
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        track_thresh: f64,
        match_thresh: f64,
        track_buffer: u32,
        frame_rate: f64,
        min_box_area: f64,
        aspect_ratio_thresh: Option<f64>,
        probation: bool,
        low_thresh: f64,
        new_track_thresh: Option<f64>,
        low_match_thresh: f64,
        new_match_thresh: f64,
        fuse_score: bool,
    ) -> PyResult<Self> {
        let config = TrackerConfig {
            track_thresh,
            low_thresh,
            new_track_thresh,
            match_thresh,
            low_match_thresh,
            new_match_thresh,
            track_buffer,
            frame_rate,
            min_box_area,
            aspect_ratio_thresh,
            fuse_score,
            confirmation: if probation {
                Confirmation::Probation
            } else {
                Confirmation::Immediate
            },
        };
        Self::with_config(config)
    }

    /// Builds a tracker from a YAML document, missing keys taking their
    /// defaults.
    #[staticmethod]
    pub fn from_yaml(contents: &str) -> PyResult<Self> {
        let config = TrackerConfig::from_yaml_str(contents).map_err(to_value_error)?;
        Self::with_config(config)
    }

    #[getter]
    fn frame_id(&self) -> u32 {
        self.inner.frame_id()
    }

    pub fn update(&mut self, detections: Vec<PyRef<PyDetection>>) -> Vec<PyTrackerOutput> {
        let inner_detections = detections
            .iter()
            .map(|detection| detection.inner)
            .collect::<Vec<Detection>>();

        self.inner
            .update_detections(&inner_detections)
            .into_iter()
            .map(PyTrackerOutput::from)
            .collect()
    }

    /// Takes detector rows `(x1, y1, x2, y2, score, class)` in detector input
    /// coordinates together with the original `(height, width)` and the
    /// detector input `(height, width)`.
    pub fn update_raw(
        &mut self,
        rows: Vec<(f64, f64, f64, f64, f64, u32)>,
        frame_size: (u32, u32),
        input_size: (u32, u32),
    ) -> Vec<PyTrackerOutput> {
        let detections = rows
            .into_iter()
            .map(|(x_1, y_1, x_2, y_2, score, class)| {
                RawDetection::new(x_1, y_1, x_2, y_2, score, class)
            })
            .collect::<Vec<RawDetection>>();
        let geometry = FrameGeometry::new(frame_size, input_size);

        self.inner
            .update(&detections, &geometry)
            .into_iter()
            .map(PyTrackerOutput::from)
            .collect()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

impl PyByteTracker {
    fn with_config(config: TrackerConfig) -> PyResult<Self> {
        let inner = ByteTracker::new(config).map_err(to_value_error)?;
        Ok(Self { inner })
    }
}

fn to_value_error(err: crate::Error) -> PyErr {
    PyValueError::new_err(err.to_string())
}
