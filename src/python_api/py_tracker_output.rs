use pyo3::{pyclass, pymethods};

use crate::TrackerOutput;

#[pyclass(name = "TrackerOutput")]
pub struct PyTrackerOutput {
    #[pyo3(get)]
    pub track_id: u64,
    #[pyo3(get)]
    pub tlwh: [f64; 4],
    #[pyo3(get)]
    pub score: f64,
}

impl From<TrackerOutput> for PyTrackerOutput {
    fn from(output: TrackerOutput) -> Self {
        Self {
            track_id: output.track_id,
            tlwh: output.tlwh,
            score: output.score,
        }
    }
}

#[pymethods]
impl PyTrackerOutput {
    fn __repr__(&self) -> String {
        format!(
            "TrackerOutput(track_id={}, tlwh={:?}, score={})",
            self.track_id, self.tlwh, self.score
        )
    }
}
