use pyo3::{PyResult, exceptions::PyValueError, pyclass, pymethods};

use crate::{Detection, python_api::PyBBox};

#[pyclass(name = "Detection")]
pub struct PyDetection {
    pub inner: Detection,
}

#[pymethods]
impl PyDetection {
    #[new]
    pub fn new(bbox: &PyBBox, score: f64, class_id: u32) -> PyResult<Self> {
        let inner = Detection::from_tlwh(bbox.inner.tlwh(), score, class_id)
            .ok_or_else(|| PyValueError::new_err("malformed detection"))?;
        Ok(Self { inner })
    }

    #[getter]
    fn bbox(&self) -> PyBBox {
        PyBBox {
            inner: self.inner.bbox,
        }
    }

    #[getter]
    fn score(&self) -> f64 {
        self.inner.score
    }

    #[getter]
    fn class_id(&self) -> u32 {
        self.inner.class
    }
}
