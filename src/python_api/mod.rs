mod py_bbox;
mod py_byte_tracker;
mod py_detection;
mod py_tracker_output;

pub use py_bbox::PyBBox;
pub use py_byte_tracker::PyByteTracker;
pub use py_detection::PyDetection;
pub use py_tracker_output::PyTrackerOutput;
