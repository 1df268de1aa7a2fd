use tracing::debug;

use crate::bbox::BBox;

/// A validated detection in original-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f64,
    pub class: u32,
}

impl Detection {
    /// Builds a detection from a `(x, y, w, h)` box, returning `None` for
    /// non-finite values, negative sizes or a score outside `[0, 1]`.
    pub fn from_tlwh(tlwh: [f64; 4], score: f64, class: u32) -> Option<Self> {
        let [x, y, w, h] = tlwh;
        if !(w >= 0.0 && h >= 0.0) {
            return None;
        }
        let bbox = BBox::try_new(x, y, x + w, y + h)?;
        Self::checked(bbox, score, class)
    }

    fn checked(bbox: BBox, score: f64, class: u32) -> Option<Self> {
        if !(0.0..=1.0).contains(&score) {
            return None;
        }
        Some(Self { bbox, score, class })
    }

    pub fn tlwh(&self) -> [f64; 4] {
        self.bbox.tlwh()
    }
}

/// One detector output row in detector-input coordinates.
///
/// YOLOX style heads report an objectness and a class confidence separately;
/// the effective score is their product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub x_1: f64,
    pub y_1: f64,
    pub x_2: f64,
    pub y_2: f64,
    pub score: f64,
    pub class_score: Option<f64>,
    pub class: u32,
}

impl RawDetection {
    pub fn new(x_1: f64, y_1: f64, x_2: f64, y_2: f64, score: f64, class: u32) -> Self {
        Self {
            x_1,
            y_1,
            x_2,
            y_2,
            score,
            class_score: None,
            class,
        }
    }

    pub fn with_class_score(mut self, class_score: f64) -> Self {
        self.class_score = Some(class_score);
        self
    }

    pub fn effective_score(&self) -> f64 {
        self.score * self.class_score.unwrap_or(1.0)
    }

    /// Validates the row and maps it onto the original frame.
    pub fn to_detection(&self, geometry: &FrameGeometry) -> Option<Detection> {
        let ratio = geometry.scale();
        let bbox = BBox::try_new(self.x_1, self.y_1, self.x_2, self.y_2)?.unscaled(ratio);
        Detection::checked(bbox, self.effective_score(), self.class)
    }
}

/// Relationship between the original frame and the detector input it was
/// letterboxed into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameGeometry {
    /// Original `(height, width)` and detector input `(height, width)`.
    Sizes {
        frame: (u32, u32),
        input: (u32, u32),
    },
    /// A preprocessing ratio supplied directly by the caller.
    Ratio(f64),
}

impl FrameGeometry {
    pub fn new(frame: (u32, u32), input: (u32, u32)) -> Self {
        FrameGeometry::Sizes { frame, input }
    }

    /// Detections already in original-frame coordinates.
    pub fn identity() -> Self {
        FrameGeometry::Ratio(1.0)
    }

    /// Scale from original-frame to detector-input coordinates. Falls back to
    /// `1.0` when the geometry is degenerate.
    pub fn scale(&self) -> f64 {
        let ratio = match *self {
            FrameGeometry::Sizes {
                frame: (fh, fw),
                input: (ih, iw),
            } => (ih as f64 / fh as f64).min(iw as f64 / fw as f64),
            FrameGeometry::Ratio(ratio) => ratio,
        };
        if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        }
    }
}

/// Validates and rescales a frame's worth of detector rows, dropping the
/// malformed ones.
pub fn prepare_detections(raw: &[RawDetection], geometry: &FrameGeometry) -> Vec<Detection> {
    raw.iter()
        .filter_map(|row| {
            let detection = row.to_detection(geometry);
            if detection.is_none() {
                debug!(?row, "dropping malformed detection");
            }
            detection
        })
        .collect()
}
