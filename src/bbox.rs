use nalgebra::SVector;

/// Axis aligned box stored as top-left / bottom-right corners.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct BBox {
    pub x_1: f64,
    pub y_1: f64,
    pub x_2: f64,
    pub y_2: f64,
}

impl BBox {
    pub fn new(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> Self {
        if x_1 > x_2 || y_1 > y_2 {
            return BBox {
                x_1: 0.0,
                y_1: 0.0,
                x_2: 0.0,
                y_2: 0.0,
            };
        };
        BBox { x_1, y_1, x_2, y_2 }
    }

    /// Checked constructor used at the detector boundary. Rejects non-finite
    /// corners and inverted boxes instead of collapsing them to zero.
    pub fn try_new(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> Option<Self> {
        let finite = [x_1, y_1, x_2, y_2].iter().all(|v| v.is_finite());
        if !finite || x_1 > x_2 || y_1 > y_2 {
            return None;
        }
        Some(BBox { x_1, y_1, x_2, y_2 })
    }

    pub fn from_tlwh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Builds a box from a `(center x, center y, aspect ratio, height)` vector,
    /// the measurement space of the motion model.
    pub fn from_xyah(xyah: &SVector<f64, 4>) -> Self {
        let h = xyah[3];
        let w = xyah[2] * h;
        if !(w >= 0.0 && h >= 0.0) {
            return BBox::new(0.0, 0.0, 0.0, 0.0);
        }

        Self::new(
            xyah[0] - w / 2.0,
            xyah[1] - h / 2.0,
            xyah[0] + w / 2.0,
            xyah[1] + h / 2.0,
        )
    }

    pub fn to_xyah(&self) -> SVector<f64, 4> {
        let w = self.width();
        let h = self.height();

        let cx = self.x_1 + w / 2.0;
        let cy = self.y_1 + h / 2.0;
        let a = w / h.max(f64::EPSILON);

        SVector::<f64, 4>::new(cx, cy, a, h)
    }

    pub fn tlwh(&self) -> [f64; 4] {
        [self.x_1, self.y_1, self.width(), self.height()]
    }

    pub fn width(&self) -> f64 {
        (self.x_2 - self.x_1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y_2 - self.y_1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Width over height, `None` for a box without height.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let h = self.height();
        (h > 0.0).then(|| self.width() / h)
    }

    pub fn iou(&self, other: &Self) -> f64 {
        let iwidth = (self.x_2.min(other.x_2) - self.x_1.max(other.x_1)).max(0.0);
        let iheight = (self.y_2.min(other.y_2) - self.y_1.max(other.y_1)).max(0.0);
        let iarea = iwidth * iheight;

        let union = self.area() + other.area() - iarea;

        if union <= 0.0 {
            return 0.0;
        }

        iarea / union
    }

    /// Divides every corner by `ratio`, mapping detector-input coordinates back
    /// onto the original frame.
    pub fn unscaled(&self, ratio: f64) -> Self {
        Self::new(
            self.x_1 / ratio,
            self.y_1 / ratio,
            self.x_2 / ratio,
            self.y_2 / ratio,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_new_bbox_returns_zero_bbox() {
        let bbox = BBox::new(3.0, 4.0, 2.0, 5.0);

        assert_eq!(bbox, BBox::default());
    }

    #[test]
    fn test_try_new_rejects_malformed_corners() {
        assert!(BBox::try_new(3.0, 4.0, 2.0, 5.0).is_none());
        assert!(BBox::try_new(f64::NAN, 0.0, 1.0, 1.0).is_none());
        assert!(BBox::try_new(0.0, 0.0, f64::INFINITY, 1.0).is_none());
        assert!(BBox::try_new(0.0, 0.0, 1.0, 1.0).is_some());
    }

    #[test]
    fn test_from_xyah_returns_zero_bbox_for_invalid_state() {
        let xyah = SVector::<f64, 4>::new(1.0, 1.0, 4.0, -1.0);

        assert_eq!(BBox::from_xyah(&xyah), BBox::default());
    }

    #[test]
    fn test_xyah_conversion_recovers_box() {
        let bbox = BBox::from_tlwh(10.0, 20.0, 30.0, 60.0);
        let xyah = bbox.to_xyah();

        assert_relative_eq!(xyah[0], 25.0);
        assert_relative_eq!(xyah[1], 50.0);
        assert_relative_eq!(xyah[2], 0.5);
        assert_relative_eq!(xyah[3], 60.0);

        let back = BBox::from_xyah(&xyah);
        assert_relative_eq!(back.x_1, 10.0);
        assert_relative_eq!(back.y_2, 80.0);
    }

    #[test]
    fn test_iou_returns_correct_value_1() {
        let bbox_1 = BBox::new(1.0, 1.0, 2.0, 2.0);
        let bbox_2 = BBox::new(1.0, 1.0, 1.5, 1.5);

        assert_eq!(bbox_1.iou(&bbox_2), 0.25)
    }

    #[test]
    fn test_iou_returns_correct_value_2() {
        let bbox_1 = BBox::new(0.0, 0.0, 1.0, 2.0);
        let bbox_2 = BBox::new(1.0, 2.0, 3.0, 3.0);

        assert_eq!(bbox_1.iou(&bbox_2), 0.0)
    }

    #[test]
    fn test_iou_of_empty_boxes_is_zero() {
        assert_eq!(BBox::default().iou(&BBox::default()), 0.0)
    }

    #[test]
    fn test_unscaled_divides_by_ratio() {
        let bbox = BBox::new(10.0, 20.0, 30.0, 40.0).unscaled(2.0);

        assert_eq!(bbox, BBox::new(5.0, 10.0, 15.0, 20.0));
        assert_eq!(bbox.tlwh(), [5.0, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(BBox::from_tlwh(0.0, 0.0, 20.0, 10.0).aspect_ratio(), Some(2.0));
        assert_eq!(BBox::from_tlwh(0.0, 0.0, 20.0, 0.0).aspect_ratio(), None);
    }
}
