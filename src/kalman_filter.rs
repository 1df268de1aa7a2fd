use nalgebra::{Cholesky, SMatrix, SVector};
use tracing::warn;

use crate::bbox::BBox;

const STD_WEIGHT_POSITION: f64 = 1.0 / 20.0;
const STD_WEIGHT_VELOCITY: f64 = 1.0 / 160.0;

// Smallest diagonal bump tried when a covariance loses positive definiteness.
const COVARIANCE_EPSILON: f64 = 1e-9;
const MAX_REGULARIZATION_STEPS: usize = 8;

type StateVector = SVector<f64, 8>;
type StateMatrix = SMatrix<f64, 8, 8>;
type MeasurementVector = SVector<f64, 4>;
type MeasurementMatrix = SMatrix<f64, 4, 4>;

/// Constant velocity Kalman filter over `(cx, cy, a, h)` and their velocities.
///
/// Process and measurement noise scale with the current box height, so
/// large (near) objects are allowed to move more pixels per frame than small
/// ones.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    mean: StateVector,
    covariance: StateMatrix,
}

impl KalmanFilter {
    /// Seeds the state from a first observation with zero velocity.
    pub fn new(bbox: &BBox) -> Self {
        let z = bbox.to_xyah();
        let h = z[3];

        let mut mean = StateVector::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(&z);

        let std = StateVector::from_column_slice(&[
            2.0 * STD_WEIGHT_POSITION * h,
            2.0 * STD_WEIGHT_POSITION * h,
            1e-2,
            2.0 * STD_WEIGHT_POSITION * h,
            10.0 * STD_WEIGHT_VELOCITY * h,
            10.0 * STD_WEIGHT_VELOCITY * h,
            1e-5,
            10.0 * STD_WEIGHT_VELOCITY * h,
        ]);
        let covariance = regularize(StateMatrix::from_diagonal(&std.component_mul(&std)));

        Self { mean, covariance }
    }

    pub fn mean(&self) -> &StateVector {
        &self.mean
    }

    pub fn covariance(&self) -> &StateMatrix {
        &self.covariance
    }

    /// Zeroes the height velocity so a box that is not being observed does not
    /// keep growing or shrinking while it coasts.
    pub fn freeze_height_velocity(&mut self) {
        self.mean[7] = 0.0;
    }

    pub fn predict(&mut self) {
        let h = self.mean[3];
        let std = StateVector::from_column_slice(&[
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_POSITION * h,
            1e-2,
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_VELOCITY * h,
            STD_WEIGHT_VELOCITY * h,
            1e-5,
            STD_WEIGHT_VELOCITY * h,
        ]);
        let motion_cov = StateMatrix::from_diagonal(&std.component_mul(&std));
        let f = motion_matrix();

        self.mean = f * self.mean;
        self.covariance = regularize(f * self.covariance * f.transpose() + motion_cov);
    }

    /// Fuses an observed box into the state.
    ///
    /// A correction that would leave non-finite numbers behind is dropped and
    /// the predicted state is kept.
    pub fn update(&mut self, bbox: &BBox) {
        let measurement = bbox.to_xyah();
        let (projected_mean, projected_cov) = self.project();

        let Some(cholesky) = Cholesky::new(projected_cov)
            .or_else(|| Cholesky::new(regularize_measurement(projected_cov)))
        else {
            warn!("innovation covariance is not positive definite, skipping update");
            return;
        };

        let h = measurement_matrix();
        // solve(S, H P) = (P H^T S^-1)^T since both P and S are symmetric
        let gain = cholesky.solve(&(h * self.covariance)).transpose();
        let innovation = measurement - projected_mean;

        let mean = self.mean + gain * innovation;
        let covariance = self.covariance - gain * projected_cov * gain.transpose();

        if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            warn!(?measurement, "kalman update produced non-finite state, skipping");
            return;
        }

        self.mean = mean;
        self.covariance = regularize(covariance);
    }

    pub fn to_bbox(&self) -> BBox {
        BBox::from_xyah(&self.mean.fixed_rows::<4>(0).clone_owned())
    }

    pub fn to_tlwh(&self) -> [f64; 4] {
        self.to_bbox().tlwh()
    }

    fn project(&self) -> (MeasurementVector, MeasurementMatrix) {
        let h = self.mean[3];
        let std = MeasurementVector::new(
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_POSITION * h,
            1e-1,
            STD_WEIGHT_POSITION * h,
        );
        let innovation_cov = MeasurementMatrix::from_diagonal(&std.component_mul(&std));
        let hm = measurement_matrix();

        (
            hm * self.mean,
            hm * self.covariance * hm.transpose() + innovation_cov,
        )
    }
}

fn motion_matrix() -> StateMatrix {
    let mut f = StateMatrix::identity();
    for i in 0..4 {
        f[(i, 4 + i)] = 1.0;
    }
    f
}

fn measurement_matrix() -> SMatrix<f64, 4, 8> {
    SMatrix::<f64, 4, 8>::identity()
}

/// Symmetrizes `cov` and bumps its diagonal until a Cholesky factorization
/// succeeds.
fn regularize(cov: StateMatrix) -> StateMatrix {
    let mut cov = (cov + cov.transpose()) * 0.5;
    let mut epsilon = COVARIANCE_EPSILON;
    for _ in 0..MAX_REGULARIZATION_STEPS {
        if Cholesky::new(cov).is_some() {
            return cov;
        }
        cov += StateMatrix::identity() * epsilon;
        epsilon *= 10.0;
    }
    warn!("covariance could not be made positive definite");
    cov
}

fn regularize_measurement(cov: MeasurementMatrix) -> MeasurementMatrix {
    let mut cov = (cov + cov.transpose()) * 0.5;
    let mut epsilon = COVARIANCE_EPSILON;
    for _ in 0..MAX_REGULARIZATION_STEPS {
        if Cholesky::new(cov).is_some() {
            break;
        }
        cov += MeasurementMatrix::identity() * epsilon;
        epsilon *= 10.0;
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn is_positive_definite(cov: &StateMatrix) -> bool {
        Cholesky::new(*cov).is_some()
    }

    #[test]
    fn test_new_filter_starts_at_observation_with_zero_velocity() {
        let kf = KalmanFilter::new(&BBox::from_tlwh(10.0, 10.0, 40.0, 40.0));

        assert_relative_eq!(kf.mean()[0], 30.0);
        assert_relative_eq!(kf.mean()[1], 30.0);
        assert_relative_eq!(kf.mean()[2], 1.0);
        assert_relative_eq!(kf.mean()[3], 40.0);
        assert!(kf.mean().fixed_rows::<4>(4).iter().all(|v| *v == 0.0));
        assert!(is_positive_definite(kf.covariance()));
    }

    #[test]
    fn test_predict_grows_uncertainty() {
        let mut kf = KalmanFilter::new(&BBox::from_tlwh(10.0, 10.0, 40.0, 40.0));
        let before = kf.covariance()[(0, 0)];

        kf.predict();

        assert!(kf.covariance()[(0, 0)] > before);
        assert_relative_eq!(kf.to_bbox().x_1, 10.0);
    }

    #[test]
    fn test_update_shrinks_uncertainty_and_follows_motion() {
        let mut kf = KalmanFilter::new(&BBox::from_tlwh(0.0, 0.0, 20.0, 40.0));
        for step in 1..=10 {
            kf.predict();
            let before = kf.covariance()[(0, 0)];
            kf.update(&BBox::from_tlwh(2.0 * step as f64, 0.0, 20.0, 40.0));
            assert!(kf.covariance()[(0, 0)] < before);
        }

        // velocity estimate heads towards 2 px / frame
        assert!(kf.mean()[4] > 0.5);
        let x_before = kf.to_bbox().x_1;
        kf.predict();
        assert!(kf.to_bbox().x_1 > x_before);
        assert!(is_positive_definite(kf.covariance()));
    }

    #[test]
    fn test_degenerate_box_does_not_produce_nan() {
        let mut kf = KalmanFilter::new(&BBox::from_tlwh(5.0, 5.0, 0.0, 0.0));
        for _ in 0..5 {
            kf.predict();
            kf.update(&BBox::from_tlwh(5.0, 5.0, 0.0, 0.0));
        }

        assert!(kf.mean().iter().all(|v| v.is_finite()));
        assert!(kf.covariance().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_freeze_height_velocity() {
        let mut kf = KalmanFilter::new(&BBox::from_tlwh(0.0, 0.0, 20.0, 20.0));
        kf.predict();
        kf.update(&BBox::from_tlwh(0.0, 0.0, 30.0, 30.0));
        assert!(kf.mean()[7] != 0.0);

        kf.freeze_height_velocity();

        assert_eq!(kf.mean()[7], 0.0);
    }
}
