//! Joint acceleration limits
//!
//! `q̈ = q'(s) u + q''(s) x` must stay in `[α_lo, α_hi]` joint-wise, giving
//! `a = q'`, `b = q''`, `c = 0`, `F = [I; -I]`, `h = [α_hi; -α_lo]`.

use nalgebra::DVector;

use super::{
    box_rows, check_limits, sample_path, validate_limits, CanonicalCoefficients,
    CanonicalConstraint, Derivative, Interval,
};
use crate::error::ConstraintError;
use crate::path::{Path, PathDiscretization};

/// Per-joint acceleration limits, two rows per joint.
#[derive(Debug, Clone)]
pub struct JointAccelerationConstraint {
    limits: Vec<Interval>,
}

impl JointAccelerationConstraint {
    const NAME: &'static str = "joint acceleration";

    pub fn new(limits: Vec<Interval>) -> Result<Self, ConstraintError> {
        validate_limits(Self::NAME, &limits)?;
        Ok(Self { limits })
    }

    /// Symmetric limits `[-a_max, a_max]` per joint.
    pub fn symmetric(a_max: &[f64]) -> Result<Self, ConstraintError> {
        Self::new(a_max.iter().map(|&a| Interval::symmetric(a)).collect())
    }

    pub fn limits(&self) -> &[Interval] {
        &self.limits
    }
}

impl CanonicalConstraint for JointAccelerationConstraint {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn canonical_coefficients(
        &self,
        path: &dyn Path,
        discretization: &PathDiscretization,
        stage: usize,
    ) -> Result<CanonicalCoefficients, ConstraintError> {
        check_limits(Self::NAME, &self.limits, path.dof())?;
        let qs = sample_path(path, discretization, stage, Derivative::First)?;
        let qss = sample_path(path, discretization, stage, Derivative::Second)?;
        let (f, h) = box_rows(&self.limits);

        Ok(CanonicalCoefficients {
            c: DVector::zeros(qs.len()),
            a: qs,
            b: qss,
            f,
            h,
            ubound: Interval::UNBOUNDED,
            xbound: Interval::UNBOUNDED,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::SplineInterpolator;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_rows_bound_joint_acceleration() {
        let knots = [0.0, 0.3, 0.6, 1.0];
        let waypoints = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 0.5, -0.2, 0.7, 0.1, 1.0, 0.4]);
        let path = SplineInterpolator::new(&knots, waypoints).unwrap();
        let grid = PathDiscretization::uniform(0.0, 1.0, 10).unwrap();
        let pc = JointAccelerationConstraint::symmetric(&[3.0, 5.0]).unwrap();

        let coeffs = pc.canonical_coefficients(&path, &grid, 4).unwrap();
        coeffs.validate(pc.name(), 4).unwrap();
        assert_eq!(coeffs.num_rows(), 4);

        let (u, x) = (0.7, 1.3);
        let qdd = coeffs.evaluate(u, x);
        let qs = path.derivative_at(0.4).unwrap();
        let qss = path.second_derivative_at(0.4).unwrap();
        for j in 0..2 {
            assert_relative_eq!(qdd[j], qs[j] * u + qss[j] * x, epsilon = 1e-12);
        }

        // F v ≤ h ⇔ |q̈_j| ≤ limit
        let fv = &coeffs.f * &qdd;
        let inside = (0..2).all(|j| qdd[j].abs() <= [3.0, 5.0][j]);
        assert_eq!(fv.iter().zip(coeffs.h.iter()).all(|(l, r)| l <= r), inside);
    }

    #[test]
    fn test_dof_mismatch() {
        let knots = [0.0, 0.5, 1.0];
        let waypoints = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 0.0]);
        let path = SplineInterpolator::with_boundary(&knots, waypoints, crate::SplineBoundary::Natural).unwrap();
        let grid = PathDiscretization::uniform(0.0, 1.0, 4).unwrap();
        let pc = JointAccelerationConstraint::symmetric(&[1.0, 1.0]).unwrap();

        assert!(matches!(
            pc.canonical_coefficients(&path, &grid, 0),
            Err(ConstraintError::DofMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_stage_out_of_range() {
        let knots = [0.0, 0.5, 1.0];
        let waypoints = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 0.0]);
        let path = SplineInterpolator::with_boundary(&knots, waypoints, crate::SplineBoundary::Natural).unwrap();
        let grid = PathDiscretization::uniform(0.0, 1.0, 4).unwrap();
        let pc = JointAccelerationConstraint::symmetric(&[1.0]).unwrap();

        assert!(pc.canonical_coefficients(&path, &grid, 4).is_ok());
        assert!(matches!(
            pc.canonical_coefficients(&path, &grid, 5),
            Err(ConstraintError::StageOutOfRange { stage: 5, points: 5 })
        ));
    }
}
