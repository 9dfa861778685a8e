//! Joint velocity limits
//!
//! `q̇_j = q'_j(s) ṡ` must stay in `[v_lo,j, v_hi,j]`. Each joint with a
//! non-zero `q'_j` bounds the path speed `ṡ`; the tightest bounds, restricted
//! to `ṡ ≥ 0`, square into a direct bound on `x = ṡ²`.

use super::{
    check_limits, sample_path, validate_limits, CanonicalCoefficients, CanonicalConstraint,
    Derivative, Interval,
};
use crate::error::ConstraintError;
use crate::path::{Path, PathDiscretization};
use crate::MAX_PATH_VELOCITY;

/// Per-joint velocity limits, contributing only to `xbound`.
#[derive(Debug, Clone)]
pub struct JointVelocityConstraint {
    limits: Vec<Interval>,
    max_path_velocity: f64,
}

impl JointVelocityConstraint {
    const NAME: &'static str = "joint velocity";

    /// Limits `[lower, upper]` per joint.
    pub fn new(limits: Vec<Interval>) -> Result<Self, ConstraintError> {
        validate_limits(Self::NAME, &limits)?;
        Ok(Self {
            limits,
            max_path_velocity: MAX_PATH_VELOCITY,
        })
    }

    /// Symmetric limits `[-v_max, v_max]` per joint.
    pub fn symmetric(v_max: &[f64]) -> Result<Self, ConstraintError> {
        Self::new(v_max.iter().map(|&v| Interval::symmetric(v)).collect())
    }

    /// Cap on `ṡ` applied when no joint limits it (default [`MAX_PATH_VELOCITY`]).
    ///
    /// The cap must be positive; `f64::INFINITY` removes it.
    pub fn with_max_path_velocity(mut self, max_path_velocity: f64) -> Result<Self, ConstraintError> {
        if max_path_velocity.is_nan() || max_path_velocity <= 0.0 {
            return Err(ConstraintError::InvalidSpeedCap {
                constraint: Self::NAME.to_string(),
                value: max_path_velocity,
            });
        }
        self.max_path_velocity = max_path_velocity;
        Ok(self)
    }

    pub fn limits(&self) -> &[Interval] {
        &self.limits
    }

    /// Admissible `x` interval given the path tangent `q'`.
    fn squared_speed_bound(&self, tangent: &[f64]) -> Interval {
        let mut speed = Interval::symmetric(self.max_path_velocity);

        for (&dq, limit) in tangent.iter().zip(&self.limits) {
            let joint_bound = if dq > 0.0 {
                Interval::new(limit.lower / dq, limit.upper / dq)
            } else if dq < 0.0 {
                Interval::new(limit.upper / dq, limit.lower / dq)
            } else if limit.contains(0.0) {
                // q̇_j = 0 whatever ṡ is
                Interval::UNBOUNDED
            } else {
                Interval::EMPTY
            };
            speed = speed.intersect(&joint_bound);
        }

        // The path is traversed forward
        let lower = speed.lower.max(0.0);
        if speed.upper < lower {
            return Interval::EMPTY;
        }
        Interval::new(lower * lower, speed.upper * speed.upper)
    }
}

impl CanonicalConstraint for JointVelocityConstraint {
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
        let tangent = sample_path(path, discretization, stage, Derivative::First)?;
        let xbound = self.squared_speed_bound(tangent.as_slice());
        Ok(CanonicalCoefficients::bounds_only(Interval::UNBOUNDED, xbound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_joint_bound() {
        let pc = JointVelocityConstraint::symmetric(&[2.0]).unwrap();
        // q' = 0.5 → ṡ ≤ 4 → x ≤ 16
        let bound = pc.squared_speed_bound(&[0.5]);
        assert_relative_eq!(bound.lower, 0.0);
        assert_relative_eq!(bound.upper, 16.0);

        // Sign of the tangent does not matter for symmetric limits
        let bound = pc.squared_speed_bound(&[-0.5]);
        assert_relative_eq!(bound.upper, 16.0);
    }

    #[test]
    fn test_tightest_joint_wins() {
        let pc = JointVelocityConstraint::symmetric(&[2.0, 3.0]).unwrap();
        // ṡ ≤ min(2/0.5, 3/2) = 1.5
        let bound = pc.squared_speed_bound(&[0.5, 2.0]);
        assert_relative_eq!(bound.upper, 2.25);
    }

    #[test]
    fn test_zero_tangent_uses_cap() {
        let pc = JointVelocityConstraint::symmetric(&[1.0, 1.0])
            .unwrap()
            .with_max_path_velocity(10.0)
            .unwrap();
        let bound = pc.squared_speed_bound(&[0.0, 0.0]);
        assert_relative_eq!(bound.upper, 100.0);
    }

    #[test]
    fn test_speed_cap_must_be_positive() {
        for cap in [-5.0, 0.0, f64::NAN] {
            let result = JointVelocityConstraint::symmetric(&[1.0]).unwrap().with_max_path_velocity(cap);
            assert!(
                matches!(result, Err(ConstraintError::InvalidSpeedCap { .. })),
                "cap {cap} was accepted"
            );
        }

        let pc = JointVelocityConstraint::symmetric(&[1.0])
            .unwrap()
            .with_max_path_velocity(f64::INFINITY)
            .unwrap();
        assert_eq!(pc.squared_speed_bound(&[0.0]).upper, f64::INFINITY);
    }

    #[test]
    fn test_asymmetric_limits_raise_lower_bound() {
        // Joint must move forward at ≥ 1 rad/s with q' = 0.5 → ṡ ≥ 2
        let pc = JointVelocityConstraint::new(vec![Interval::new(1.0, 3.0)]).unwrap();
        let bound = pc.squared_speed_bound(&[0.5]);
        assert_relative_eq!(bound.lower, 4.0);
        assert_relative_eq!(bound.upper, 36.0);
    }

    #[test]
    fn test_unreachable_speed_is_empty() {
        // Requires q̇ ≥ 1 while the path moves the joint backwards
        let pc = JointVelocityConstraint::new(vec![Interval::new(1.0, 3.0)]).unwrap();
        assert!(pc.squared_speed_bound(&[-0.5]).is_empty());

        // Requires q̇ ≥ 1 on a joint the path does not move
        assert!(pc.squared_speed_bound(&[0.0]).is_empty());
    }
}
