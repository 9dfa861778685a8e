//! Joint torque limits through inverse dynamics
//!
//! For a rigid-body system `τ = M(q) q̈ + C(q, q̇) + g(q)` with `C` quadratic
//! in `q̇`. Along the path `q̇ = q' ṡ` and `q̈ = q' u + q'' x`, so
//!
//! ```text
//! τ = (ID(q, 0, q') - c) u + (ID(q, q', q'') - c) x + c,    c = ID(q, 0, 0)
//! ```

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;

use super::{
    box_rows, check_limits, sample_path, validate_limits, CanonicalCoefficients,
    CanonicalConstraint, Derivative, Interval,
};
use crate::error::{ConstraintError, PathError};
use crate::path::{Path, PathDiscretization};

/// Inverse dynamics `τ = ID(q, q̇, q̈)`.
pub type InverseDynamics =
    dyn Fn(&DVector<f64>, &DVector<f64>, &DVector<f64>) -> DVector<f64> + Send + Sync;

/// Per-joint torque limits for a system described by its inverse dynamics.
#[derive(Clone)]
pub struct JointTorqueConstraint {
    inverse_dynamics: Arc<InverseDynamics>,
    limits: Vec<Interval>,
}

impl JointTorqueConstraint {
    const NAME: &'static str = "joint torque";

    pub fn new(inverse_dynamics: Arc<InverseDynamics>, limits: Vec<Interval>) -> Result<Self, ConstraintError> {
        validate_limits(Self::NAME, &limits)?;
        Ok(Self {
            inverse_dynamics,
            limits,
        })
    }

    pub fn limits(&self) -> &[Interval] {
        &self.limits
    }

    fn torque(
        &self,
        stage: usize,
        q: &DVector<f64>,
        qd: &DVector<f64>,
        qdd: &DVector<f64>,
    ) -> Result<DVector<f64>, ConstraintError> {
        let tau = (self.inverse_dynamics)(q, qd, qdd);
        if tau.len() != q.len() {
            return Err(ConstraintError::path_data(
                stage,
                PathError::DimensionMismatch {
                    expected: q.len(),
                    actual: tau.len(),
                },
            ));
        }
        Ok(tau)
    }
}

impl fmt::Debug for JointTorqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JointTorqueConstraint")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl CanonicalConstraint for JointTorqueConstraint {
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
        let q = sample_path(path, discretization, stage, Derivative::Zeroth)?;
        let qs = sample_path(path, discretization, stage, Derivative::First)?;
        let qss = sample_path(path, discretization, stage, Derivative::Second)?;
        let zero = DVector::zeros(q.len());

        let c = self.torque(stage, &q, &zero, &zero)?;
        let a = self.torque(stage, &q, &zero, &qs)? - &c;
        let b = self.torque(stage, &q, &qs, &qss)? - &c;
        let (f, h) = box_rows(&self.limits);

        Ok(CanonicalCoefficients {
            a,
            b,
            c,
            f,
            h,
            ubound: Interval::UNBOUNDED,
            xbound: Interval::UNBOUNDED,
        })
    }
}
