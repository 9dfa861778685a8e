//! Path constraints in canonical form
//!
//! Every limit type, whatever its physics, reduces at each grid point to the
//! same tuple `(a, b, c, F, h, ubound, xbound)` (see [`CanonicalCoefficients`]).
//! The stage formulator only ever sees that tuple, so new limit types plug
//! in by implementing [`CanonicalConstraint`].
//!
//! Variants provided:
//! - [`JointVelocityConstraint`]: bounds `x` directly
//! - [`JointAccelerationConstraint`]: rows on `q' u + q'' x`
//! - [`JointTorqueConstraint`]: rows on inverse dynamics, linear in `(u, x)`

mod acceleration;
mod canonical;
mod scheme;
mod torque;
mod velocity;

pub use acceleration::JointAccelerationConstraint;
pub use canonical::{CanonicalCoefficients, Interval};
pub use scheme::DiscretizationScheme;
pub use torque::{InverseDynamics, JointTorqueConstraint};
pub use velocity::JointVelocityConstraint;

use nalgebra::{DMatrix, DVector};

use crate::error::{ConstraintError, PathError};
use crate::path::{Path, PathDiscretization};

/// A kinematic or dynamic limit expressed per stage in canonical form.
///
/// Implementations are pure functions of `(path, discretization, stage)`.
pub trait CanonicalConstraint: Send + Sync {
    /// Human-readable name used in errors and logs.
    fn name(&self) -> &str;

    /// Canonical coefficients at grid point `stage` (`0 ≤ stage ≤ N`).
    fn canonical_coefficients(
        &self,
        path: &dyn Path,
        discretization: &PathDiscretization,
        stage: usize,
    ) -> Result<CanonicalCoefficients, ConstraintError>;
}

/// Which derivative of the path to sample.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Derivative {
    Zeroth,
    First,
    Second,
}

/// Sample `q`, `q'` or `q''` at grid point `stage`, mapping failures to
/// data errors tagged with the stage.
pub(crate) fn sample_path(
    path: &dyn Path,
    discretization: &PathDiscretization,
    stage: usize,
    derivative: Derivative,
) -> Result<DVector<f64>, ConstraintError> {
    let s = discretization
        .point(stage)
        .ok_or(ConstraintError::StageOutOfRange {
            stage,
            points: discretization.len(),
        })?;

    let value = match derivative {
        Derivative::Zeroth => path.position_at(s),
        Derivative::First => path.derivative_at(s),
        Derivative::Second => path.second_derivative_at(s),
    }
    .map_err(|source| ConstraintError::path_data(stage, source))?;

    if value.len() != path.dof() {
        return Err(ConstraintError::path_data(
            stage,
            PathError::DimensionMismatch {
                expected: path.dof(),
                actual: value.len(),
            },
        ));
    }
    if value.iter().any(|v| !v.is_finite()) {
        return Err(ConstraintError::NonFiniteDerivative { stage });
    }
    Ok(value)
}

/// Check a per-joint limit list against the path dof.
pub(crate) fn check_limits(
    constraint: &str,
    limits: &[Interval],
    dof: usize,
) -> Result<(), ConstraintError> {
    if limits.len() != dof {
        return Err(ConstraintError::DofMismatch {
            constraint: constraint.to_string(),
            expected: dof,
            actual: limits.len(),
        });
    }
    Ok(())
}

/// Reject NaN and inverted limits at construction time.
pub(crate) fn validate_limits(constraint: &str, limits: &[Interval]) -> Result<(), ConstraintError> {
    for (joint, limit) in limits.iter().enumerate() {
        if limit.is_nan() || limit.is_empty() {
            return Err(ConstraintError::InvalidLimit {
                constraint: constraint.to_string(),
                joint,
                lower: limit.lower,
                upper: limit.upper,
            });
        }
    }
    Ok(())
}

/// `F = [I; -I]`, `h = [upper; -lower]`: one `≤` and one `≥` row per joint.
pub(crate) fn box_rows(limits: &[Interval]) -> (DMatrix<f64>, DVector<f64>) {
    let dof = limits.len();
    let mut f = DMatrix::zeros(2 * dof, dof);
    let mut h = DVector::zeros(2 * dof);
    for (j, limit) in limits.iter().enumerate() {
        f[(j, j)] = 1.0;
        f[(dof + j, j)] = -1.0;
        h[j] = limit.upper;
        h[dof + j] = -limit.lower;
    }
    (f, h)
}
