//! Discretization schemes
//!
//! Collocation enforces a constraint at `s_i` only. Interpolation also
//! enforces it at `s_{i+1}`, written in stage-`i` variables through
//! `x_{i+1} = x + 2 D_i u` (the control `u` is constant over the stage).
//! Interpolation is more conservative between grid points at the cost of
//! twice the rows.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{CanonicalCoefficients, CanonicalConstraint, Interval};
use crate::error::ConstraintError;
use crate::path::{Path, PathDiscretization};

/// How constraints are attached to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscretizationScheme {
    /// Constraints at the stage's own grid point
    #[default]
    Collocation,
    /// Constraints at both ends of the stage
    Interpolation,
}

impl DiscretizationScheme {
    /// Validated canonical coefficients of `constraint` for stage `stage`
    /// under this scheme.
    ///
    /// At the last grid point interpolation has no next point and falls
    /// back to collocation.
    pub fn stage_coefficients(
        self,
        constraint: &dyn CanonicalConstraint,
        path: &dyn Path,
        discretization: &PathDiscretization,
        stage: usize,
    ) -> Result<CanonicalCoefficients, ConstraintError> {
        let current = constraint.canonical_coefficients(path, discretization, stage)?;
        current.validate(constraint.name(), stage)?;

        let delta = match (self, discretization.width(stage)) {
            (Self::Interpolation, Some(delta)) => delta,
            _ => return Ok(current),
        };

        let next = constraint.canonical_coefficients(path, discretization, stage + 1)?;
        next.validate(constraint.name(), stage + 1)?;
        Ok(interpolate(&current, &next, delta))
    }
}

/// Stack the next grid point's coefficients under the current ones.
///
/// The next point's `xbound` turns into rows on `x + 2 D u`, kept as one
/// extra component of `v`.
fn interpolate(
    current: &CanonicalCoefficients,
    next: &CanonicalCoefficients,
    delta: f64,
) -> CanonicalCoefficients {
    let mut xbound = current.xbound;
    let mut next_x_rows: Vec<(f64, f64)> = Vec::new();
    if next.xbound.is_empty() {
        // No x_{i+1} exists, so no (u, x) does either
        xbound = Interval::EMPTY;
    } else {
        if next.xbound.upper.is_finite() {
            next_x_rows.push((1.0, next.xbound.upper));
        }
        if next.xbound.lower.is_finite() {
            next_x_rows.push((-1.0, -next.xbound.lower));
        }
    }

    let (k0, k1) = (current.a.len(), next.a.len());
    let (m0, m1) = (current.num_rows(), next.num_rows());
    let extra = usize::from(!next_x_rows.is_empty());
    let k = k0 + k1 + extra;
    let m = m0 + m1 + next_x_rows.len();

    let mut a = DVector::zeros(k);
    let mut b = DVector::zeros(k);
    let mut c = DVector::zeros(k);
    a.rows_mut(0, k0).copy_from(&current.a);
    b.rows_mut(0, k0).copy_from(&current.b);
    c.rows_mut(0, k0).copy_from(&current.c);
    a.rows_mut(k0, k1).copy_from(&(&next.a + &next.b * (2.0 * delta)));
    b.rows_mut(k0, k1).copy_from(&next.b);
    c.rows_mut(k0, k1).copy_from(&next.c);
    if extra == 1 {
        a[k - 1] = 2.0 * delta;
        b[k - 1] = 1.0;
    }

    let mut f = DMatrix::zeros(m, k);
    let mut h = DVector::zeros(m);
    f.view_mut((0, 0), (m0, k0)).copy_from(&current.f);
    f.view_mut((m0, k0), (m1, k1)).copy_from(&next.f);
    h.rows_mut(0, m0).copy_from(&current.h);
    h.rows_mut(m0, m1).copy_from(&next.h);
    for (r, &(sign, rhs)) in next_x_rows.iter().enumerate() {
        f[(m0 + m1 + r, k - 1)] = sign;
        h[m0 + m1 + r] = rhs;
    }

    CanonicalCoefficients {
        a,
        b,
        c,
        f,
        h,
        ubound: current.ubound.intersect(&next.ubound),
        xbound,
    }
}
