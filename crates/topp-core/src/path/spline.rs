//! Cubic spline path through joint-space waypoints
//!
//! Each joint is interpolated independently with a C² piecewise cubic.
//! On segment `[s_k, s_{k+1}]` of width `h`, with `t₀ = s - s_k`,
//! `t₁ = s_{k+1} - s` and knot second derivatives `M_k`:
//!
//! ```text
//! q(s) = M_k t₁³/(6h) + M_{k+1} t₀³/(6h)
//!        + (y_k/h - M_k h/6) t₁ + (y_{k+1}/h - M_{k+1} h/6) t₀
//! ```
//!
//! The `M_k` follow from C² continuity at interior knots plus two boundary
//! equations selected by [`SplineBoundary`].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Path;
use crate::error::PathError;

/// End conditions closing the spline system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplineBoundary {
    /// Third derivative continuous at the second and second-to-last knots.
    /// Needs at least 4 waypoints.
    #[default]
    NotAKnot,
    /// Zero second derivative at both ends.
    Natural,
    /// Zero first derivative at both ends (path starts and ends at rest).
    Clamped,
}

impl SplineBoundary {
    fn min_waypoints(self) -> usize {
        match self {
            Self::NotAKnot => 4,
            Self::Natural | Self::Clamped => 2,
        }
    }
}

/// Joint-space cubic spline `s ↦ q(s)`.
#[derive(Debug, Clone)]
pub struct SplineInterpolator {
    /// Knot parameters `s_0 < … < s_n`
    knots: Vec<f64>,
    /// Waypoints, one row per knot, one column per joint
    waypoints: DMatrix<f64>,
    /// Second derivatives at the knots, same layout as `waypoints`
    curvatures: DMatrix<f64>,
    boundary: SplineBoundary,
}

impl SplineInterpolator {
    /// Interpolate `waypoints` (row `k` is the configuration at `knots[k]`)
    /// with not-a-knot end conditions.
    pub fn new(knots: &[f64], waypoints: DMatrix<f64>) -> Result<Self, PathError> {
        Self::with_boundary(knots, waypoints, SplineBoundary::default())
    }

    /// Interpolate with explicit end conditions.
    pub fn with_boundary(
        knots: &[f64],
        waypoints: DMatrix<f64>,
        boundary: SplineBoundary,
    ) -> Result<Self, PathError> {
        let points = knots.len();
        if waypoints.nrows() != points {
            return Err(PathError::KnotCountMismatch {
                knots: points,
                waypoints: waypoints.nrows(),
            });
        }
        let required = boundary.min_waypoints();
        if points < required {
            return Err(PathError::InsufficientWaypoints {
                required,
                actual: points,
            });
        }
        if knots.iter().any(|s| !s.is_finite()) {
            return Err(PathError::NonFinite { what: "knots" });
        }
        if waypoints.iter().any(|q| !q.is_finite()) {
            return Err(PathError::NonFinite { what: "waypoints" });
        }
        if let Some(index) = knots.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PathError::NotStrictlyIncreasing { index: index + 1 });
        }

        let curvatures = solve_curvatures(knots, &waypoints, boundary)?;
        debug!(
            knots = points,
            dof = waypoints.ncols(),
            ?boundary,
            "cubic spline path built"
        );

        Ok(Self {
            knots: knots.to_vec(),
            waypoints,
            curvatures,
            boundary,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn waypoints(&self) -> &DMatrix<f64> {
        &self.waypoints
    }

    pub fn boundary(&self) -> SplineBoundary {
        self.boundary
    }

    /// Segment index containing `s` (the last segment owns the end knot).
    fn segment(&self, s: f64) -> usize {
        let last = self.knots.len() - 2;
        self.knots
            .partition_point(|&knot| knot <= s)
            .saturating_sub(1)
            .min(last)
    }

    fn evaluate(&self, s: f64, order: usize) -> Result<DVector<f64>, PathError> {
        self.check_parameter(s)?;

        let k = self.segment(s);
        let h = self.knots[k + 1] - self.knots[k];
        let t0 = s - self.knots[k];
        let t1 = self.knots[k + 1] - s;

        let values = (0..self.dof()).map(|j| {
            let (y0, y1) = (self.waypoints[(k, j)], self.waypoints[(k + 1, j)]);
            let (m0, m1) = (self.curvatures[(k, j)], self.curvatures[(k + 1, j)]);
            let c0 = y0 / h - m0 * h / 6.0;
            let c1 = y1 / h - m1 * h / 6.0;
            match order {
                0 => m0 * t1.powi(3) / (6.0 * h) + m1 * t0.powi(3) / (6.0 * h) + c0 * t1 + c1 * t0,
                1 => -m0 * t1 * t1 / (2.0 * h) + m1 * t0 * t0 / (2.0 * h) - c0 + c1,
                _ => (m0 * t1 + m1 * t0) / h,
            }
        });

        Ok(DVector::from_iterator(self.dof(), values))
    }
}

impl Path for SplineInterpolator {
    fn dof(&self) -> usize {
        self.waypoints.ncols()
    }

    fn path_interval(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    fn position_at(&self, s: f64) -> Result<DVector<f64>, PathError> {
        self.evaluate(s, 0)
    }

    fn derivative_at(&self, s: f64) -> Result<DVector<f64>, PathError> {
        self.evaluate(s, 1)
    }

    fn second_derivative_at(&self, s: f64) -> Result<DVector<f64>, PathError> {
        self.evaluate(s, 2)
    }
}

/// Solve for the knot second derivatives of every joint at once.
///
/// All joints share the same coefficient matrix, so one LU factorization
/// serves every right-hand-side column.
fn solve_curvatures(
    knots: &[f64],
    waypoints: &DMatrix<f64>,
    boundary: SplineBoundary,
) -> Result<DMatrix<f64>, PathError> {
    let points = knots.len();
    let n = points - 1;
    let dof = waypoints.ncols();
    let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();

    let mut system = DMatrix::<f64>::zeros(points, points);
    let mut rhs = DMatrix::<f64>::zeros(points, dof);

    // C² continuity at interior knots
    for k in 1..n {
        system[(k, k - 1)] = h[k - 1];
        system[(k, k)] = 2.0 * (h[k - 1] + h[k]);
        system[(k, k + 1)] = h[k];
        for j in 0..dof {
            let slope_next = (waypoints[(k + 1, j)] - waypoints[(k, j)]) / h[k];
            let slope_prev = (waypoints[(k, j)] - waypoints[(k - 1, j)]) / h[k - 1];
            rhs[(k, j)] = 6.0 * (slope_next - slope_prev);
        }
    }

    match boundary {
        SplineBoundary::Natural => {
            system[(0, 0)] = 1.0;
            system[(n, n)] = 1.0;
        }
        SplineBoundary::Clamped => {
            system[(0, 0)] = 2.0 * h[0];
            system[(0, 1)] = h[0];
            system[(n, n - 1)] = h[n - 1];
            system[(n, n)] = 2.0 * h[n - 1];
            for j in 0..dof {
                rhs[(0, j)] = 6.0 * (waypoints[(1, j)] - waypoints[(0, j)]) / h[0];
                rhs[(n, j)] = -6.0 * (waypoints[(n, j)] - waypoints[(n - 1, j)]) / h[n - 1];
            }
        }
        SplineBoundary::NotAKnot => {
            system[(0, 0)] = h[1];
            system[(0, 1)] = -(h[0] + h[1]);
            system[(0, 2)] = h[0];
            system[(n, n - 2)] = h[n - 1];
            system[(n, n - 1)] = -(h[n - 2] + h[n - 1]);
            system[(n, n)] = h[n - 2];
        }
    }

    system.lu().solve(&rhs).ok_or(PathError::SingularSystem)
}
