//! Geometric paths and their discretization
//!
//! A path maps the progress parameter `s` to a joint configuration
//! `q(s) ∈ ℝ^d`. Constraints only ever read `q`, `q'` and `q''` at grid
//! points, so any geometric representation can be plugged in by
//! implementing [`Path`].

mod discretization;
mod spline;

pub use discretization::PathDiscretization;
pub use spline::{SplineBoundary, SplineInterpolator};

use nalgebra::DVector;

use crate::error::PathError;

/// A twice-differentiable joint-space path `s ↦ q(s)`.
///
/// Implementations must be pure: evaluating the same `s` twice yields the
/// same values. Paths are shared read-only between stage solves, hence the
/// `Send + Sync` bound.
pub trait Path: Send + Sync {
    /// Number of joints `d`.
    fn dof(&self) -> usize;

    /// Closed parameter interval `[s_start, s_end]` on which the path is defined.
    fn path_interval(&self) -> (f64, f64);

    /// Joint configuration `q(s)`.
    fn position_at(&self, s: f64) -> Result<DVector<f64>, PathError>;

    /// First derivative `q'(s)`.
    fn derivative_at(&self, s: f64) -> Result<DVector<f64>, PathError>;

    /// Second derivative `q''(s)`.
    fn second_derivative_at(&self, s: f64) -> Result<DVector<f64>, PathError>;

    /// Check that `s` lies inside the path interval.
    ///
    /// A relative slack of `1e-12` absorbs round-off in grids built with
    /// `linspace`-style arithmetic.
    fn check_parameter(&self, s: f64) -> Result<(), PathError> {
        let (start, end) = self.path_interval();
        let slack = 1e-12 * (end - start).abs().max(1.0);
        if !s.is_finite() || s < start - slack || s > end + slack {
            return Err(PathError::ParameterOutOfRange { s, start, end });
        }
        Ok(())
    }
}
