//! Canonical per-stage constraint form
//!
//! ```text
//! v = a u + b x + c          (k physical quantities)
//! F v ≤ h                    (m rows)
//! u ∈ ubound,  x ∈ xbound
//! ```

use nalgebra::{DMatrix, DVector, Matrix2xX, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::ConstraintError;

/// Closed interval `[lower, upper]`; either side may be infinite.
///
/// The interval is empty iff `lower > upper`. A single point is not empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    /// `(-∞, ∞)`
    pub const UNBOUNDED: Interval = Interval {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    /// Canonical empty interval `[∞, -∞]`.
    pub const EMPTY: Interval = Interval {
        lower: f64::INFINITY,
        upper: f64::NEG_INFINITY,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// `[-limit, limit]`
    pub fn symmetric(limit: f64) -> Self {
        Self::new(-limit, limit)
    }

    /// Degenerate interval `[value, value]`.
    pub fn point(value: f64) -> Self {
        Self::new(value, value)
    }

    /// `lower > upper`, strictly.
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    /// Both ends are finite.
    pub fn is_bounded(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    /// One of the ends is NaN.
    pub fn is_nan(&self) -> bool {
        self.lower.is_nan() || self.upper.is_nan()
    }

    /// Tightest lower, tightest upper.
    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Distance from `value` to the interval, 0 inside.
    pub fn violation(&self, value: f64) -> f64 {
        (self.lower - value).max(value - self.upper).max(0.0)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Canonical coefficients of one constraint at one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCoefficients {
    /// Coefficient of `u` in `v`
    pub a: DVector<f64>,
    /// Coefficient of `x` in `v`
    pub b: DVector<f64>,
    /// Constant term of `v`
    pub c: DVector<f64>,
    /// Inequality matrix (`m × k`)
    pub f: DMatrix<f64>,
    /// Inequality right-hand side (`m`)
    pub h: DVector<f64>,
    /// Direct bound on `u`
    pub ubound: Interval,
    /// Direct bound on `x`
    pub xbound: Interval,
}

impl CanonicalCoefficients {
    /// No rows and unbounded boxes.
    pub fn unconstrained() -> Self {
        Self::bounds_only(Interval::UNBOUNDED, Interval::UNBOUNDED)
    }

    /// Box bounds without any `F v ≤ h` rows.
    pub fn bounds_only(ubound: Interval, xbound: Interval) -> Self {
        Self {
            a: DVector::zeros(0),
            b: DVector::zeros(0),
            c: DVector::zeros(0),
            f: DMatrix::zeros(0, 0),
            h: DVector::zeros(0),
            ubound,
            xbound,
        }
    }

    /// Number of inequality rows `m`.
    pub fn num_rows(&self) -> usize {
        self.h.len()
    }

    /// Check the shape invariants and coefficient finiteness.
    ///
    /// `h` may hold `±∞`; every other coefficient must be finite. Bounds may
    /// be infinite but never NaN.
    pub fn validate(&self, constraint: &str, stage: usize) -> Result<(), ConstraintError> {
        let k = self.f.ncols();
        let mismatch = |detail: String| ConstraintError::DimensionMismatch {
            constraint: constraint.to_string(),
            detail,
        };
        if self.a.len() != k || self.b.len() != k || self.c.len() != k {
            return Err(mismatch(format!(
                "a/b/c lengths ({}, {}, {}) do not match the {} columns of F",
                self.a.len(),
                self.b.len(),
                self.c.len(),
                k
            )));
        }
        if self.h.len() != self.f.nrows() {
            return Err(mismatch(format!(
                "h has {} entries but F has {} rows",
                self.h.len(),
                self.f.nrows()
            )));
        }

        let finite = self
            .a
            .iter()
            .chain(self.b.iter())
            .chain(self.c.iter())
            .chain(self.f.iter())
            .all(|value| value.is_finite());
        if !finite || self.h.iter().any(|value| value.is_nan()) || self.ubound.is_nan() || self.xbound.is_nan() {
            return Err(ConstraintError::NonFiniteCoefficient {
                constraint: constraint.to_string(),
                stage,
            });
        }
        Ok(())
    }

    /// `v = a u + b x + c`
    pub fn evaluate(&self, u: f64, x: f64) -> DVector<f64> {
        &self.a * u + &self.b * x + &self.c
    }

    /// Rows of `F v ≤ h` restated on the decision vector `(u, x)`.
    ///
    /// Returns `(A, r)` where column `j` of `A` is `(F_j·a, F_j·b)` and
    /// `r_j = h_j - F_j·c`, so each row reads `A_jᵀ (u, x) ≤ r_j`.
    pub fn reduced_rows(&self) -> (Matrix2xX<f64>, DVector<f64>) {
        let fa = &self.f * &self.a;
        let fb = &self.f * &self.b;
        let fc = &self.f * &self.c;

        let mut rows = Matrix2xX::zeros(self.num_rows());
        for j in 0..self.num_rows() {
            rows.set_column(j, &Vector2::new(fa[j], fb[j]));
        }
        (rows, &self.h - fc)
    }

    /// Largest violation of any inequality or box at `(u, x)`, 0 if satisfied.
    pub fn max_violation(&self, u: f64, x: f64) -> f64 {
        let v = self.evaluate(u, x);
        let rows = (&self.f * v - &self.h).iter().fold(0.0_f64, |acc, &r| acc.max(r));
        rows.max(self.ubound.violation(u)).max(self.xbound.violation(x))
    }
}

impl Default for CanonicalCoefficients {
    fn default() -> Self {
        Self::unconstrained()
    }
}
