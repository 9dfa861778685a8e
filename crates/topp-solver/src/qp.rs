//! Stage QP Definition
//!
//! The two-variable program solved at one stage, `z = (u, x)`:
//!
//! ```text
//! minimize    ½ zᵀ H z + gᵀ z          (gᵀ z when H is absent)
//! subject to  u ∈ ubound,  x ∈ xbound
//!             A_jᵀ z ≤ r_j              (stacked constraint rows)
//!             xnext_min ≤ x + 2 D u ≤ xnext_max
//! ```

use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};
use serde::{Deserialize, Serialize};
use topp_core::{CanonicalCoefficients, Interval};

/// Caller-supplied stage objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCost {
    /// Quadratic term `H` (symmetric PSD), `None` for a linear objective
    pub hessian: Option<Matrix2<f64>>,
    /// Linear term `g`
    pub gradient: Vector2<f64>,
}

impl StageCost {
    pub fn linear(gradient: Vector2<f64>) -> Self {
        Self {
            hessian: None,
            gradient,
        }
    }

    pub fn quadratic(hessian: Matrix2<f64>, gradient: Vector2<f64>) -> Self {
        Self {
            hessian: Some(hessian),
            gradient,
        }
    }
}

/// Why a stage was found infeasible before any backend ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfeasibleReason {
    /// Intersected `ubound` is empty
    EmptyControlBound,
    /// Intersected `xbound` (including `[xmin, xmax]`) is empty
    EmptyStateBound,
    /// `xnext_min > xnext_max`
    EmptyTransition,
    /// A row that no `(u, x)` can satisfy
    ContradictoryRow { constraint: usize, row: usize },
}

/// Result of formulating a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Formulation {
    /// A well-posed QP for the backend
    Ready(StageQp),
    /// Infeasibility detected from the bounds alone
    Infeasible(InfeasibleReason),
}

/// Immutable QP for a single stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageQp {
    stage: usize,
    delta: f64,
    hessian: Option<Matrix2<f64>>,
    gradient: Vector2<f64>,
    ubound: Interval,
    xbound: Interval,
    /// Column `j` holds the coefficients of row `j` on `(u, x)`
    rows: Matrix2xX<f64>,
    rhs: DVector<f64>,
    transition: Interval,
}

impl StageQp {
    /// Assemble the stage QP from validated canonical coefficients.
    ///
    /// Rows are stacked in constraint order; `ubound`/`xbound` are
    /// intersected and `x_box` (the caller's `[xmin, xmax]`) is folded into
    /// `xbound`. Vacuous rows (`r = +∞`, or all-zero coefficients with
    /// `r ≥ 0`) are dropped.
    pub fn formulate(
        stage: usize,
        delta: f64,
        coefficients: &[CanonicalCoefficients],
        cost: &StageCost,
        x_box: Option<Interval>,
        transition: Interval,
    ) -> Formulation {
        let mut ubound = Interval::UNBOUNDED;
        let mut xbound = x_box.unwrap_or(Interval::UNBOUNDED);
        for coeffs in coefficients {
            ubound = ubound.intersect(&coeffs.ubound);
            xbound = xbound.intersect(&coeffs.xbound);
        }

        if ubound.is_empty() {
            return Formulation::Infeasible(InfeasibleReason::EmptyControlBound);
        }
        if xbound.is_empty() {
            return Formulation::Infeasible(InfeasibleReason::EmptyStateBound);
        }
        if transition.is_empty() {
            return Formulation::Infeasible(InfeasibleReason::EmptyTransition);
        }

        let mut columns: Vec<Vector2<f64>> = Vec::new();
        let mut rhs: Vec<f64> = Vec::new();
        for (constraint, coeffs) in coefficients.iter().enumerate() {
            let (reduced, bounds) = coeffs.reduced_rows();
            for (row, (column, &bound)) in reduced.column_iter().zip(bounds.iter()).enumerate() {
                if bound == f64::INFINITY {
                    continue;
                }
                let zero = column[0] == 0.0 && column[1] == 0.0;
                if bound == f64::NEG_INFINITY || (zero && bound < 0.0) {
                    return Formulation::Infeasible(InfeasibleReason::ContradictoryRow { constraint, row });
                }
                if !zero {
                    columns.push(column.into_owned());
                    rhs.push(bound);
                }
            }
        }

        Formulation::Ready(Self {
            stage,
            delta,
            hessian: cost.hessian,
            gradient: cost.gradient,
            ubound,
            xbound,
            rows: Matrix2xX::from_fn(columns.len(), |r, j| columns[j][r]),
            rhs: DVector::from_vec(rhs),
            transition,
        })
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Stage width `D_i`.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn hessian(&self) -> Option<&Matrix2<f64>> {
        self.hessian.as_ref()
    }

    pub fn gradient(&self) -> &Vector2<f64> {
        &self.gradient
    }

    pub fn ubound(&self) -> Interval {
        self.ubound
    }

    pub fn xbound(&self) -> Interval {
        self.xbound
    }

    /// Bounds on `x + 2 D u`.
    pub fn transition(&self) -> Interval {
        self.transition
    }

    /// Coefficients `(2 D, 1)` of the transition expression on `(u, x)`.
    pub fn transition_coefficients(&self) -> Vector2<f64> {
        Vector2::new(2.0 * self.delta, 1.0)
    }

    /// Stacked constraint rows (one column per row) and their bounds.
    pub fn rows(&self) -> (&Matrix2xX<f64>, &DVector<f64>) {
        (&self.rows, &self.rhs)
    }

    pub fn num_rows(&self) -> usize {
        self.rhs.len()
    }

    /// Every constraint of the QP as `aᵀ z ≤ b`, infinite sides omitted.
    ///
    /// Order: `u` box, `x` box, transition, stacked rows.
    pub fn inequalities(&self) -> Vec<(Vector2<f64>, f64)> {
        let mut out = Vec::with_capacity(6 + self.num_rows());
        let mut push_interval = |coeffs: Vector2<f64>, bound: Interval| {
            if bound.upper.is_finite() {
                out.push((coeffs, bound.upper));
            }
            if bound.lower.is_finite() {
                out.push((-coeffs, -bound.lower));
            }
        };
        push_interval(Vector2::new(1.0, 0.0), self.ubound);
        push_interval(Vector2::new(0.0, 1.0), self.xbound);
        push_interval(self.transition_coefficients(), self.transition);

        for (column, &bound) in self.rows.column_iter().zip(self.rhs.iter()) {
            out.push((column.into_owned(), bound));
        }
        out
    }

    /// Objective value at `(u, x)`.
    pub fn objective(&self, u: f64, x: f64) -> f64 {
        let z = Vector2::new(u, x);
        let linear = self.gradient.dot(&z);
        match &self.hessian {
            Some(h) => 0.5 * z.dot(&(h * z)) + linear,
            None => linear,
        }
    }

    /// Largest constraint violation at `(u, x)`, 0 when feasible.
    pub fn max_violation(&self, u: f64, x: f64) -> f64 {
        let z = Vector2::new(u, x);
        let rows = self
            .rows
            .column_iter()
            .zip(self.rhs.iter())
            .fold(0.0_f64, |acc, (column, &bound)| acc.max(column.dot(&z) - bound));
        rows.max(self.ubound.violation(u))
            .max(self.xbound.violation(x))
            .max(self.transition.violation(self.transition_coefficients().dot(&z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn accel_like() -> CanonicalCoefficients {
        // |u + 0.5 x| ≤ 2
        CanonicalCoefficients {
            a: DVector::from_vec(vec![1.0]),
            b: DVector::from_vec(vec![0.5]),
            c: DVector::zeros(1),
            f: DMatrix::from_row_slice(2, 1, &[1.0, -1.0]),
            h: DVector::from_vec(vec![2.0, 2.0]),
            ubound: Interval::UNBOUNDED,
            xbound: Interval::UNBOUNDED,
        }
    }

    fn cost() -> StageCost {
        StageCost::linear(Vector2::new(0.0, -1.0))
    }

    #[test]
    fn test_stacks_rows_and_intersects_bounds() {
        let vel = CanonicalCoefficients::bounds_only(Interval::UNBOUNDED, Interval::new(0.0, 4.0));
        let formulation = StageQp::formulate(
            3,
            0.1,
            &[vel, accel_like()],
            &cost(),
            Some(Interval::new(-1.0, 1.0)),
            Interval::new(0.0, 1.0),
        );
        let Formulation::Ready(qp) = formulation else {
            panic!("expected a ready QP");
        };
        assert_eq!(qp.stage(), 3);
        assert_eq!(qp.num_rows(), 2);
        assert_eq!(qp.xbound(), Interval::new(0.0, 1.0));
        assert_eq!(qp.ubound(), Interval::UNBOUNDED);
        // 2 x-box + 2 transition + 2 rows
        assert_eq!(qp.inequalities().len(), 6);
    }

    #[test]
    fn test_empty_intervals_short_circuit() {
        let tight = CanonicalCoefficients::bounds_only(Interval::new(1.0, 0.0), Interval::UNBOUNDED);
        assert_eq!(
            StageQp::formulate(0, 0.1, &[tight], &cost(), None, Interval::new(0.0, 1.0)),
            Formulation::Infeasible(InfeasibleReason::EmptyControlBound)
        );

        let vel = CanonicalCoefficients::bounds_only(Interval::UNBOUNDED, Interval::new(0.0, 0.1));
        assert_eq!(
            StageQp::formulate(0, 0.1, &[vel], &cost(), Some(Interval::new(0.2, 0.2)), Interval::new(0.0, 1.0)),
            Formulation::Infeasible(InfeasibleReason::EmptyStateBound)
        );

        assert_eq!(
            StageQp::formulate(0, 0.1, &[], &cost(), Some(Interval::new(0.4, 0.3)), Interval::new(0.0, 1.0)),
            Formulation::Infeasible(InfeasibleReason::EmptyStateBound)
        );

        assert_eq!(
            StageQp::formulate(0, 0.1, &[], &cost(), None, Interval::new(1.0, 0.0)),
            Formulation::Infeasible(InfeasibleReason::EmptyTransition)
        );
    }

    #[test]
    fn test_single_point_bound_is_not_short_circuited() {
        let formulation = StageQp::formulate(0, 0.1, &[], &cost(), Some(Interval::point(0.2)), Interval::new(0.0, 1.0));
        assert!(matches!(formulation, Formulation::Ready(_)));
    }

    #[test]
    fn test_vacuous_and_contradictory_rows() {
        let mut coeffs = accel_like();
        coeffs.h = DVector::from_vec(vec![f64::INFINITY, 2.0]);
        let Formulation::Ready(qp) = StageQp::formulate(0, 0.1, &[coeffs], &cost(), None, Interval::new(0.0, 1.0)) else {
            panic!("expected a ready QP");
        };
        assert_eq!(qp.num_rows(), 1);

        // 0·u + 0·x ≤ -1
        let mut coeffs = accel_like();
        coeffs.a = DVector::zeros(1);
        coeffs.b = DVector::zeros(1);
        coeffs.h = DVector::from_vec(vec![2.0, -1.0]);
        assert_eq!(
            StageQp::formulate(0, 0.1, &[coeffs], &cost(), None, Interval::new(0.0, 1.0)),
            Formulation::Infeasible(InfeasibleReason::ContradictoryRow { constraint: 0, row: 1 })
        );
    }

    #[test]
    fn test_objective_and_violation() {
        let cost = StageCost::quadratic(Matrix2::new(1.5, 0.0, 0.0, 1.0), Vector2::new(0.2, -1.0));
        let Formulation::Ready(qp) = StageQp::formulate(
            0,
            0.5,
            &[accel_like()],
            &cost,
            None,
            Interval::new(0.0, 1.0),
        ) else {
            panic!("expected a ready QP");
        };

        // ½(1.5·1 + 1·0.25) + 0.2 - 0.5
        assert_relative_eq!(qp.objective(1.0, 0.5), 0.875 - 0.3, epsilon = 1e-12);
        assert_eq!(qp.max_violation(0.0, 0.5), 0.0);
        // x + 2·0.5·u = 2.5 > 1
        assert_relative_eq!(qp.max_violation(2.0, 0.5), 1.5, epsilon = 1e-12);
    }
}
