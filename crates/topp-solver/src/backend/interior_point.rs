//! Clarabel interior-point backend
//!
//! Poses the stage QP in Clarabel's conic form
//!
//! ```text
//! minimize    ½ zᵀ P z + qᵀ z
//! subject to  A z + s = b,   s ∈ {0}ⁿᵉ × ℝ₊ⁿⁱ
//! ```
//!
//! Two-sided bounds whose sides coincide become equality rows; every other
//! finite side becomes one `≤` row. Used as the reference oracle.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{Matrix2, Vector2};
use tracing::{debug, warn};

use super::{BackendError, SolverBackend, StageOutcome, StageSolution};
use crate::config::ClarabelSettings;
use crate::qp::StageQp;

const NAME: &str = "clarabel";

/// Stage QP backend wrapping Clarabel
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    settings: ClarabelSettings,
}

/// Constraint rows in Clarabel order: equalities, then inequalities.
#[derive(Debug, Default)]
struct ConicRows {
    equalities: Vec<(Vector2<f64>, f64)>,
    inequalities: Vec<(Vector2<f64>, f64)>,
}

impl ConicRows {
    fn push_interval(&mut self, coeffs: Vector2<f64>, bound: topp_core::Interval, equality_tolerance: f64) {
        if bound.is_bounded() && bound.upper - bound.lower <= equality_tolerance {
            self.equalities.push((coeffs, 0.5 * (bound.lower + bound.upper)));
            return;
        }
        if bound.upper.is_finite() {
            self.inequalities.push((coeffs, bound.upper));
        }
        if bound.lower.is_finite() {
            self.inequalities.push((-coeffs, -bound.lower));
        }
    }

    fn cones(&self) -> Vec<SupportedConeT<f64>> {
        let mut cones = Vec::with_capacity(2);
        if !self.equalities.is_empty() {
            cones.push(ZeroConeT(self.equalities.len()));
        }
        if !self.inequalities.is_empty() {
            cones.push(NonnegativeConeT(self.inequalities.len()));
        }
        cones
    }

    /// `(A, b)` with `A` in compressed sparse column form.
    fn matrices(&self) -> (CscMatrix<f64>, Vec<f64>) {
        let rows: Vec<&(Vector2<f64>, f64)> = self.equalities.iter().chain(self.inequalities.iter()).collect();
        let mut colptr = vec![0usize; 3];
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        for j in 0..2 {
            for (i, (coeffs, _)) in rows.iter().enumerate() {
                if coeffs[j] != 0.0 {
                    rowval.push(i);
                    nzval.push(coeffs[j]);
                }
            }
            colptr[j + 1] = rowval.len();
        }
        let b = rows.iter().map(|(_, bound)| *bound).collect();
        (CscMatrix::new(rows.len(), 2, colptr, rowval, nzval), b)
    }
}

/// Upper triangle of `H` as a 2×2 CSC matrix.
fn hessian_upper_tri(hessian: Option<&Matrix2<f64>>) -> CscMatrix<f64> {
    let mut colptr = vec![0usize; 3];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    if let Some(h) = hessian {
        for j in 0..2 {
            for i in 0..=j {
                if h[(i, j)] != 0.0 {
                    rowval.push(i);
                    nzval.push(h[(i, j)]);
                }
            }
            colptr[j + 1] = rowval.len();
        }
    }
    CscMatrix::new(2, 2, colptr, rowval, nzval)
}

impl ClarabelBackend {
    pub fn new(settings: ClarabelSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClarabelSettings {
        &self.settings
    }

    fn conic_rows(&self, qp: &StageQp) -> ConicRows {
        let eq_tol = self.settings.equality_tolerance;
        let mut rows = ConicRows::default();
        rows.push_interval(Vector2::new(1.0, 0.0), qp.ubound(), eq_tol);
        rows.push_interval(Vector2::new(0.0, 1.0), qp.xbound(), eq_tol);
        rows.push_interval(qp.transition_coefficients(), qp.transition(), eq_tol);

        let (reduced, rhs) = qp.rows();
        for (column, &bound) in reduced.column_iter().zip(rhs.iter()) {
            rows.inequalities.push((column.into_owned(), bound));
        }
        rows
    }
}

impl SolverBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn solve(&self, qp: &StageQp) -> Result<StageOutcome, BackendError> {
        let setup = |reason: String| BackendError::Setup {
            backend: NAME,
            reason,
        };

        let rows = self.conic_rows(qp);
        let cones = rows.cones();
        let (a, b) = rows.matrices();
        let p = hessian_upper_tri(qp.hessian());
        let q = [qp.gradient().x, qp.gradient().y];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.settings.max_iter)
            .time_limit(self.settings.time_limit_s)
            .verbose(false)
            .tol_gap_abs(self.settings.tol_gap_abs)
            .tol_gap_rel(self.settings.tol_gap_rel)
            .tol_feas(self.settings.tol_feas)
            .build()
            .map_err(|e| setup(e.to_string()))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| setup(format!("{e:?}")))?;
        solver.solve();
        let solution = &solver.solution;
        debug!(stage = qp.stage(), status = ?solution.status, "clarabel solve");

        match solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let (u, x) = (solution.x[0], solution.x[1]);
                Ok(StageOutcome::Optimal(StageSolution {
                    u,
                    x,
                    objective: qp.objective(u, x),
                }))
            }
            SolverStatus::PrimalInfeasible
            | SolverStatus::AlmostPrimalInfeasible
            | SolverStatus::DualInfeasible
            | SolverStatus::AlmostDualInfeasible => Ok(StageOutcome::Infeasible),
            status => {
                warn!(stage = qp.stage(), ?status, "clarabel did not reach a verdict");
                Err(BackendError::NumericalFailure {
                    backend: NAME,
                    status: format!("{status:?}"),
                })
            }
        }
    }
}
