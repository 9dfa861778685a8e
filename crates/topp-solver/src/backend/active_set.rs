//! Active-set enumeration for the two-variable stage QP
//!
//! With a convex objective in two variables the optimum is either a
//! stationary point of the objective, the minimizer along a single active
//! row, or a vertex where two rows are active. Enumerating those candidates
//! and keeping the best feasible one is exact; there is no iteration and no
//! convergence tolerance beyond the feasibility test.

use nalgebra::{Matrix2, Vector2};
use tracing::{trace, warn};

use super::{BackendError, SolverBackend, StageOutcome, StageSolution};
use crate::config::ActiveSetSettings;
use crate::qp::StageQp;

const NAME: &str = "active-set";

/// Eigenvalues of `H` within this many ulps of `|H|` are rounding noise
const EIGEN_NOISE_ULPS: f64 = 64.0;

/// Exact stage QP backend by candidate enumeration
#[derive(Debug, Clone, Default)]
pub struct ActiveSetBackend {
    settings: ActiveSetSettings,
}

/// `normal · z ≤ bound` with `|normal| = 1`
#[derive(Debug, Clone, Copy)]
struct Row {
    normal: Vector2<f64>,
    bound: f64,
}

impl Row {
    fn on_line(&self) -> Vector2<f64> {
        self.normal * self.bound
    }

    fn direction(&self) -> Vector2<f64> {
        Vector2::new(-self.normal.y, self.normal.x)
    }
}

impl ActiveSetBackend {
    pub fn new(settings: ActiveSetSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ActiveSetSettings {
        &self.settings
    }

    /// `Err` when `H` has an eigenvalue too small to invert reliably yet too
    /// large to be rounding noise, or a clearly negative one.
    fn check_conditioning(&self, hessian: &Matrix2<f64>) -> Result<(), BackendError> {
        let scale = 1.0 + hessian.amax();
        let noise = EIGEN_NOISE_ULPS * f64::EPSILON * scale;
        let singular = self.settings.degeneracy_tolerance * scale;
        let eigenvalues = hessian.symmetric_eigenvalues();
        let ill_conditioned = eigenvalues
            .iter()
            .any(|&value| value < -noise || (value > noise && value <= singular));
        if ill_conditioned {
            return Err(BackendError::NumericalFailure {
                backend: NAME,
                status: format!("ill-conditioned hessian, eigenvalues {:?}", eigenvalues.as_slice()),
            });
        }
        Ok(())
    }

    fn feasible(&self, rows: &[Row], z: &Vector2<f64>) -> bool {
        let tol = self.settings.feasibility_tolerance;
        z.iter().all(|v| v.is_finite())
            && rows
                .iter()
                .all(|row| row.normal.dot(z) - row.bound <= tol * (1.0 + row.bound.abs()))
    }

    fn candidates(&self, rows: &[Row], hessian: &Matrix2<f64>, gradient: &Vector2<f64>) -> Vec<Vector2<f64>> {
        let eps = self.settings.degeneracy_tolerance;
        let scale = 1.0 + hessian.amax();
        let mut out = Vec::with_capacity(1 + 2 * rows.len() + rows.len() * rows.len() / 2);

        // Stationary point; singular H only contributes when g lies in its range
        if let Ok(pinv) = hessian.pseudo_inverse(eps * scale) {
            let z = -(pinv * gradient);
            let residual = (hessian * z + gradient).norm();
            if residual <= self.settings.feasibility_tolerance * (1.0 + gradient.norm()) {
                out.push(z);
            }
        }

        for row in rows {
            let z0 = row.on_line();
            out.push(z0);
            let d = row.direction();
            let curvature = d.dot(&(hessian * d));
            if curvature > eps * scale {
                let slope = (hessian * z0 + gradient).dot(&d);
                out.push(z0 - d * (slope / curvature));
            }
        }

        for (j, first) in rows.iter().enumerate() {
            for second in &rows[j + 1..] {
                let det = first.normal.x * second.normal.y - first.normal.y * second.normal.x;
                if det.abs() <= eps {
                    continue;
                }
                out.push(Vector2::new(
                    (first.bound * second.normal.y - second.bound * first.normal.y) / det,
                    (first.normal.x * second.bound - second.normal.x * first.bound) / det,
                ));
            }
        }
        out
    }

    /// A feasible direction along which the objective decreases forever.
    ///
    /// Only recession directions where the objective is linear matter, and
    /// in the plane it suffices to try the row directions, the inward row
    /// normals, the null direction of `H` and `-g`.
    fn unbounded(&self, rows: &[Row], hessian: &Matrix2<f64>, gradient: &Vector2<f64>) -> bool {
        let eps = self.settings.degeneracy_tolerance;
        let scale = 1.0 + hessian.amax();

        let mut directions: Vec<Vector2<f64>> = Vec::with_capacity(3 * rows.len() + 3);
        for row in rows {
            directions.push(row.direction());
            directions.push(-row.direction());
            directions.push(-row.normal);
        }
        let eigen = hessian.symmetric_eigen();
        for (i, value) in eigen.eigenvalues.iter().enumerate() {
            if value.abs() <= eps * scale {
                let e = eigen.eigenvectors.column(i).into_owned();
                directions.push(e);
                directions.push(-e);
            }
        }
        if gradient.norm() > 0.0 {
            directions.push(-gradient.normalize());
        }

        directions.iter().any(|d| {
            rows.iter().all(|row| row.normal.dot(d) <= eps)
                && (hessian * d).norm() <= eps * scale
                && gradient.dot(d) < -eps * (1.0 + gradient.norm())
        })
    }
}

impl SolverBackend for ActiveSetBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn solve(&self, qp: &StageQp) -> Result<StageOutcome, BackendError> {
        let rows: Vec<Row> = qp
            .inequalities()
            .into_iter()
            .filter_map(|(normal, bound)| {
                let norm = normal.norm();
                (norm > 0.0).then(|| Row {
                    normal: normal / norm,
                    bound: bound / norm,
                })
            })
            .collect();
        let hessian = qp.hessian().copied().unwrap_or_else(Matrix2::zeros);
        let gradient = *qp.gradient();
        if let Err(err) = self.check_conditioning(&hessian) {
            warn!(stage = qp.stage(), %err, "active-set cannot decide stage");
            return Err(err);
        }

        let candidates = self.candidates(&rows, &hessian, &gradient);
        let best = candidates
            .iter()
            .filter(|z| self.feasible(&rows, z))
            .map(|z| (qp.objective(z.x, z.y), z))
            .min_by(|a, b| a.0.total_cmp(&b.0));
        trace!(
            stage = qp.stage(),
            rows = rows.len(),
            candidates = candidates.len(),
            "active-set enumeration"
        );

        let Some((objective, z)) = best else {
            return Ok(StageOutcome::Infeasible);
        };
        if self.unbounded(&rows, &hessian, &gradient) {
            trace!(stage = qp.stage(), "objective unbounded below");
            return Ok(StageOutcome::Infeasible);
        }

        Ok(StageOutcome::Optimal(StageSolution {
            u: z.x,
            x: z.y,
            objective,
        }))
    }
}
