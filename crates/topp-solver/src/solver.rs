//! Stage-wise solver interface
//!
//! Binds a path, a grid and a set of canonical constraints to one QP backend
//! and answers single-stage queries. A solver holds no per-call state, so it
//! can be shared between threads and queried for different stages at once.

use std::sync::Arc;

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;
use tracing::{debug, trace};

use topp_core::{
    CanonicalCoefficients, CanonicalConstraint, ConstraintError, DiscretizationScheme, Interval,
    Path, PathDiscretization, PathError,
};

use crate::backend::{self, BackendError, SolverBackend, StageOutcome};
use crate::config::SolverConfig;
use crate::qp::{Formulation, StageCost, StageQp};

/// Solver errors
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Stage {stage} out of range: the grid has {num_stages} stages")]
    StageOutOfRange { stage: usize, num_stages: usize },
    #[error("xmin and xmax must be given together")]
    MismatchedStateBounds,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid cost: {0}")]
    InvalidCost(String),
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Relative tolerance on the symmetry and PSD checks of `H`
const HESSIAN_TOLERANCE: f64 = 1e-9;

/// Reject non-finite, asymmetric or indefinite costs.
fn validate_cost(hessian: Option<&Matrix2<f64>>, gradient: &Vector2<f64>) -> Result<(), SolverError> {
    if gradient.iter().any(|g| !g.is_finite()) {
        return Err(SolverError::InvalidCost(format!("gradient {gradient:?} is not finite")));
    }
    let Some(h) = hessian else {
        return Ok(());
    };
    if h.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::InvalidCost("hessian is not finite".to_string()));
    }
    let scale = 1.0 + h.amax();
    if (h[(0, 1)] - h[(1, 0)]).abs() > HESSIAN_TOLERANCE * scale {
        return Err(SolverError::InvalidCost("hessian is not symmetric".to_string()));
    }
    // Smallest eigenvalue of the symmetric part
    let mean = 0.5 * (h[(0, 0)] + h[(1, 1)]);
    let off = 0.5 * (h[(0, 1)] + h[(1, 0)]);
    let radius = (0.25 * (h[(0, 0)] - h[(1, 1)]).powi(2) + off * off).sqrt();
    if mean - radius < -HESSIAN_TOLERANCE * scale {
        return Err(SolverError::InvalidCost("hessian is not positive semidefinite".to_string()));
    }
    Ok(())
}

/// Caller's `[xmin, xmax]`, if any.
fn state_box(xmin: Option<f64>, xmax: Option<f64>) -> Result<Option<Interval>, SolverError> {
    match (xmin, xmax) {
        (None, None) => Ok(None),
        (Some(lower), Some(upper)) => {
            if lower.is_nan() || upper.is_nan() {
                return Err(SolverError::InvalidInput("xmin/xmax must not be NaN".to_string()));
            }
            Ok(Some(Interval::new(lower, upper)))
        }
        _ => Err(SolverError::MismatchedStateBounds),
    }
}

/// Stage-wise QP solver over a fixed path, grid and constraint set
pub struct StageSolver {
    constraints: Vec<Arc<dyn CanonicalConstraint>>,
    path: Arc<dyn Path>,
    discretization: Arc<PathDiscretization>,
    scheme: DiscretizationScheme,
    backend: Box<dyn SolverBackend>,
}

impl std::fmt::Debug for StageSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSolver")
            .field("constraints", &self.constraints.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("num_stages", &self.num_stages())
            .field("scheme", &self.scheme)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl StageSolver {
    /// Create a solver; the grid must lie within the path's domain.
    pub fn new(
        constraints: Vec<Arc<dyn CanonicalConstraint>>,
        path: Arc<dyn Path>,
        discretization: Arc<PathDiscretization>,
        backend: Box<dyn SolverBackend>,
    ) -> Result<Self, SolverError> {
        discretization.check_within(path.as_ref())?;
        debug!(
            constraints = constraints.len(),
            stages = discretization.num_stages(),
            backend = backend.name(),
            "stage solver created"
        );
        Ok(Self {
            constraints,
            path,
            discretization,
            scheme: DiscretizationScheme::default(),
            backend,
        })
    }

    pub fn with_scheme(mut self, scheme: DiscretizationScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Number of stages `N`.
    pub fn num_stages(&self) -> usize {
        self.discretization.num_stages()
    }

    /// Stage widths `D_i = s_{i+1} - s_i`.
    pub fn deltas(&self) -> Vec<f64> {
        self.discretization.widths()
    }

    pub fn discretization(&self) -> &PathDiscretization {
        &self.discretization
    }

    pub fn path(&self) -> &dyn Path {
        self.path.as_ref()
    }

    pub fn constraints(&self) -> &[Arc<dyn CanonicalConstraint>] {
        &self.constraints
    }

    pub fn scheme(&self) -> DiscretizationScheme {
        self.scheme
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Validated canonical coefficients of every constraint at grid point
    /// `stage` (`0 ≤ stage ≤ N`), in constraint order.
    pub fn stage_coefficients(&self, stage: usize) -> Result<Vec<CanonicalCoefficients>, SolverError> {
        self.constraints
            .iter()
            .map(|constraint| {
                self.scheme
                    .stage_coefficients(constraint.as_ref(), self.path.as_ref(), &self.discretization, stage)
                    .map_err(SolverError::from)
            })
            .collect()
    }

    /// Assemble the stage QP without solving it.
    ///
    /// Takes the same arguments as [`solve_stagewise_optim`](Self::solve_stagewise_optim).
    #[allow(clippy::too_many_arguments)]
    pub fn formulate(
        &self,
        stage: usize,
        hessian: Option<&Matrix2<f64>>,
        gradient: &Vector2<f64>,
        xmin: Option<f64>,
        xmax: Option<f64>,
        xnext_min: f64,
        xnext_max: f64,
    ) -> Result<Formulation, SolverError> {
        let num_stages = self.num_stages();
        let delta = self
            .discretization
            .width(stage)
            .ok_or(SolverError::StageOutOfRange { stage, num_stages })?;
        let x_box = state_box(xmin, xmax)?;
        if xnext_min.is_nan() || xnext_max.is_nan() {
            return Err(SolverError::InvalidInput("xnext_min/xnext_max must not be NaN".to_string()));
        }
        validate_cost(hessian, gradient)?;

        let coefficients = self.stage_coefficients(stage)?;
        let cost = StageCost {
            hessian: hessian.copied(),
            gradient: *gradient,
        };
        Ok(StageQp::formulate(
            stage,
            delta,
            &coefficients,
            &cost,
            x_box,
            Interval::new(xnext_min, xnext_max),
        ))
    }

    /// Solve the stage-`stage` QP over `(u, x)`.
    ///
    /// # Arguments
    /// * `stage` - Stage index, `0 ≤ stage < N`
    /// * `hessian` - Quadratic cost `H` (symmetric PSD), `None` for a linear cost
    /// * `gradient` - Linear cost `g`
    /// * `xmin`, `xmax` - Extra bound on `x`; both or neither
    /// * `xnext_min`, `xnext_max` - Bounds on `x + 2 D_i u`
    ///
    /// # Returns
    /// [`StageOutcome::Optimal`] with the minimizer, or
    /// [`StageOutcome::Infeasible`] when the feasible set is empty or the
    /// objective is unbounded below
    #[allow(clippy::too_many_arguments)]
    pub fn solve_stagewise_optim(
        &self,
        stage: usize,
        hessian: Option<&Matrix2<f64>>,
        gradient: &Vector2<f64>,
        xmin: Option<f64>,
        xmax: Option<f64>,
        xnext_min: f64,
        xnext_max: f64,
    ) -> Result<StageOutcome, SolverError> {
        let qp = match self.formulate(stage, hessian, gradient, xmin, xmax, xnext_min, xnext_max)? {
            Formulation::Ready(qp) => qp,
            Formulation::Infeasible(reason) => {
                debug!(stage, ?reason, "stage infeasible before solve");
                return Ok(StageOutcome::Infeasible);
            }
        };

        let outcome = self.backend.solve(&qp)?;
        trace!(stage, backend = self.backend.name(), ?outcome, "stage solved");
        Ok(outcome)
    }
}

/// Builder for stage solvers
pub struct SolverBuilder {
    path: Arc<dyn Path>,
    discretization: Arc<PathDiscretization>,
    constraints: Vec<Arc<dyn CanonicalConstraint>>,
    config: SolverConfig,
    backend: Option<Box<dyn SolverBackend>>,
}

impl SolverBuilder {
    pub fn new(path: Arc<dyn Path>, discretization: impl Into<Arc<PathDiscretization>>) -> Self {
        Self {
            path,
            discretization: discretization.into(),
            constraints: Vec::new(),
            config: SolverConfig::default(),
            backend: None,
        }
    }

    pub fn with_constraint(mut self, constraint: Arc<dyn CanonicalConstraint>) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Arc<dyn CanonicalConstraint>>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `backend` instead of the one named in the config.
    pub fn with_backend(mut self, backend: Box<dyn SolverBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<StageSolver, SolverError> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => backend::from_config(&self.config)?,
        };
        Ok(StageSolver::new(self.constraints, self.path, self.discretization, backend)?
            .with_scheme(self.config.scheme))
    }
}
