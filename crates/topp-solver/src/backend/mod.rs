//! QP Backends
//!
//! Anything that can solve a [`StageQp`] to global optimality. Backends
//! report unbounded programs as [`StageOutcome::Infeasible`]; a backend that
//! fails to reach a verdict returns [`BackendError::NumericalFailure`].

mod active_set;
#[cfg(feature = "clarabel")]
mod interior_point;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BackendKind, ConsistencyTolerance, SolverConfig};
use crate::qp::StageQp;

pub use active_set::ActiveSetBackend;
#[cfg(feature = "clarabel")]
pub use interior_point::ClarabelBackend;

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend} could not be set up: {reason}")]
    Setup { backend: &'static str, reason: String },
    #[error("{backend} failed to reach a verdict (status {status})")]
    NumericalFailure { backend: &'static str, status: String },
    #[error("Backend {0:?} not available (feature not compiled)")]
    NotAvailable(BackendKind),
}

/// Optimal point of a stage QP
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSolution {
    /// Path acceleration `s̈`
    pub u: f64,
    /// Squared path velocity `ṡ²`
    pub x: f64,
    /// Objective value at `(u, x)`
    pub objective: f64,
}

/// Verdict of one stage solve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StageOutcome {
    Optimal(StageSolution),
    /// Empty feasible set, or objective unbounded below
    Infeasible,
}

impl StageOutcome {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Self::Optimal(_))
    }

    pub fn solution(&self) -> Option<&StageSolution> {
        match self {
            Self::Optimal(solution) => Some(solution),
            Self::Infeasible => None,
        }
    }

    /// `(u, x)` when optimal.
    pub fn point(&self) -> Option<(f64, f64)> {
        self.solution().map(|s| (s.u, s.x))
    }

    /// Same verdict and, when optimal, objective values within `tolerance`.
    ///
    /// Optimal points are not compared: a stage QP with a linear objective
    /// may have a whole edge of optima.
    pub fn agrees_with(&self, other: &StageOutcome, tolerance: &ConsistencyTolerance) -> bool {
        match (self, other) {
            (Self::Infeasible, Self::Infeasible) => true,
            (Self::Optimal(a), Self::Optimal(b)) => tolerance.close(a.objective, b.objective),
            _ => false,
        }
    }

    /// Optimal points within `tolerance` component-wise.
    pub fn point_close_to(&self, other: &StageOutcome, tolerance: &ConsistencyTolerance) -> bool {
        match (self.point(), other.point()) {
            (Some((u0, x0)), Some((u1, x1))) => tolerance.close(u0, u1) && tolerance.close(x0, x1),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Trait for stage QP backends
pub trait SolverBackend: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Solve `qp` to global optimality
    fn solve(&self, qp: &StageQp) -> Result<StageOutcome, BackendError>;
}

/// Backend selected by `config.backend`.
pub fn from_config(config: &SolverConfig) -> Result<Box<dyn SolverBackend>, BackendError> {
    match config.backend {
        BackendKind::ActiveSet => Ok(Box::new(ActiveSetBackend::new(config.active_set.clone()))),
        #[cfg(feature = "clarabel")]
        BackendKind::Clarabel => Ok(Box::new(ClarabelBackend::new(config.clarabel.clone()))),
        #[cfg(not(feature = "clarabel"))]
        BackendKind::Clarabel => Err(BackendError::NotAvailable(BackendKind::Clarabel)),
    }
}
