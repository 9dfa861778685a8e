//! Stage solver configuration
//!
//! Configuration parameters for stage formulation and the QP backends.

use serde::{Deserialize, Serialize};
use topp_core::DiscretizationScheme;

/// Main stage solver configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Backend constructed by [`SolverBuilder`](crate::solver::SolverBuilder)
    pub backend: BackendKind,
    /// How constraints are attached to a stage
    pub scheme: DiscretizationScheme,
    /// Reference (Clarabel) backend settings
    pub clarabel: ClarabelSettings,
    /// Active-set backend settings
    pub active_set: ActiveSetSettings,
}

/// Available QP backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Generic interior-point conic solver, the reference oracle
    Clarabel,
    /// Exact active-set enumeration for the two-variable stage QP
    ActiveSet,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::ActiveSet
    }
}

/// Clarabel interior-point settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarabelSettings {
    /// Maximum interior-point iterations
    pub max_iter: u32,
    /// Wall-clock limit per solve [s]
    pub time_limit_s: f64,
    /// Absolute duality gap tolerance
    pub tol_gap_abs: f64,
    /// Relative duality gap tolerance
    pub tol_gap_rel: f64,
    /// Feasibility tolerance
    pub tol_feas: f64,
    /// Lower/upper pairs closer than this are posed as equalities
    pub equality_tolerance: f64,
}

impl Default for ClarabelSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            time_limit_s: f64::INFINITY,
            tol_gap_abs: 1e-9,
            tol_gap_rel: 1e-9,
            tol_feas: 1e-9,
            equality_tolerance: 0.0,
        }
    }
}

/// Active-set enumeration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSetSettings {
    /// Allowed violation of a normalized row for a candidate to count as feasible
    pub feasibility_tolerance: f64,
    /// Determinants, curvatures and slopes below this are treated as zero
    pub degeneracy_tolerance: f64,
}

impl Default for ActiveSetSettings {
    fn default() -> Self {
        Self {
            feasibility_tolerance: 1e-9,
            degeneracy_tolerance: 1e-12,
        }
    }
}

/// Agreement tolerance between two backends on the same stage QP
///
/// The absolute tolerance on the decision variables is loose; it is a
/// documented bound, not a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyTolerance {
    /// Relative tolerance on values
    pub relative: f64,
    /// Absolute tolerance on values
    pub absolute: f64,
}

impl Default for ConsistencyTolerance {
    fn default() -> Self {
        Self {
            relative: 1e-5,
            absolute: 5e-3,
        }
    }
}

impl ConsistencyTolerance {
    /// `|a - b| ≤ absolute + relative · max(|a|, |b|)`
    pub fn close(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.absolute + self.relative * a.abs().max(b.abs())
    }
}
