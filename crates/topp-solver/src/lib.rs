//! # TOPP Stage Solver
//!
//! Solves one stage of the discretized time-optimal path parameterization
//! problem at a time:
//!
//! ```text
//! minimize    ½ zᵀ H z + gᵀ z,         z = (u, x) = (s̈, ṡ²)
//! subject to  canonical constraints at stage i
//!             xmin ≤ x ≤ xmax
//!             xnext_min ≤ x + 2 D_i u ≤ xnext_max
//! ```
//!
//! Forward/backward reachability passes call this kernel once per stage.
//!
//! # Components
//!
//! - [`solver`]: [`StageSolver`] and its builder
//! - [`qp`]: Stage QP formulation and feasibility pre-checks
//! - [`backend`]: QP backends (exact active-set, Clarabel interior point)
//! - [`config`]: Backend and scheme configuration

pub mod backend;
pub mod config;
pub mod qp;
pub mod solver;

// Re-exports
pub use backend::{ActiveSetBackend, BackendError, SolverBackend, StageOutcome, StageSolution};
#[cfg(feature = "clarabel")]
pub use backend::ClarabelBackend;
pub use config::{ActiveSetSettings, BackendKind, ClarabelSettings, ConsistencyTolerance, SolverConfig};
pub use qp::{Formulation, InfeasibleReason, StageCost, StageQp};
pub use solver::{SolverBuilder, SolverError, StageSolver};
