//! # TOPP Core
//!
//! Geometric paths, path discretizations and canonical path constraints for
//! time-optimal path parameterization (TOPP).
//!
//! Along a path `q(s)`, joint velocity and acceleration are
//!
//! ```text
//! q̇  = q'(s) ṡ
//! q̈  = q'(s) s̈ + q''(s) ṡ²
//! ```
//!
//! With `u = s̈` and `x = ṡ²` both are linear in `(u, x)`, so every kinematic
//! or dynamic limit can be written in one canonical form per stage:
//!
//! ```text
//! v = a u + b x + c,    F v ≤ h,    u ∈ ubound,    x ∈ xbound
//! ```
//!
//! ## Modules
//!
//! - [`path`]: Path trait, cubic spline interpolator, path discretization
//! - [`constraint`]: Canonical coefficients and the constraint variants
//! - [`error`]: Error types shared by the modules above

pub mod constraint;
pub mod error;
pub mod path;

pub use constraint::{
    CanonicalCoefficients, CanonicalConstraint, DiscretizationScheme, Interval,
    JointAccelerationConstraint, JointTorqueConstraint, JointVelocityConstraint,
};
pub use error::{ConstraintError, PathError};
pub use path::{Path, PathDiscretization, SplineBoundary, SplineInterpolator};

/// Default bound on the path speed `ṡ` used when no joint limits it [1/s]
pub const MAX_PATH_VELOCITY: f64 = 100.0;
