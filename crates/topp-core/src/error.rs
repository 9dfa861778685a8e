//! Error types for paths and path constraints.

use thiserror::Error;

/// Errors raised while building or evaluating a path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathError {
    /// Too few waypoints for the requested interpolation.
    #[error("insufficient waypoints: need at least {required}, got {actual}")]
    InsufficientWaypoints { required: usize, actual: usize },

    /// Knot vector and waypoint count disagree.
    #[error("knot count {knots} does not match waypoint count {waypoints}")]
    KnotCountMismatch { knots: usize, waypoints: usize },

    /// Knots (or grid points) must be finite and strictly increasing.
    #[error("sequence is not strictly increasing at index {index}")]
    NotStrictlyIncreasing { index: usize },

    /// A waypoint or knot contains NaN or infinity.
    #[error("non-finite value in {what}")]
    NonFinite { what: &'static str },

    /// A path returned a vector whose length differs from its dof.
    #[error("path returned {actual} values, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Spline coefficient system could not be solved.
    #[error("singular spline coefficient system")]
    SingularSystem,

    /// Evaluation requested outside the path interval.
    #[error("path parameter {s} is outside [{start}, {end}]")]
    ParameterOutOfRange { s: f64, start: f64, end: f64 },

    /// Discretization needs at least one stage.
    #[error("discretization needs at least 2 grid points, got {0}")]
    EmptyDiscretization(usize),

    /// Discretization does not fit inside the path interval.
    #[error("grid [{grid_start}, {grid_end}] exceeds path interval [{start}, {end}]")]
    GridOutsidePath {
        grid_start: f64,
        grid_end: f64,
        start: f64,
        end: f64,
    },
}

/// Errors raised while producing canonical coefficients.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    /// The path could not supply derivatives at the requested stage.
    #[error("path data unavailable at stage {stage}: {source}")]
    PathData {
        stage: usize,
        #[source]
        source: PathError,
    },

    /// The path produced NaN or infinite derivatives.
    #[error("non-finite path derivative at stage {stage}")]
    NonFiniteDerivative { stage: usize },

    /// Stage index beyond the last grid point.
    #[error("stage {stage} out of range, discretization has {points} points")]
    StageOutOfRange { stage: usize, points: usize },

    /// Limit vector length differs from the path degrees of freedom.
    #[error("{constraint}: expected {expected} joint limits, got {actual}")]
    DofMismatch {
        constraint: String,
        expected: usize,
        actual: usize,
    },

    /// A joint limit has lower > upper or is NaN.
    #[error("{constraint}: invalid limit [{lower}, {upper}] for joint {joint}")]
    InvalidLimit {
        constraint: String,
        joint: usize,
        lower: f64,
        upper: f64,
    },

    /// Path speed cap that is NaN or not positive.
    #[error("{constraint}: path speed cap must be positive, got {value}")]
    InvalidSpeedCap { constraint: String, value: f64 },

    /// A constraint emitted NaN (or infinite `F`, `a`, `b`, `c`) coefficients.
    #[error("{constraint}: non-finite canonical coefficient at stage {stage}")]
    NonFiniteCoefficient { constraint: String, stage: usize },

    /// Canonical coefficient shapes disagree.
    #[error("{constraint}: {detail}")]
    DimensionMismatch { constraint: String, detail: String },
}

impl ConstraintError {
    pub(crate) fn path_data(stage: usize, source: PathError) -> Self {
        Self::PathData { stage, source }
    }
}
