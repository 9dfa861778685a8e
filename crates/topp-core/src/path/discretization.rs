//! Path discretization
//!
//! An ordered grid `s_0 < s_1 < … < s_N` over the path parameter. Stage `i`
//! is the interval `[s_i, s_{i+1}]` with width `D_i = s_{i+1} - s_i`.

use serde::{Deserialize, Serialize};

use super::Path;
use crate::error::PathError;

/// Immutable, strictly increasing grid of path parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDiscretization {
    gridpoints: Vec<f64>,
}

impl PathDiscretization {
    /// Build a discretization from explicit grid points.
    ///
    /// Requires at least two finite, strictly increasing points.
    pub fn new(gridpoints: Vec<f64>) -> Result<Self, PathError> {
        if gridpoints.len() < 2 {
            return Err(PathError::EmptyDiscretization(gridpoints.len()));
        }
        if gridpoints.iter().any(|s| !s.is_finite()) {
            return Err(PathError::NonFinite { what: "grid points" });
        }
        if let Some(index) = gridpoints.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PathError::NotStrictlyIncreasing { index: index + 1 });
        }
        Ok(Self { gridpoints })
    }

    /// `num_stages` equal stages over `[start, end]`.
    pub fn uniform(start: f64, end: f64, num_stages: usize) -> Result<Self, PathError> {
        if num_stages == 0 {
            return Err(PathError::EmptyDiscretization(1));
        }
        let step = (end - start) / num_stages as f64;
        let mut gridpoints: Vec<f64> = (0..=num_stages)
            .map(|k| start + k as f64 * step)
            .collect();
        // Pin the last point so it matches the path end exactly
        gridpoints[num_stages] = end;
        Self::new(gridpoints)
    }

    /// `num_stages` equal stages covering the whole interval of `path`.
    pub fn for_path(path: &dyn Path, num_stages: usize) -> Result<Self, PathError> {
        let (start, end) = path.path_interval();
        Self::uniform(start, end, num_stages)
    }

    /// Number of stages `N`.
    pub fn num_stages(&self) -> usize {
        self.gridpoints.len() - 1
    }

    /// Number of grid points `N + 1`.
    pub fn len(&self) -> usize {
        self.gridpoints.len()
    }

    /// Always false: a discretization has at least two points.
    pub fn is_empty(&self) -> bool {
        self.gridpoints.is_empty()
    }

    /// Grid point `s_i`, if `i ≤ N`.
    pub fn point(&self, i: usize) -> Option<f64> {
        self.gridpoints.get(i).copied()
    }

    /// All grid points.
    pub fn gridpoints(&self) -> &[f64] {
        &self.gridpoints
    }

    /// Stage width `D_i = s_{i+1} - s_i`, if `i < N`.
    pub fn width(&self, i: usize) -> Option<f64> {
        match (self.gridpoints.get(i), self.gridpoints.get(i + 1)) {
            (Some(s), Some(s_next)) => Some(s_next - s),
            _ => None,
        }
    }

    /// All stage widths `D_0 … D_{N-1}`.
    pub fn widths(&self) -> Vec<f64> {
        self.gridpoints.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Check that every grid point can be evaluated on `path`.
    pub fn check_within(&self, path: &dyn Path) -> Result<(), PathError> {
        let first = self.gridpoints[0];
        let last = self.gridpoints[self.num_stages()];
        path.check_parameter(first)
            .and_then(|_| path.check_parameter(last))
            .map_err(|_| {
                let (start, end) = path.path_interval();
                PathError::GridOutsidePath {
                    grid_start: first,
                    grid_end: last,
                    start,
                    end,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_grid() {
        let grid = PathDiscretization::uniform(0.0, 1.0, 200).unwrap();
        assert_eq!(grid.num_stages(), 200);
        assert_eq!(grid.len(), 201);
        assert_eq!(grid.point(200), Some(1.0));

        let total: f64 = grid.widths().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        assert_relative_eq!(grid.width(10).unwrap(), 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_width_out_of_range() {
        let grid = PathDiscretization::uniform(0.0, 1.0, 4).unwrap();
        assert!(grid.width(3).is_some());
        assert!(grid.width(4).is_none());
    }

    #[test]
    fn test_rejects_non_increasing() {
        let err = PathDiscretization::new(vec![0.0, 0.5, 0.5, 1.0]).unwrap_err();
        assert_eq!(err, PathError::NotStrictlyIncreasing { index: 2 });
    }

    #[test]
    fn test_rejects_single_point() {
        assert!(matches!(
            PathDiscretization::new(vec![0.0]),
            Err(PathError::EmptyDiscretization(1))
        ));
        assert!(PathDiscretization::uniform(0.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_rejects_nan() {
        assert!(matches!(
            PathDiscretization::new(vec![0.0, f64::NAN]),
            Err(PathError::NonFinite { .. })
        ));
    }
}
