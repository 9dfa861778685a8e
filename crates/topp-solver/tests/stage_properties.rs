//! Property-based tests for stage solves.
//!
//! Random costs and bounds on a fixed random path; verifies feasibility,
//! determinism and, with Clarabel compiled, cross-backend agreement.
//!
//! Run with: cargo test -p topp-solver -- proptest

use std::sync::{Arc, OnceLock};

use nalgebra::{DMatrix, Matrix2, Vector2};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use topp_core::{
    CanonicalConstraint, DiscretizationScheme, JointAccelerationConstraint, JointVelocityConstraint, Path,
    PathDiscretization, SplineInterpolator,
};
use topp_solver::{BackendKind, Formulation, SolverBuilder, SolverConfig, StageOutcome, StageSolver};

const STAGES: usize = 100;

fn build(backend: BackendKind, scheme: DiscretizationScheme) -> StageSolver {
    let mut rng = StdRng::seed_from_u64(2024);
    let dof = 4;
    let waypoints = DMatrix::from_fn(5, dof, |_, _| rng.gen_range(-1.0..1.0));
    let knots = [0.0, 0.2, 0.5, 0.8, 1.0];
    let path: Arc<dyn Path> = Arc::new(SplineInterpolator::new(&knots, waypoints).unwrap());
    let vlim: Vec<f64> = (0..dof).map(|_| rng.gen_range(1.0..3.0)).collect();
    let alim: Vec<f64> = (0..dof).map(|_| rng.gen_range(5.0..10.0)).collect();
    let constraints: Vec<Arc<dyn CanonicalConstraint>> = vec![
        Arc::new(JointVelocityConstraint::symmetric(&vlim).unwrap()),
        Arc::new(JointAccelerationConstraint::symmetric(&alim).unwrap()),
    ];

    let grid = PathDiscretization::for_path(path.as_ref(), STAGES).unwrap();
    let config = SolverConfig {
        backend,
        scheme,
        ..Default::default()
    };
    SolverBuilder::new(path, grid)
        .with_constraints(constraints)
        .with_config(config)
        .build()
        .unwrap()
}

fn exact() -> &'static StageSolver {
    static SOLVER: OnceLock<StageSolver> = OnceLock::new();
    SOLVER.get_or_init(|| build(BackendKind::ActiveSet, DiscretizationScheme::Collocation))
}

/// A stage query: stage, H, g, [xmin, xmax], [xnext_min, xnext_max]
#[derive(Debug, Clone)]
struct Query {
    stage: usize,
    hessian: Option<Matrix2<f64>>,
    gradient: Vector2<f64>,
    x_box: Option<(f64, f64)>,
    xnext: (f64, f64),
}

impl Query {
    fn solve(&self, solver: &StageSolver) -> StageOutcome {
        let (xmin, xmax) = match self.x_box {
            Some((lo, hi)) => (Some(lo), Some(hi)),
            None => (None, None),
        };
        solver
            .solve_stagewise_optim(
                self.stage,
                self.hessian.as_ref(),
                &self.gradient,
                xmin,
                xmax,
                self.xnext.0,
                self.xnext.1,
            )
            .unwrap()
    }

    fn formulate(&self, solver: &StageSolver) -> Formulation {
        let (xmin, xmax) = match self.x_box {
            Some((lo, hi)) => (Some(lo), Some(hi)),
            None => (None, None),
        };
        solver
            .formulate(
                self.stage,
                self.hessian.as_ref(),
                &self.gradient,
                xmin,
                xmax,
                self.xnext.0,
                self.xnext.1,
            )
            .unwrap()
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// PSD Hessian `LLᵀ` from a random lower-triangular factor, or none.
fn arb_hessian() -> impl Strategy<Value = Option<Matrix2<f64>>> {
    prop::option::of((0.0..2.0f64, -1.0..1.0f64, 0.0..2.0f64).prop_map(|(l00, l10, l11)| {
        let l = Matrix2::new(l00, 0.0, l10, l11);
        l * l.transpose()
    }))
}

fn arb_query() -> impl Strategy<Value = Query> {
    (
        0..STAGES,
        arb_hessian(),
        prop::array::uniform2(-2.0..2.0f64),
        prop::option::of((-0.5..1.0f64, 0.0..1.5f64)),
        (-0.5..0.5f64, 0.0..1.5f64),
    )
        .prop_map(|(stage, hessian, [g0, g1], x_box, (xnext_lo, xnext_width))| Query {
            stage,
            hessian,
            gradient: Vector2::new(g0, g1),
            x_box: x_box.map(|(lo, width)| (lo, lo + width)),
            xnext: (xnext_lo, xnext_lo + xnext_width),
        })
}

// =============================================================================
// Property Tests: Exact Backend
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// An optimal point satisfies every constraint of its stage QP.
    #[test]
    fn proptest_solution_is_feasible(query in arb_query()) {
        let solver = exact();
        let outcome = query.solve(solver);
        if let (Formulation::Ready(qp), Some(solution)) = (query.formulate(solver), outcome.solution()) {
            prop_assert!(qp.max_violation(solution.u, solution.x) <= 1e-7);
            prop_assert!((qp.objective(solution.u, solution.x) - solution.objective).abs() <= 1e-12);
        }
    }

    /// Same query, same answer.
    #[test]
    fn proptest_solve_is_idempotent(query in arb_query()) {
        let solver = exact();
        prop_assert_eq!(query.solve(solver), query.solve(solver));
    }

    /// No feasible point beats the reported optimum.
    #[test]
    fn proptest_no_better_feasible_point(query in arb_query(), probes in prop::collection::vec((-50.0..50.0f64, 0.0..2.0f64), 32)) {
        let solver = exact();
        let Formulation::Ready(qp) = query.formulate(solver) else {
            return Ok(());
        };
        match query.solve(solver) {
            StageOutcome::Optimal(solution) => {
                for (u, x) in probes {
                    if qp.max_violation(u, x) <= 0.0 {
                        prop_assert!(qp.objective(u, x) >= solution.objective - 1e-9);
                    }
                }
            }
            StageOutcome::Infeasible => {
                // Bounded polygon here, so no probe may be feasible
                for (u, x) in probes {
                    prop_assert!(qp.max_violation(u, x) > 0.0);
                }
            }
        }
    }
}

// =============================================================================
// Property Tests: Cross-Backend Agreement
// =============================================================================

#[cfg(feature = "clarabel")]
mod reference {
    use super::*;
    use topp_solver::ConsistencyTolerance;

    fn reference() -> &'static StageSolver {
        static SOLVER: OnceLock<StageSolver> = OnceLock::new();
        SOLVER.get_or_init(|| build(BackendKind::Clarabel, DiscretizationScheme::Collocation))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Both backends reach the same verdict and objective.
        #[test]
        fn proptest_backends_agree(query in arb_query()) {
            let (xmin, xmax) = match query.x_box {
                Some((lo, hi)) => (Some(lo), Some(hi)),
                None => (None, None),
            };
            let result = reference().solve_stagewise_optim(
                query.stage,
                query.hessian.as_ref(),
                &query.gradient,
                xmin,
                xmax,
                query.xnext.0,
                query.xnext.1,
            );
            // Interior-point status other than a verdict is not a disagreement
            prop_assume!(result.is_ok());
            let theirs = result.unwrap();
            let ours = query.solve(exact());
            prop_assert!(ours.agrees_with(&theirs, &ConsistencyTolerance::default()), "{:?} vs {:?}", ours, theirs);
        }
    }
}

// =============================================================================
// Shared solver across threads
// =============================================================================

#[test]
fn test_parallel_stages_match_sequential() {
    let solver = build(BackendKind::ActiveSet, DiscretizationScheme::Interpolation);
    let h = Matrix2::new(1.0, 0.0, 0.0, 0.5);
    let g = Vector2::new(0.1, -1.0);
    let solve = |stage: usize| {
        solver
            .solve_stagewise_optim(stage, Some(&h), &g, None, None, 0.0, 1.0)
            .unwrap()
    };

    let sequential: Vec<StageOutcome> = (0..STAGES).map(solve).collect();
    let parallel: Vec<StageOutcome> = (0..STAGES).into_par_iter().map(solve).collect();
    assert_eq!(sequential, parallel);
    assert!(sequential.iter().any(StageOutcome::is_feasible));
}

#[test]
fn test_interpolation_is_more_conservative() {
    let collocation = exact();
    let interpolation = build(BackendKind::ActiveSet, DiscretizationScheme::Interpolation);
    let g = Vector2::new(0.0, -1.0);

    // Maximum reachable x under interpolation never exceeds collocation's
    for stage in 0..STAGES {
        let loose = collocation.solve_stagewise_optim(stage, None, &g, None, None, 0.0, 10.0).unwrap();
        let tight = interpolation.solve_stagewise_optim(stage, None, &g, None, None, 0.0, 10.0).unwrap();
        if let (Some(loose), Some(tight)) = (loose.point(), tight.point()) {
            assert!(tight.1 <= loose.1 + 1e-9, "stage {stage}: {} > {}", tight.1, loose.1);
        }
        if !loose.is_feasible() {
            assert!(!tight.is_feasible());
        }
    }
}
