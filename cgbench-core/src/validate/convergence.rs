//! Convergence probe on a diagonally exaggerated system.
//!
//! Scaling the diagonal by 1e6 makes the operator nearly diagonal, so
//! CG must converge in a handful of iterations: a small budget for the
//! unpreconditioned run, one or two with the V-cycle. Blowing those
//! budgets, or a residual that climbs after the opening iterations,
//! indicates a broken kernel. The original diagonal is restored before
//! returning.

use cgbench_comm::Transport;
use serde::Serialize;

use crate::cg::{cg, CgConfig, CgTiming, CgWorkspace};
use crate::error::Result;
use crate::multigrid::MgWorkspace;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

const DIAGONAL_EXAGGERATION: f64 = 1.0e6;
const PROBE_TOLERANCE: f64 = 1.0e-12;
const EXPECTED_UNPRECONDITIONED: usize = 12;
const EXPECTED_PRECONDITIONED: usize = 2;

/// Outcome of the convergence probe.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceCheck {
    pub unpreconditioned_iterations: usize,
    pub expected_unpreconditioned: usize,
    pub preconditioned_iterations: usize,
    pub expected_preconditioned: usize,
    /// Residuals decreased monotonically after the opening iterations.
    pub monotonic: bool,
    pub passed: bool,
}

/// Run the probe. The matrix diagonal is modified in place and restored
/// on exit; the hierarchy below stays untouched.
pub fn test_convergence(
    a: &mut SparseMatrix,
    b: &Vector,
    transport: &dyn Transport,
) -> Result<ConvergenceCheck> {
    let original_diagonal = a.extract_diagonal();
    let exaggerated: Vec<f64> = original_diagonal
        .iter()
        .map(|d| d * DIAGONAL_EXAGGERATION)
        .collect();
    a.replace_diagonal(&exaggerated);

    let outcome = probe(a, b, transport);

    a.replace_diagonal(&original_diagonal);
    outcome
}

fn probe(a: &SparseMatrix, b: &Vector, transport: &dyn Transport) -> Result<ConvergenceCheck> {
    let mut ws = CgWorkspace::new(a);
    let mut mg_ws = MgWorkspace::new(a);
    let mut timing = CgTiming::default();
    let mut monotonic = true;

    let mut run = |preconditioned: bool,
                   ws: &mut CgWorkspace,
                   mg_ws: &mut MgWorkspace,
                   timing: &mut CgTiming|
     -> Result<usize> {
        let mut x = Vector::zeros(a.local_rows, a.local_cols);
        let config = CgConfig {
            max_iterations: 50,
            tolerance: PROBE_TOLERANCE,
            preconditioned,
            print_interval: 0,
        };
        let solution = cg(a, b, &mut x, ws, mg_ws, &config, timing, transport)?;
        for pair in solution.residual_trace.windows(2).skip(1) {
            if pair[1] > pair[0] * (1.0 + 1.0e-10) {
                monotonic = false;
            }
        }
        Ok(solution.iterations)
    };

    let unpreconditioned_iterations = run(false, &mut ws, &mut mg_ws, &mut timing)?;
    let preconditioned_iterations = run(true, &mut ws, &mut mg_ws, &mut timing)?;

    let passed = unpreconditioned_iterations <= EXPECTED_UNPRECONDITIONED
        && preconditioned_iterations <= EXPECTED_PRECONDITIONED
        && monotonic;
    if !passed {
        log::warn!(
            "convergence probe failed: {unpreconditioned_iterations} unpreconditioned, \
             {preconditioned_iterations} preconditioned, monotonic={monotonic}"
        );
    }

    Ok(ConvergenceCheck {
        unpreconditioned_iterations,
        expected_unpreconditioned: EXPECTED_UNPRECONDITIONED,
        preconditioned_iterations,
        expected_preconditioned: EXPECTED_PRECONDITIONED,
        monotonic,
        passed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryConfig};
    use crate::multigrid::attach_hierarchy;
    use crate::problem::generate;
    use cgbench_comm::SoloTransport;

    #[test]
    fn exaggerated_system_converges_fast() {
        let geometry = Geometry::build(&GeometryConfig::uniform(16, 16, 16), 0, 1).unwrap();
        let p = generate(geometry, &SoloTransport).unwrap();
        let mut a = p.a;
        attach_hierarchy(&mut a, &SoloTransport).unwrap();

        let check = test_convergence(&mut a, &p.b, &SoloTransport).unwrap();
        assert!(check.passed, "{check:?}");

        // Diagonal restored on exit.
        for row in 0..a.local_rows {
            assert_eq!(a.diagonal(row), 26.0);
        }
    }
}
