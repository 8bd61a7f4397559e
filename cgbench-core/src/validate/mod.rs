//! Validation suite.
//!
//! Four checks run around the timed benchmark: problem well-formedness,
//! operator and preconditioner symmetry, convergence on a diagonally
//! exaggerated system, and repeatability of the final residual norms.
//! A failed check never aborts the run; it marks the report
//! non-conformant.

mod convergence;
mod norms;
mod problem;
mod symmetry;

pub use convergence::{test_convergence, ConvergenceCheck};
pub use norms::{test_norms, NormsCheck};
pub use problem::{check_problem, ProblemCheck};
pub use symmetry::{test_symmetry, SymmetryCheck};

use serde::Serialize;

/// All validation outcomes of one run, as they land in the report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationSummary {
    pub problem: Option<ProblemCheck>,
    pub symmetry: Option<SymmetryCheck>,
    pub convergence: Option<ConvergenceCheck>,
    pub norms: Option<NormsCheck>,
}

impl ValidationSummary {
    /// A run is conformant when every executed check passed.
    pub fn conformant(&self) -> bool {
        self.problem.as_ref().map_or(true, |c| c.passed())
            && self.symmetry.as_ref().map_or(true, |c| c.passed)
            && self.convergence.as_ref().map_or(true, |c| c.passed)
            && self.norms.as_ref().map_or(true, |c| c.passed)
    }
}
