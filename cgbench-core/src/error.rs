//! Error taxonomy for problem setup and the solver.
//!
//! Configuration errors abort the run before CG starts; communication
//! errors are fatal everywhere; the numerical anomaly (loss of positive
//! definiteness) aborts CG with a diagnostic. Validator findings are
//! not errors: they are recorded in the report and flag the run
//! non-conformant.

use cgbench_comm::CommError;
use thiserror::Error;

/// Errors surfaced by geometry, problem setup and the CG driver.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Local box dimensions must be positive multiples of 8 so the
    /// hierarchy coarsens three times with even divisions.
    #[error("invalid local dimensions {nx}x{ny}x{nz}: each must be a positive multiple of 8")]
    InvalidDimensions { nx: usize, ny: usize, nz: usize },

    /// A requested process grid whose volume disagrees with the group.
    #[error("process grid {npx}x{npy}x{npz} does not match {size} participants")]
    ProcessGridMismatch {
        npx: usize,
        npy: usize,
        npz: usize,
        size: usize,
    },

    /// No factorization of the participant count stays inside the
    /// configured aspect-ratio bound.
    #[error("no process grid for {size} participants within aspect bound {bound:.1}")]
    AspectRatio { size: usize, bound: f64 },

    /// Inconsistent z-slab parameters.
    #[error("invalid pencil parameters pz={pz} zl={zl} zu={zu} for npz={npz}")]
    InvalidPencil {
        pz: usize,
        zl: usize,
        zu: usize,
        npz: usize,
    },

    /// p'Ap lost positivity inside CG; the operator is no longer SPD
    /// from the iteration's point of view.
    #[error("loss of positive definiteness: p'Ap = {pap:e} at iteration {iteration}")]
    IndefiniteOperator { pap: f64, iteration: usize },

    /// Fatal message-layer failure.
    #[error(transparent)]
    Comm(#[from] CommError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BenchError>;
