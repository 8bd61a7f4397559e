//! Numerical and parallel engine of the distributed CG benchmark.
//!
//! The pipeline mirrors a sparse iterative solver workload end to end:
//!
//! 1. [`geometry`] partitions a global 3D grid among participants.
//! 2. [`problem`] materializes the 27-point stencil operator and its
//!    companion vectors on each local box.
//! 3. [`halo`] plans and performs the boundary exchange that makes the
//!    distributed kernels correct across participant boundaries.
//! 4. [`multigrid`] coarsens the geometry into a four-level hierarchy
//!    and applies the V-cycle preconditioner.
//! 5. [`kernels`] holds SPMV, SYMGS, WAXPBY, DOT and the injection
//!    transfers, in reference form plus data-parallel paths.
//! 6. [`cg`] drives the preconditioned conjugate gradient iteration.
//! 7. [`optimize`] installs the independent-set schedule that lets the
//!    smoother sweep in parallel.
//! 8. [`validate`] checks well-formedness, symmetry, convergence and
//!    repeatability; findings mark the run non-conformant but never
//!    abort it.
//!
//! Intra-participant parallelism is rayon over owned rows; everything
//! cross-participant goes through `cgbench_comm::Transport`.

pub mod cg;
pub mod error;
pub mod geometry;
pub mod halo;
pub mod kernels;
pub mod multigrid;
pub mod optimize;
pub mod problem;
pub mod sparse;
pub mod validate;
pub mod vector;

pub use cg::{cg, CgConfig, CgSolution, CgTiming, CgWorkspace};
pub use error::{BenchError, Result};
pub use geometry::{Geometry, GeometryConfig};
pub use halo::{exchange_halo, HaloPlan};
pub use multigrid::{attach_hierarchy, mg_preconditioner, MgData, MgWorkspace, NUM_LEVELS};
pub use optimize::{optimize_problem, ColorSchedule};
pub use problem::{generate, generate_matrix, Problem};
pub use sparse::SparseMatrix;
pub use vector::Vector;
