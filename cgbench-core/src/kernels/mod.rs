//! Computational kernels of the benchmark.
//!
//! Each kernel exists in a reference form that defines correctness.
//! SPMV and WAXPBY also carry a row-parallel path taken above a size
//! threshold; SYMGS switches to the color-scheduled sweep when problem
//! optimization has installed one. DOT always reduces deterministically.

mod dot;
mod spmv;
mod symgs;
mod transfer;
mod waxpby;

pub use dot::dot;
pub use spmv::spmv;
pub use symgs::{gauss_seidel_row, symgs};
pub use transfer::{prolongate, restrict};
pub use waxpby::{axpby, waxpby};

/// Row count above which the data-parallel paths pay off.
pub(crate) const PAR_THRESHOLD: usize = 2048;
