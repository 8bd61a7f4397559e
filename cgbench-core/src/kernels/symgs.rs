//! Symmetric Gauss-Seidel smoother.
//!
//! One forward sweep over the owned rows followed by one backward
//! sweep, each using the values already updated earlier in that sweep.
//! The halo is exchanged once at entry and deliberately not refreshed
//! between the sweeps: both sweeps relax against the boundary data from
//! that single exchange. This staleness is part of the operator the
//! benchmark measures and must not be "repaired".

use cgbench_comm::Transport;

use crate::error::Result;
use crate::halo::exchange_halo;
use crate::optimize;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// One symmetric sweep on A*x = rhs, updating `x` in place.
///
/// The reference path is strictly serial per participant; when problem
/// optimization has installed a color schedule the sweep runs color by
/// color instead, rows within a color in parallel.
pub fn symgs(
    a: &SparseMatrix,
    rhs: &Vector,
    x: &mut Vector,
    transport: &dyn Transport,
) -> Result<()> {
    exchange_halo(a, x, transport)?;

    if let Some(schedule) = &a.coloring {
        optimize::colored_sweeps(a, schedule, rhs, x);
        return Ok(());
    }

    let xs = x.as_mut_slice();
    let bs = rhs.as_slice();
    for row in 0..a.local_rows {
        xs[row] = gauss_seidel_row(a, xs, bs, row);
    }
    for row in (0..a.local_rows).rev() {
        xs[row] = gauss_seidel_row(a, xs, bs, row);
    }
    Ok(())
}

/// Relaxed value of one row against the current state of `x`.
#[inline]
pub fn gauss_seidel_row(a: &SparseMatrix, xs: &[f64], bs: &[f64], row: usize) -> f64 {
    let diag = a.diagonal(row);
    let mut sum = bs[row];
    for k in a.row_range(row) {
        sum -= a.values[k] * xs[a.col_indices[k]];
    }
    // The loop above subtracted the diagonal term as well; add it back.
    sum += diag * xs[row];
    sum / diag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryConfig};
    use crate::kernels::spmv;
    use crate::problem;
    use cgbench_comm::SoloTransport;

    fn residual_norm(a: &SparseMatrix, b: &Vector, x: &Vector) -> f64 {
        let mut xc = x.clone();
        let mut ax = Vector::zeros(a.local_rows, a.local_rows);
        spmv(a, &mut xc, &mut ax, &SoloTransport).unwrap();
        b.owned()
            .iter()
            .zip(ax.owned())
            .map(|(bi, ai)| (bi - ai) * (bi - ai))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn sweep_reduces_residual() {
        let geometry = Geometry::build(&GeometryConfig::uniform(8, 8, 8), 0, 1).unwrap();
        let p = problem::generate(geometry, &SoloTransport).unwrap();
        let mut x = Vector::zeros(p.a.local_rows, p.a.local_cols);

        let before = residual_norm(&p.a, &p.b, &x);
        symgs(&p.a, &p.b, &mut x, &SoloTransport).unwrap();
        let after = residual_norm(&p.a, &p.b, &x);
        assert!(after < 0.5 * before, "one sweep should bite: {before} -> {after}");

        symgs(&p.a, &p.b, &mut x, &SoloTransport).unwrap();
        let again = residual_norm(&p.a, &p.b, &x);
        assert!(again < after);
    }

    #[test]
    fn exact_solution_is_a_fixed_point() {
        let geometry = Geometry::build(&GeometryConfig::uniform(8, 8, 8), 0, 1).unwrap();
        let p = problem::generate(geometry, &SoloTransport).unwrap();
        let mut x = p.xexact.clone();
        symgs(&p.a, &p.b, &mut x, &SoloTransport).unwrap();
        for &v in x.owned() {
            assert!((v - 1.0).abs() < 1e-14);
        }
    }
}
