//! Sparse matrix-vector product y = A*x.

use cgbench_comm::Transport;
use rayon::prelude::*;

use super::PAR_THRESHOLD;
use crate::error::Result;
use crate::halo::exchange_halo;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// y = A*x over the owned rows.
///
/// The halo slots of `x` are refreshed first, so off-process values are
/// visible before any row is computed. Row sums accumulate in stored
/// column order, so results do not depend on the thread count.
pub fn spmv(
    a: &SparseMatrix,
    x: &mut Vector,
    y: &mut Vector,
    transport: &dyn Transport,
) -> Result<()> {
    exchange_halo(a, x, transport)?;

    let xs = x.as_slice();
    let ys = &mut y.as_mut_slice()[..a.local_rows];
    if a.local_rows >= PAR_THRESHOLD {
        ys.par_iter_mut()
            .enumerate()
            .for_each(|(row, out)| *out = row_product(a, xs, row));
    } else {
        for (row, out) in ys.iter_mut().enumerate() {
            *out = row_product(a, xs, row);
        }
    }
    Ok(())
}

#[inline]
fn row_product(a: &SparseMatrix, xs: &[f64], row: usize) -> f64 {
    let mut sum = 0.0;
    for k in a.row_range(row) {
        sum += a.values[k] * xs[a.col_indices[k]];
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryConfig};
    use crate::problem;
    use approx::assert_relative_eq;
    use cgbench_comm::SoloTransport;

    #[test]
    fn matches_dense_row_sums() {
        let geometry = Geometry::build(&GeometryConfig::uniform(8, 8, 8), 0, 1).unwrap();
        let p = problem::generate(geometry, &SoloTransport).unwrap();
        let mut x = Vector::from_elem(p.a.local_rows, p.a.local_cols, 1.0);
        let mut y = Vector::zeros(p.a.local_rows, p.a.local_rows);
        spmv(&p.a, &mut x, &mut y, &SoloTransport).unwrap();

        // A * ones is exactly the row-sum vector, which is b.
        for row in 0..p.a.local_rows {
            assert_relative_eq!(y.owned()[row], p.b.owned()[row], epsilon = 1e-13);
        }
    }

    #[test]
    fn linear_in_the_argument() {
        let geometry = Geometry::build(&GeometryConfig::uniform(8, 8, 8), 0, 1).unwrap();
        let p = problem::generate(geometry, &SoloTransport).unwrap();
        let n = p.a.local_rows;

        let mut x = Vector::random(n, p.a.local_cols, 11);
        let mut y1 = Vector::zeros(n, n);
        spmv(&p.a, &mut x, &mut y1, &SoloTransport).unwrap();

        let mut x2 = x.clone();
        for v in x2.as_mut_slice() {
            *v *= 2.0;
        }
        let mut y2 = Vector::zeros(n, n);
        spmv(&p.a, &mut x2, &mut y2, &SoloTransport).unwrap();

        for row in 0..n {
            assert_relative_eq!(y2.owned()[row], 2.0 * y1.owned()[row], epsilon = 1e-12);
        }
    }
}
