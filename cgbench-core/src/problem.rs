//! Synthetic problem assembly: the 27-point stencil operator on the
//! local box, plus right-hand side, exact solution and initial guess.
//!
//! Each owned grid point becomes one row. The row holds 27 coefficients
//! minus whatever part of the stencil steps outside the global box:
//! 26.0 on the diagonal, -1.0 for every in-box neighbor. The right-hand
//! side follows the row-sum rule so the all-ones vector is the exact
//! solution, which gives interior rows b = 0 and boundary rows a
//! positive value equal to their missing-neighbor count.

use cgbench_comm::Transport;

use crate::error::Result;
use crate::geometry::Geometry;
use crate::halo;
use crate::sparse::{SparseMatrix, UNMAPPED};
use crate::vector::Vector;

/// Diagonal coefficient of every row.
pub const DIAGONAL: f64 = 26.0;
/// Off-diagonal coefficient of every in-box neighbor.
pub const OFF_DIAGONAL: f64 = -1.0;
/// Stencil size at an interior point.
pub const STENCIL_POINTS: usize = 27;

/// Matrix with its companion vectors, as produced for the finest level.
#[derive(Debug)]
pub struct Problem {
    pub a: SparseMatrix,
    /// Right-hand side over owned rows.
    pub b: Vector,
    /// Initial guess, zero; sized with halo slots.
    pub x: Vector,
    /// Exact solution, all ones; sized with halo slots.
    pub xexact: Vector,
}

/// Assemble the operator for `geometry` and plan its halo exchange.
///
/// This is also the coarse-level entry point: the multigrid builder
/// calls it once per coarsened geometry.
pub fn generate_matrix(geometry: Geometry, transport: &dyn Transport) -> Result<SparseMatrix> {
    let local_rows = geometry.local_rows();
    let stencil_cap = local_rows * STENCIL_POINTS;

    let mut row_ptrs = Vec::with_capacity(local_rows + 1);
    let mut col_indices = Vec::with_capacity(stencil_cap);
    let mut values = Vec::with_capacity(stencil_cap);
    let mut global_cols = Vec::with_capacity(stencil_cap);
    let mut diag_ptrs = Vec::with_capacity(local_rows);
    let mut row_globals = Vec::with_capacity(local_rows);

    row_ptrs.push(0);
    for row in 0..local_rows {
        let (gx, gy, gz) = geometry.coords_of_local(row);
        row_globals.push(geometry.global_index(gx, gy, gz));

        for sz in -1i64..=1 {
            for sy in -1i64..=1 {
                for sx in -1i64..=1 {
                    let cx = gx as i64 + sx;
                    let cy = gy as i64 + sy;
                    let cz = gz as i64 + sz;
                    if !geometry.contains(cx, cy, cz) {
                        continue;
                    }
                    let (cx, cy, cz) = (cx as u64, cy as u64, cz as u64);
                    if sx == 0 && sy == 0 && sz == 0 {
                        diag_ptrs.push(values.len());
                        values.push(DIAGONAL);
                    } else {
                        values.push(OFF_DIAGONAL);
                    }
                    global_cols.push(geometry.global_index(cx, cy, cz));
                    col_indices.push(geometry.local_index_of(cx, cy, cz).unwrap_or(UNMAPPED));
                }
            }
        }
        row_ptrs.push(values.len());
    }

    let total_rows = transport.allreduce_sum_u64(local_rows as u64)?;
    let total_nonzeros = transport.allreduce_sum_u64(values.len() as u64)?;

    let mut a = SparseMatrix {
        geometry,
        local_rows,
        local_cols: local_rows,
        total_rows,
        total_nonzeros,
        row_ptrs,
        col_indices,
        values,
        diag_ptrs,
        global_cols,
        row_globals,
        halo: None,
        mg: None,
        coloring: None,
    };

    halo::setup_halo(&mut a, transport)?;

    log::debug!(
        "generated level {}x{}x{}: {} rows, {} nonzeros, {} halo columns",
        a.geometry.nx,
        a.geometry.ny,
        a.geometry.nz,
        a.local_rows,
        a.local_nonzeros(),
        a.local_cols - a.local_rows
    );
    Ok(a)
}

/// Assemble the finest-level problem: operator plus b, x0 and xexact.
pub fn generate(geometry: Geometry, transport: &dyn Transport) -> Result<Problem> {
    let a = generate_matrix(geometry, transport)?;
    let local_rows = a.local_rows;
    let local_cols = a.local_cols;

    let mut b = Vector::zeros(local_rows, local_rows);
    {
        let bs = b.as_mut_slice();
        for (row, slot) in bs.iter_mut().enumerate() {
            // Row-sum rule with xexact = 1.
            *slot = DIAGONAL + OFF_DIAGONAL * (a.nnz_in_row(row) - 1) as f64;
        }
    }

    let x = Vector::zeros(local_rows, local_cols);
    let xexact = Vector::from_elem(local_rows, local_cols, 1.0);

    Ok(Problem { a, b, x, xexact })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryConfig;
    use cgbench_comm::SoloTransport;

    fn single(nx: usize, ny: usize, nz: usize) -> Problem {
        let geometry = Geometry::build(&GeometryConfig::uniform(nx, ny, nz), 0, 1).unwrap();
        generate(geometry, &SoloTransport).unwrap()
    }

    #[test]
    fn row_counts_span_stencil_footprints() {
        let p = single(16, 16, 16);
        let mut min_nnz = usize::MAX;
        let mut max_nnz = 0;
        for row in 0..p.a.local_rows {
            let nnz = p.a.nnz_in_row(row);
            min_nnz = min_nnz.min(nnz);
            max_nnz = max_nnz.max(nnz);
        }
        // Corner rows keep 8 points, interior rows all 27.
        assert_eq!(min_nnz, 8);
        assert_eq!(max_nnz, 27);
        assert_eq!(p.a.nnz_in_row(0), 8);
    }

    #[test]
    fn coefficients_and_diagonal() {
        let p = single(16, 16, 16);
        for row in 0..p.a.local_rows {
            assert_eq!(p.a.diagonal(row), DIAGONAL);
            let diag_ptr = p.a.diag_ptrs[row];
            for ptr in p.a.row_range(row) {
                if ptr != diag_ptr {
                    assert_eq!(p.a.values[ptr], OFF_DIAGONAL);
                }
            }
        }
    }

    #[test]
    fn rhs_follows_row_sums() {
        let p = single(16, 16, 16);
        let interior = p.a.geometry.local_index_of(8, 8, 8).unwrap();
        assert_eq!(p.b.owned()[interior], 0.0);
        // A global corner misses 19 of its 27 neighbors.
        assert_eq!(p.b.owned()[0], 19.0);
        for row in 0..p.a.local_rows {
            let row_sum: f64 = p.a.row_entries(row).map(|(_, v)| v).sum();
            assert_eq!(p.b.owned()[row], row_sum);
        }
    }

    #[test]
    fn totals_match_box_volume() {
        let p = single(32, 24, 16);
        assert_eq!(p.a.total_rows, 32 * 24 * 16);
        assert_eq!(p.a.total_nonzeros as usize, p.a.local_nonzeros());
        assert_eq!(p.a.local_cols, p.a.local_rows);
        assert!(p.a.halo.is_none());
    }

    #[test]
    fn columns_sorted_by_global_id() {
        let p = single(16, 16, 16);
        for row in 0..p.a.local_rows {
            let range = p.a.row_range(row);
            let cols = &p.a.global_cols[range];
            assert!(cols.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn initial_guess_and_exact_solution() {
        let p = single(16, 16, 16);
        assert!(p.x.owned().iter().all(|&v| v == 0.0));
        assert!(p.xexact.owned().iter().all(|&v| v == 1.0));
    }
}
