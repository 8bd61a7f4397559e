//! Well-formedness checks on the generated problem.

use cgbench_comm::Transport;
use serde::Serialize;

use crate::error::Result;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// Outcome of the structural checks. Flags are group-wide: a failure on
/// any participant clears the flag everywhere.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemCheck {
    pub total_rows: u64,
    pub total_nonzeros: u64,
    pub row_counts_ok: bool,
    pub stencil_bounds_ok: bool,
    pub diagonal_ok: bool,
    pub symmetric_ok: bool,
    pub rhs_ok: bool,
}

impl ProblemCheck {
    pub fn passed(&self) -> bool {
        self.row_counts_ok
            && self.stencil_bounds_ok
            && self.diagonal_ok
            && self.symmetric_ok
            && self.rhs_ok
    }
}

/// Verify row counts, stencil footprints, diagonal positivity, symmetry
/// of every owned coefficient pair, and the row-sum property of b.
pub fn check_problem(
    a: &SparseMatrix,
    b: &Vector,
    xexact: &Vector,
    transport: &dyn Transport,
) -> Result<ProblemCheck> {
    let geometry = &a.geometry;

    let row_counts_ok = a.local_rows == geometry.local_rows()
        && a.total_rows == geometry.total_rows()
        && a.row_ptrs.len() == a.local_rows + 1;

    let mut stencil_bounds_ok = true;
    let mut diagonal_ok = true;
    let mut symmetric_ok = true;
    let mut rhs_ok = true;

    for row in 0..a.local_rows {
        let nnz = a.nnz_in_row(row);
        if !(8..=27).contains(&nnz) {
            stencil_bounds_ok = false;
        }
        if a.diagonal(row) <= 0.0 {
            diagonal_ok = false;
        }

        // b must equal A times the exact solution; xexact is all ones
        // on owned rows and halo slots alike, so no exchange is needed.
        let row_sum: f64 = a
            .row_entries(row)
            .map(|(col, v)| v * xexact.as_slice()[col])
            .sum();
        if (row_sum - b.as_slice()[row]).abs() > 1e-12 {
            rhs_ok = false;
        }

        // Owned coefficient pairs must match transposed.
        let row_gid = a.row_globals[row];
        for k in a.row_range(row) {
            let col = a.col_indices[k];
            if col >= a.local_rows || col == row {
                continue;
            }
            match transposed_value(a, col, row_gid) {
                Some(v) if v == a.values[k] => {}
                _ => symmetric_ok = false,
            }
        }
    }

    // A failure anywhere clears the flag everywhere, so every
    // participant reports the same verdict.
    let group_ok = |transport: &dyn Transport, local: bool| -> Result<bool> {
        Ok(transport.allreduce_sum_u64(u64::from(!local))? == 0)
    };
    let check = ProblemCheck {
        total_rows: a.total_rows,
        total_nonzeros: a.total_nonzeros,
        row_counts_ok: group_ok(transport, row_counts_ok)?,
        stencil_bounds_ok: group_ok(transport, stencil_bounds_ok)?,
        diagonal_ok: group_ok(transport, diagonal_ok)?,
        symmetric_ok: group_ok(transport, symmetric_ok)?,
        rhs_ok: group_ok(transport, rhs_ok)?,
    };
    if !check.passed() {
        log::warn!("problem check failed: {check:?}");
    }
    Ok(check)
}

/// Coefficient A[row][wanted_gid] found through the sorted global ids.
fn transposed_value(a: &SparseMatrix, row: usize, wanted_gid: u64) -> Option<f64> {
    let range = a.row_range(row);
    let cols = &a.global_cols[range.clone()];
    cols.binary_search(&wanted_gid)
        .ok()
        .map(|offset| a.values[range.start + offset])
}
