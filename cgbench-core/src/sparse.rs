//! Distributed sparse matrix in compressed row storage.
//!
//! Rows are the grid points this participant owns. Column indices are
//! local: owned columns map to local rows, off-process columns map into
//! the halo range `local_rows..local_cols` once the halo plan exists.
//! Global column ids are kept alongside for halo setup and the
//! well-formedness checks.

use crate::geometry::Geometry;
use crate::halo::HaloPlan;
use crate::multigrid::MgData;
use crate::optimize::ColorSchedule;

/// Placeholder local index for a column whose halo slot has not been
/// assigned yet.
pub const UNMAPPED: usize = usize::MAX;

/// One level's sparse operator, with its halo plan and the link to the
/// next coarser level.
#[derive(Debug)]
pub struct SparseMatrix {
    /// Partitioning this operator was generated from.
    pub geometry: Geometry,
    /// Owned rows.
    pub local_rows: usize,
    /// Owned rows plus distinct off-process columns.
    pub local_cols: usize,
    /// Rows summed over all participants.
    pub total_rows: u64,
    /// Nonzeros summed over all participants.
    pub total_nonzeros: u64,
    /// Row start offsets into `values`/`col_indices`, length `local_rows + 1`.
    pub row_ptrs: Vec<usize>,
    /// Local column index per nonzero.
    pub col_indices: Vec<usize>,
    /// Coefficient per nonzero.
    pub values: Vec<f64>,
    /// Offset of each row's diagonal entry in `values`.
    pub diag_ptrs: Vec<usize>,
    /// Global column id per nonzero.
    pub global_cols: Vec<u64>,
    /// Global row id per owned row.
    pub row_globals: Vec<u64>,
    /// Boundary-exchange plan; `None` on single-participant runs.
    pub halo: Option<HaloPlan>,
    /// Next coarser level; `None` at the coarsest.
    pub mg: Option<Box<MgData>>,
    /// Independent-set schedule installed by problem optimization.
    pub coloring: Option<ColorSchedule>,
}

impl SparseMatrix {
    /// Nonzeros stored on this participant.
    pub fn local_nonzeros(&self) -> usize {
        self.values.len()
    }

    /// Range of nonzero offsets belonging to `row`.
    pub fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Stored entries of `row` as (local column, coefficient) pairs.
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Number of stored entries in `row`.
    pub fn nnz_in_row(&self, row: usize) -> usize {
        self.row_ptrs[row + 1] - self.row_ptrs[row]
    }

    /// Diagonal coefficient of `row`.
    pub fn diagonal(&self, row: usize) -> f64 {
        self.values[self.diag_ptrs[row]]
    }

    /// Copy of the diagonal, used to save and restore it around the
    /// convergence probe.
    pub fn extract_diagonal(&self) -> Vec<f64> {
        self.diag_ptrs.iter().map(|&p| self.values[p]).collect()
    }

    /// Overwrite the diagonal in place.
    pub fn replace_diagonal(&mut self, diagonal: &[f64]) {
        debug_assert_eq!(diagonal.len(), self.local_rows);
        for (row, &value) in diagonal.iter().enumerate() {
            self.values[self.diag_ptrs[row]] = value;
        }
    }

    /// Walk the multigrid chain, finest first.
    pub fn levels(&self) -> Vec<&SparseMatrix> {
        let mut levels = vec![self];
        let mut current = self;
        while let Some(mg) = &current.mg {
            levels.push(&mg.coarse);
            current = &mg.coarse;
        }
        levels
    }
}
