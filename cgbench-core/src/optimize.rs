//! Problem optimization: an independent-set schedule for SYMGS.
//!
//! The stencil graph eight-colors exactly by grid parity: rows whose
//! coordinates agree in (x&1, y&1, z&1) are never stencil neighbors,
//! because neighbors differ by at most one in every coordinate and by
//! one in at least one. Sweeping colors in ascending order (and
//! descending on the way back) turns the sequential Gauss-Seidel
//! recurrence into eight fully parallel passes per sweep.
//!
//! The schedule reorders the sweep only; matrix values and indices are
//! untouched, so the reference and optimized kernels read the same
//! operator and the smoother stays symmetric (the backward sweep visits
//! colors in the exact reverse of the forward sweep).

use rayon::prelude::*;

use crate::geometry::Geometry;
use crate::kernels::gauss_seidel_row;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// Parity classes for the colored sweep.
pub const NUM_COLORS: usize = 8;

/// Rows within a class above this count relax in parallel.
const PAR_CLASS_THRESHOLD: usize = 256;

/// Independent-set schedule: one row list per color.
#[derive(Debug, Clone)]
pub struct ColorSchedule {
    pub classes: Vec<Vec<usize>>,
}

impl ColorSchedule {
    /// Eight-coloring of the local box by global coordinate parity.
    pub fn by_parity(geometry: &Geometry) -> Self {
        let mut classes = vec![Vec::new(); NUM_COLORS];
        for row in 0..geometry.local_rows() {
            let (gx, gy, gz) = geometry.coords_of_local(row);
            let color = (gx & 1) | (gy & 1) << 1 | (gz & 1) << 2;
            classes[color as usize].push(row);
        }
        Self { classes }
    }
}

/// Install color schedules on every level of the hierarchy.
pub fn optimize_problem(a: &mut SparseMatrix) {
    let schedule = ColorSchedule::by_parity(&a.geometry);
    log::debug!(
        "colored {} rows into {} classes on level {}x{}x{}",
        a.local_rows,
        schedule.classes.iter().filter(|c| !c.is_empty()).count(),
        a.geometry.nx,
        a.geometry.ny,
        a.geometry.nz
    );
    a.coloring = Some(schedule);
    if let Some(mg) = &mut a.mg {
        optimize_problem(&mut mg.coarse);
    }
}

/// Color-scheduled forward and backward sweeps. Caller has already
/// refreshed the halo; like the reference sweep, boundary data stays
/// fixed for both sweeps.
pub fn colored_sweeps(a: &SparseMatrix, schedule: &ColorSchedule, rhs: &Vector, x: &mut Vector) {
    for class in &schedule.classes {
        relax_class(a, class, rhs, x);
    }
    for class in schedule.classes.iter().rev() {
        relax_class(a, class, rhs, x);
    }
}

fn relax_class(a: &SparseMatrix, rows: &[usize], rhs: &Vector, x: &mut Vector) {
    let bs = rhs.as_slice();
    if rows.len() >= PAR_CLASS_THRESHOLD {
        // Rows of one class never read each other, so relaxing against
        // the pre-class state equals the in-place update.
        let updates: Vec<f64> = {
            let xs = x.as_slice();
            rows.par_iter()
                .map(|&row| gauss_seidel_row(a, xs, bs, row))
                .collect()
        };
        let xs = x.as_mut_slice();
        for (&row, &value) in rows.iter().zip(&updates) {
            xs[row] = value;
        }
    } else {
        let xs = x.as_mut_slice();
        for &row in rows {
            xs[row] = gauss_seidel_row(a, xs, bs, row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryConfig};
    use crate::kernels::{spmv, symgs};
    use crate::problem;
    use cgbench_comm::SoloTransport;

    fn problem_8() -> problem::Problem {
        let geometry = Geometry::build(&GeometryConfig::uniform(8, 8, 8), 0, 1).unwrap();
        problem::generate(geometry, &SoloTransport).unwrap()
    }

    #[test]
    fn classes_partition_the_rows() {
        let p = problem_8();
        let schedule = ColorSchedule::by_parity(&p.a.geometry);
        let mut seen = vec![false; p.a.local_rows];
        for class in &schedule.classes {
            for &row in class {
                assert!(!seen[row]);
                seen[row] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
        // Uniform box splits evenly across the eight parities.
        for class in &schedule.classes {
            assert_eq!(class.len(), p.a.local_rows / NUM_COLORS);
        }
    }

    #[test]
    fn no_intra_class_adjacency() {
        let p = problem_8();
        let schedule = ColorSchedule::by_parity(&p.a.geometry);
        let mut color_of = vec![0usize; p.a.local_rows];
        for (color, class) in schedule.classes.iter().enumerate() {
            for &row in class {
                color_of[row] = color;
            }
        }
        for row in 0..p.a.local_rows {
            for (col, _) in p.a.row_entries(row) {
                if col != row && col < p.a.local_rows {
                    assert_ne!(color_of[row], color_of[col]);
                }
            }
        }
    }

    #[test]
    fn colored_sweep_is_a_valid_smoother() {
        let p = problem_8();
        let mut a = p.a;
        optimize_problem(&mut a);

        let mut x = Vector::zeros(a.local_rows, a.local_cols);
        let residual = |a: &SparseMatrix, x: &Vector| {
            let mut xc = x.clone();
            let mut ax = Vector::zeros(a.local_rows, a.local_rows);
            spmv(a, &mut xc, &mut ax, &SoloTransport).unwrap();
            p.b.owned()
                .iter()
                .zip(ax.owned())
                .map(|(bi, ai)| (bi - ai) * (bi - ai))
                .sum::<f64>()
                .sqrt()
        };

        let before = residual(&a, &x);
        symgs(&a, &p.b, &mut x, &SoloTransport).unwrap();
        let after = residual(&a, &x);
        assert!(after < 0.5 * before);

        // Exact solution stays fixed under the colored sweep too.
        let mut exact = p.xexact.clone();
        symgs(&a, &p.b, &mut exact, &SoloTransport).unwrap();
        for &v in exact.owned() {
            assert!((v - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn hierarchy_gets_schedules_on_every_level() {
        let geometry = Geometry::build(&GeometryConfig::uniform(16, 16, 16), 0, 1).unwrap();
        let mut a = problem::generate_matrix(geometry, &SoloTransport).unwrap();
        crate::multigrid::attach_hierarchy(&mut a, &SoloTransport).unwrap();
        optimize_problem(&mut a);
        for level in a.levels() {
            assert!(level.coloring.is_some());
        }
    }
}
