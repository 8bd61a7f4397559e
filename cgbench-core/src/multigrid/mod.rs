//! Geometric multigrid hierarchy over the stencil operator.
//!
//! Four levels total. Each coarsening halves every dimension and keeps
//! the same 27-point structure, so the coarse operator is generated by
//! the same problem assembly on the coarsened geometry rather than by a
//! Galerkin product. Transfer is pure injection through the `f2c` map:
//! coarse point (ix,iy,iz) sits on fine point (2ix,2iy,2iz).

mod cycle;

pub use cycle::mg_preconditioner;

use cgbench_comm::Transport;

use crate::error::Result;
use crate::problem;
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// Depth of the hierarchy, counting the finest level.
pub const NUM_LEVELS: usize = 4;

/// Link from one level to the next coarser one.
#[derive(Debug)]
pub struct MgData {
    /// Fine local index of each coarse row, length = coarse rows.
    pub f2c: Vec<usize>,
    /// The coarse operator, itself carrying the rest of the chain.
    pub coarse: Box<SparseMatrix>,
    /// Smoother sweeps before descending.
    pub pre_smoother_steps: usize,
    /// Smoother sweeps after the correction.
    pub post_smoother_steps: usize,
}

/// Build the coarse chain under the finest operator.
pub fn attach_hierarchy(a: &mut SparseMatrix, transport: &dyn Transport) -> Result<()> {
    attach_levels(a, NUM_LEVELS - 1, transport)
}

fn attach_levels(a: &mut SparseMatrix, remaining: usize, transport: &dyn Transport) -> Result<()> {
    if remaining == 0 {
        return Ok(());
    }

    let coarse_geometry = a.geometry.coarsen();
    let fnx = a.geometry.nx;
    let fny = a.geometry.ny;
    let (cnx, cny, cnz) = (coarse_geometry.nx, coarse_geometry.ny, coarse_geometry.nz);

    let mut f2c = Vec::with_capacity(cnx * cny * cnz);
    for iz in 0..cnz {
        for iy in 0..cny {
            for ix in 0..cnx {
                f2c.push(2 * ix + 2 * iy * fnx + 2 * iz * fnx * fny);
            }
        }
    }

    let coarse = problem::generate_matrix(coarse_geometry, transport)?;
    let mut mg = Box::new(MgData {
        f2c,
        coarse: Box::new(coarse),
        pre_smoother_steps: 1,
        post_smoother_steps: 1,
    });
    attach_levels(&mut mg.coarse, remaining - 1, transport)?;
    a.mg = Some(mg);
    Ok(())
}

/// Scratch vectors for one fine/coarse transition.
#[derive(Debug)]
pub struct LevelScratch {
    /// A_f * x_f on the fine level.
    pub axf: Vector,
    /// Restricted residual, the coarse right-hand side.
    pub rc: Vector,
    /// Coarse correction.
    pub xc: Vector,
}

/// Per-level scratch for the V-cycle, allocated once and reused across
/// all CG iterations.
#[derive(Debug)]
pub struct MgWorkspace {
    pub levels: Vec<LevelScratch>,
}

impl MgWorkspace {
    /// Size scratch to the hierarchy hanging off `a`.
    pub fn new(a: &SparseMatrix) -> Self {
        let mut levels = Vec::new();
        let mut current = a;
        while let Some(mg) = &current.mg {
            levels.push(LevelScratch {
                axf: Vector::zeros(current.local_rows, current.local_rows),
                rc: Vector::zeros(mg.coarse.local_rows, mg.coarse.local_rows),
                xc: Vector::zeros(mg.coarse.local_rows, mg.coarse.local_cols),
            });
            current = &mg.coarse;
        }
        Self { levels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryConfig};
    use cgbench_comm::SoloTransport;

    fn hierarchy_16() -> SparseMatrix {
        let geometry = Geometry::build(&GeometryConfig::uniform(16, 16, 16), 0, 1).unwrap();
        let mut a = problem::generate_matrix(geometry, &SoloTransport).unwrap();
        attach_hierarchy(&mut a, &SoloTransport).unwrap();
        a
    }

    #[test]
    fn four_levels_each_an_eighth() {
        let a = hierarchy_16();
        let sizes: Vec<usize> = a.levels().iter().map(|m| m.local_rows).collect();
        assert_eq!(sizes, vec![4096, 512, 64, 8]);
        assert!(a.levels().last().unwrap().mg.is_none());
    }

    #[test]
    fn injection_map_hits_even_coordinates() {
        let a = hierarchy_16();
        let mg = a.mg.as_ref().unwrap();
        assert_eq!(mg.f2c.len(), mg.coarse.local_rows);
        assert_eq!(mg.pre_smoother_steps, 1);
        assert_eq!(mg.post_smoother_steps, 1);

        let coarse_geom = &mg.coarse.geometry;
        for (k, &fine) in mg.f2c.iter().enumerate() {
            let (cgx, cgy, cgz) = coarse_geom.coords_of_local(k);
            let expected = a
                .geometry
                .local_index_of(2 * cgx, 2 * cgy, 2 * cgz)
                .unwrap();
            assert_eq!(fine, expected);
        }

        // Injective: every coarse point owns a distinct fine point.
        let mut seen = mg.f2c.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), mg.f2c.len());
    }

    #[test]
    fn workspace_matches_hierarchy() {
        let a = hierarchy_16();
        let ws = MgWorkspace::new(&a);
        assert_eq!(ws.levels.len(), NUM_LEVELS - 1);
        assert_eq!(ws.levels[0].axf.local_len, 4096);
        assert_eq!(ws.levels[0].rc.local_len, 512);
        assert_eq!(ws.levels[2].xc.local_len, 8);
    }
}
