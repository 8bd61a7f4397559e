//! The V-cycle preconditioner z = M^{-1} r.

use cgbench_comm::Transport;

use super::{LevelScratch, MgWorkspace};
use crate::error::Result;
use crate::kernels::{prolongate, restrict, spmv, symgs};
use crate::sparse::SparseMatrix;
use crate::vector::Vector;

/// Apply one V-cycle of the hierarchy to `r`, writing the result into
/// `z`. `z` is zeroed at entry, so the cycle computes a correction from
/// scratch every time it is used as a preconditioner.
pub fn mg_preconditioner(
    a: &SparseMatrix,
    r: &Vector,
    z: &mut Vector,
    workspace: &mut MgWorkspace,
    transport: &dyn Transport,
) -> Result<()> {
    z.set_zero();
    v_cycle(a, r, z, &mut workspace.levels, transport)
}

fn v_cycle(
    a: &SparseMatrix,
    r: &Vector,
    x: &mut Vector,
    scratch: &mut [LevelScratch],
    transport: &dyn Transport,
) -> Result<()> {
    let Some(mg) = &a.mg else {
        // Coarsest level: a single smoother application stands in for
        // the exact solve.
        return symgs(a, r, x, transport);
    };

    let (level, rest) = scratch
        .split_first_mut()
        .expect("workspace shallower than hierarchy");

    for _ in 0..mg.pre_smoother_steps {
        symgs(a, r, x, transport)?;
    }

    spmv(a, x, &mut level.axf, transport)?;
    restrict(&mg.f2c, r, &level.axf, &mut level.rc);

    level.xc.set_zero();
    v_cycle(&mg.coarse, &level.rc, &mut level.xc, rest, transport)?;
    prolongate(&mg.f2c, x, &level.xc);

    for _ in 0..mg.post_smoother_steps {
        symgs(a, r, x, transport)?;
    }
    Ok(())
}
