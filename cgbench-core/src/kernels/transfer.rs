//! Grid transfer by fine-to-coarse injection.

use crate::vector::Vector;

/// Restrict the fine residual: rc[k] = (rf - axf)[f2c[k]].
///
/// `axf` holds A_f * x_f from the smoothed fine iterate; the coarse
/// right-hand side is the fine residual sampled at the injection points.
pub fn restrict(f2c: &[usize], rf: &Vector, axf: &Vector, rc: &mut Vector) {
    let rfs = rf.as_slice();
    let axfs = axf.as_slice();
    let rcs = &mut rc.as_mut_slice()[..f2c.len()];
    for (slot, &fine) in rcs.iter_mut().zip(f2c) {
        *slot = rfs[fine] - axfs[fine];
    }
}

/// Prolongate the coarse correction: xf[f2c[k]] += xc[k].
pub fn prolongate(f2c: &[usize], xf: &mut Vector, xc: &Vector) {
    let xcs = xc.as_slice();
    let xfs = xf.as_mut_slice();
    for (k, &fine) in f2c.iter().enumerate() {
        xfs[fine] += xcs[k];
    }
}
