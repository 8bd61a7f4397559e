//! Vector triad w = alpha*x + beta*y.

use rayon::prelude::*;

use super::PAR_THRESHOLD;
use crate::vector::Vector;

/// w = alpha*x + beta*y over the first `n` entries.
///
/// The unit-coefficient cases skip a multiply each; every CG iteration
/// hits them for the x, r and p updates.
pub fn waxpby(n: usize, alpha: f64, x: &Vector, beta: f64, y: &Vector, w: &mut Vector) {
    let xs = &x.as_slice()[..n];
    let ys = &y.as_slice()[..n];
    let ws = &mut w.as_mut_slice()[..n];

    if n >= PAR_THRESHOLD {
        if alpha == 1.0 {
            ws.par_iter_mut()
                .zip(xs.par_iter().zip(ys))
                .for_each(|(w, (&x, &y))| *w = x + beta * y);
        } else if beta == 1.0 {
            ws.par_iter_mut()
                .zip(xs.par_iter().zip(ys))
                .for_each(|(w, (&x, &y))| *w = alpha * x + y);
        } else {
            ws.par_iter_mut()
                .zip(xs.par_iter().zip(ys))
                .for_each(|(w, (&x, &y))| *w = alpha * x + beta * y);
        }
    } else if alpha == 1.0 {
        for i in 0..n {
            ws[i] = xs[i] + beta * ys[i];
        }
    } else if beta == 1.0 {
        for i in 0..n {
            ws[i] = alpha * xs[i] + ys[i];
        }
    } else {
        for i in 0..n {
            ws[i] = alpha * xs[i] + beta * ys[i];
        }
    }
}

/// In-place triad y = alpha*x + beta*y.
///
/// The CG updates write one of their operands (x += alpha*p and
/// friends); this is the same triad with the output folded onto y.
pub fn axpby(n: usize, alpha: f64, x: &Vector, beta: f64, y: &mut Vector) {
    let xs = &x.as_slice()[..n];
    let ys = &mut y.as_mut_slice()[..n];

    if n >= PAR_THRESHOLD {
        if beta == 1.0 {
            ys.par_iter_mut()
                .zip(xs)
                .for_each(|(y, &x)| *y += alpha * x);
        } else {
            ys.par_iter_mut()
                .zip(xs)
                .for_each(|(y, &x)| *y = alpha * x + beta * *y);
        }
    } else if beta == 1.0 {
        for i in 0..n {
            ys[i] += alpha * xs[i];
        }
    } else {
        for i in 0..n {
            ys[i] = alpha * xs[i] + beta * ys[i];
        }
    }
}
