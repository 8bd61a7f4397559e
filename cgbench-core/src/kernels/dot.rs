//! Inner product with deterministic reduction.

use cgbench_comm::Transport;
use rayon::prelude::*;

use super::PAR_THRESHOLD;
use crate::error::Result;
use crate::vector::Vector;

/// Entries summed per partial; partials are then combined in index
/// order, so the local sum is independent of the thread count.
const CHUNK: usize = 512;

/// x'y over the first `n` entries, reduced across the group.
///
/// Local summation folds fixed-size chunk partials in chunk order and
/// the cross-participant reduction combines in rank order, so repeated
/// runs of the same configuration produce bitwise-identical results.
pub fn dot(n: usize, x: &Vector, y: &Vector, transport: &dyn Transport) -> Result<f64> {
    let xs = &x.as_slice()[..n];
    let ys = &y.as_slice()[..n];

    let local = if n >= PAR_THRESHOLD {
        let partials: Vec<f64> = xs
            .par_chunks(CHUNK)
            .zip(ys.par_chunks(CHUNK))
            .map(|(cx, cy)| chunk_dot(cx, cy))
            .collect();
        partials.iter().sum()
    } else {
        xs.chunks(CHUNK)
            .zip(ys.chunks(CHUNK))
            .map(|(cx, cy)| chunk_dot(cx, cy))
            .sum()
    };

    Ok(transport.allreduce_sum(local)?)
}

#[inline]
fn chunk_dot(xs: &[f64], ys: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (xi, yi) in xs.iter().zip(ys) {
        sum += xi * yi;
    }
    sum
}
