//! Distributed vector: owned rows first, halo slots after.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A vector over the local rows of a level, padded with halo slots that
/// mirror off-process values after an exchange.
#[derive(Debug, Clone)]
pub struct Vector {
    /// Owned values followed by halo values, contiguous.
    pub values: Array1<f64>,
    /// Number of owned rows; everything past this index is halo.
    pub local_len: usize,
}

impl Vector {
    /// Zero vector with `local_len` owned rows and `total_len - local_len`
    /// halo slots.
    pub fn zeros(local_len: usize, total_len: usize) -> Self {
        debug_assert!(total_len >= local_len);
        Self {
            values: Array1::zeros(total_len),
            local_len,
        }
    }

    /// Constant vector (halo slots included).
    pub fn from_elem(local_len: usize, total_len: usize, value: f64) -> Self {
        Self {
            values: Array1::from_elem(total_len, value),
            local_len,
        }
    }

    /// Seed-deterministic vector of values in (0, 1), used by the
    /// symmetry probe.
    pub fn random(local_len: usize, total_len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let values = Array1::from_iter((0..total_len).map(|_| rng.gen::<f64>()));
        Self { values, local_len }
    }

    /// Reset every entry to zero, halo included.
    pub fn set_zero(&mut self) {
        self.values.fill(0.0);
    }

    /// Owned portion as a slice.
    pub fn owned(&self) -> &[f64] {
        &self.values.as_slice().expect("vector is contiguous")[..self.local_len]
    }

    /// Full backing slice (owned + halo).
    pub fn as_slice(&self) -> &[f64] {
        self.values.as_slice().expect("vector is contiguous")
    }

    /// Full mutable backing slice (owned + halo).
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.values.as_slice_mut().expect("vector is contiguous")
    }

    /// Copy the owned portion of `src` into our owned portion.
    pub fn copy_owned_from(&mut self, src: &Vector) {
        debug_assert_eq!(self.local_len, src.local_len);
        self.as_mut_slice()[..src.local_len].copy_from_slice(src.owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halo_slots_follow_owned() {
        let v = Vector::zeros(4, 6);
        assert_eq!(v.owned().len(), 4);
        assert_eq!(v.as_slice().len(), 6);
    }

    #[test]
    fn random_is_seed_deterministic() {
        let a = Vector::random(8, 8, 17);
        let b = Vector::random(8, 8, 17);
        assert_eq!(a.as_slice(), b.as_slice());
        let c = Vector::random(8, 8, 18);
        assert_ne!(a.as_slice(), c.as_slice());
    }
}
