//! Repeatability of the benchmark's final residual norms.
//!
//! Every timed CG set solves the identical system from the identical
//! start, so the final norms may differ only through reduction rounding.
//! On one participant the reduction is bitwise repeatable and the spread
//! must be zero; across participants the rank-ordered reduction keeps
//! the relative spread at the 1e-12 level.

use serde::Serialize;

/// Acceptable relative standard deviation of the final norms.
const RELATIVE_SPREAD: f64 = 1.0e-12;

/// Sample statistics over the timed runs.
#[derive(Debug, Clone, Serialize)]
pub struct NormsCheck {
    pub samples: usize,
    pub mean: f64,
    pub variance: f64,
    pub passed: bool,
}

/// Check the spread of the final residual norms of the timed CG sets.
pub fn test_norms(final_norms: &[f64]) -> NormsCheck {
    let samples = final_norms.len();
    if samples == 0 {
        return NormsCheck {
            samples,
            mean: 0.0,
            variance: 0.0,
            passed: false,
        };
    }

    let mean = final_norms.iter().sum::<f64>() / samples as f64;
    let variance = final_norms
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / samples as f64;

    let allowed = (RELATIVE_SPREAD * mean) * (RELATIVE_SPREAD * mean);
    let passed = variance <= allowed;
    if !passed {
        log::warn!(
            "norms check failed: variance {variance:.3e} over mean {mean:.3e} ({samples} samples)"
        );
    }

    NormsCheck {
        samples,
        mean,
        variance,
        passed,
    }
}
