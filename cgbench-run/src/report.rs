//! The machine-readable run report and its floating-point accounting.
//!
//! Rank 0 serializes one JSON document per run: geometry, per-level
//! problem sizes, validation outcomes, phase timings, the residual trace
//! of the last timed set, and the figure of merit in GFLOP/s computed
//! from counted operations over measured CG time.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cgbench_comm::Transport;
use serde::Serialize;

use cgbench_core::validate::ValidationSummary;
use cgbench_core::{CgTiming, Geometry, SparseMatrix};

use crate::params::Params;

/// Shape of the run, echoed back for reproducibility.
#[derive(Debug, Clone, Serialize)]
pub struct GeometrySummary {
    pub participants: usize,
    pub process_grid: [usize; 3],
    pub local_dims: [usize; 3],
    pub global_dims: [u64; 3],
}

impl GeometrySummary {
    pub fn from_geometry(g: &Geometry) -> Self {
        Self {
            participants: g.size,
            process_grid: [g.npx, g.npy, g.npz],
            local_dims: [g.nx, g.ny, g.nz],
            global_dims: [g.gnx, g.gny, g.gnz],
        }
    }
}

/// Global size of one hierarchy level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    pub rows: u64,
    pub nonzeros: u64,
    /// Values crossing participant boundaries per halo exchange.
    pub halo_values: u64,
}

/// Per-level totals, finest first. Collective: every participant must
/// call this, because the halo volumes are summed across the group.
pub fn level_summaries(
    a: &SparseMatrix,
    transport: &dyn Transport,
) -> Result<Vec<LevelSummary>> {
    a.levels()
        .iter()
        .map(|level| {
            let local_halo = level.halo.as_ref().map_or(0, |plan| plan.total_recv());
            Ok(LevelSummary {
                rows: level.total_rows,
                nonzeros: level.total_nonzeros,
                halo_values: transport.allreduce_sum_u64(local_halo as u64)?,
            })
        })
        .collect()
}

/// Counted floating-point work, split by phase.
#[derive(Debug, Clone, Serialize)]
pub struct FlopSummary {
    pub dot: f64,
    pub waxpby: f64,
    pub spmv: f64,
    pub precond: f64,
    pub total: f64,
}

/// Operation counts for `total_iterations` CG iterations spread over
/// `sets` runs.
///
/// Per set: one residual SPMV, two DOTs, one WAXPBY and one
/// preconditioner application before the loop. Per iteration: one SPMV,
/// three DOTs, three WAXPBYs, one preconditioner application. A DOT is
/// 2n flops, a WAXPBY 3n, an SPMV 2*nnz, a symmetric smoother sweep
/// 4*nnz at its level; injection transfers are not counted.
pub fn count_flops(levels: &[LevelSummary], total_iterations: u64, sets: u64) -> FlopSummary {
    let n = levels[0].rows as f64;
    let nnz = levels[0].nonzeros as f64;

    let dot = (3 * total_iterations + 2 * sets) as f64 * 2.0 * n;
    let waxpby = (3 * total_iterations + sets) as f64 * 3.0 * n;
    let spmv = (total_iterations + sets) as f64 * 2.0 * nnz;

    let mut per_vcycle = 0.0;
    for (depth, level) in levels.iter().enumerate() {
        let lnnz = level.nonzeros as f64;
        if depth + 1 < levels.len() {
            // Pre- and post-smooth plus the residual SPMV.
            per_vcycle += 2.0 * 4.0 * lnnz + 2.0 * lnnz;
        } else {
            per_vcycle += 4.0 * lnnz;
        }
    }
    let precond = (total_iterations + sets) as f64 * per_vcycle;

    FlopSummary {
        dot,
        waxpby,
        spmv,
        precond,
        total: dot + waxpby + spmv + precond,
    }
}

/// Outcome of the reference run that fixes the quality target.
#[derive(Debug, Clone, Serialize)]
pub struct ReferencePhase {
    pub iterations: usize,
    /// Scaled residual the optimized sets must reach.
    pub reduction: f64,
}

/// Outcome of the timed optimized phase.
#[derive(Debug, Clone, Serialize)]
pub struct CgPhase {
    pub sets: usize,
    /// Iterations of each set; identical runs produce identical counts.
    pub iterations_per_set: Vec<usize>,
    pub total_iterations: u64,
    /// Every set reached the reference reduction within its budget.
    pub all_sets_converged: bool,
    pub final_scaled_residual: f64,
    /// ||r|| after every iteration of the last set.
    pub residual_trace: Vec<f64>,
}

/// Wall-clock accounting.
#[derive(Debug, Clone, Serialize)]
pub struct TimingSummary {
    pub setup_seconds: f64,
    pub reference: CgTiming,
    pub optimized: CgTiming,
}

/// The full document rank 0 writes.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub benchmark: String,
    pub version: String,
    pub parameters: Params,
    pub geometry: GeometrySummary,
    pub levels: Vec<LevelSummary>,
    pub validation: ValidationSummary,
    pub conformant: bool,
    pub reference: ReferencePhase,
    pub cg: CgPhase,
    pub timing: TimingSummary,
    pub flops: FlopSummary,
    pub gflops: f64,
}

/// Serialize the report and log the headline numbers.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing run report")?;
    fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;

    log::info!(
        "{} {}: {} participants, global {}x{}x{}",
        report.benchmark,
        report.version,
        report.geometry.participants,
        report.geometry.global_dims[0],
        report.geometry.global_dims[1],
        report.geometry.global_dims[2],
    );
    log::info!(
        "{} CG sets, {} iterations total, final scaled residual {:.3e}",
        report.cg.sets,
        report.cg.total_iterations,
        report.cg.final_scaled_residual
    );
    log::info!(
        "figure of merit: {:.3} GFLOP/s ({})",
        report.gflops,
        if report.conformant {
            "conformant"
        } else {
            "NON-CONFORMANT"
        }
    );
    Ok(())
}
