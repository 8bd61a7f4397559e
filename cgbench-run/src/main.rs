//! Benchmark driver.
//!
//! Resolves parameters, builds the problem and its hierarchy, runs the
//! validators, executes the timed CG sets, and writes the report from
//! rank 0. With `--participants N` the whole pipeline runs N-way over
//! the in-process cluster; otherwise it runs single-participant.
//!
//! Exit code is zero whenever the run completes, conformant or not;
//! setup failures (bad parameters, impossible process grids,
//! communication errors) exit nonzero before CG starts.

mod params;
mod report;

use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use cgbench_comm::{LocalCluster, SoloTransport, Transport};
use cgbench_core::validate::{
    check_problem, test_convergence, test_norms, test_symmetry, ValidationSummary,
};
use cgbench_core::{
    attach_hierarchy, cg, generate, optimize_problem, CgConfig, CgSolution, CgTiming,
    CgWorkspace, Geometry, MgWorkspace, SparseMatrix, Vector,
};

use params::Cli;
use report::{
    count_flops, level_summaries, write_report, CgPhase, GeometrySummary, ReferencePhase,
    RunReport, TimingSummary,
};

/// Seed of the symmetry probe; fixed so reruns probe the same vectors.
const SYMMETRY_SEED: u64 = 9;
/// Iteration budget of the reference run.
const CG_ITERATIONS: usize = 50;
/// Optimized sets stop at the reference reduction; the cap only guards
/// against a substitution that fails to converge at all.
const OPTIMIZED_ITERATION_CAP: usize = 3 * CG_ITERATIONS;
/// Upper bound on timed sets regardless of the requested runtime.
const MAX_SETS: usize = 500;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.participants <= 1 {
        run_participant(&SoloTransport, &cli)
    } else {
        let results = LocalCluster::run(cli.participants, |ep| run_participant(&ep, &cli));
        results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(())
    }
}

fn run_participant(transport: &dyn Transport, cli: &Cli) -> Result<()> {
    let run_params = params::resolve(cli, transport)?;

    let setup_start = Instant::now();
    let geometry = Geometry::build(
        &run_params.geometry_config(),
        transport.rank(),
        transport.size(),
    )?;
    let geometry_summary = GeometrySummary::from_geometry(&geometry);

    let mut problem = generate(geometry, transport)?;
    attach_hierarchy(&mut problem.a, transport)?;

    let mut ws = CgWorkspace::new(&problem.a);
    let mut mg_ws = MgWorkspace::new(&problem.a);
    let setup_seconds = setup_start.elapsed().as_secs_f64();
    log::info!(
        "setup finished in {setup_seconds:.2}s on rank {}",
        transport.rank()
    );

    let mut validation = ValidationSummary::default();
    validation.problem = Some(check_problem(
        &problem.a,
        &problem.b,
        &problem.xexact,
        transport,
    )?);

    // Reference phase: one full-budget run with the reference kernels.
    // Its achieved reduction becomes the quality target the optimized
    // sets must reach before their time counts.
    let reference_config = CgConfig {
        max_iterations: CG_ITERATIONS,
        tolerance: 0.0,
        preconditioned: true,
        print_interval: 0,
    };
    let mut reference_timing = CgTiming::default();
    let reference_solution = run_set(
        &problem.a,
        &problem.b,
        &mut ws,
        &mut mg_ws,
        &reference_config,
        &mut reference_timing,
        transport,
    )?;
    let reference_reduction = reference_solution.normr / reference_solution.normr0;
    log::info!("reference run: scaled residual {reference_reduction:.3e} after {CG_ITERATIONS} iterations");

    // Optimized phase: install the color schedules, re-validate the
    // operator that will actually be timed, then run the sets.
    optimize_problem(&mut problem.a);
    validation.symmetry = Some(test_symmetry(
        &problem.a,
        &mut mg_ws,
        SYMMETRY_SEED,
        transport,
    )?);
    validation.convergence = Some(test_convergence(&mut problem.a, &problem.b, transport)?);

    // The first set doubles as the probe that sizes the run; the group
    // agrees on the set count through a max-reduction so every
    // participant executes the same number of sets.
    // Small problems can drive the reference run to its rounding
    // plateau, which a reordered smoother cannot reliably cross; the
    // floor keeps the target meaningful there.
    let optimized_config = CgConfig {
        max_iterations: OPTIMIZED_ITERATION_CAP,
        tolerance: reference_reduction.max(1e-14),
        preconditioned: true,
        print_interval: 0,
    };
    let mut timing = CgTiming::default();
    let mut final_norms = Vec::new();
    let mut set_iterations = Vec::new();
    let mut all_sets_converged = true;

    let probe_start = Instant::now();
    let mut solution = run_set(
        &problem.a,
        &problem.b,
        &mut ws,
        &mut mg_ws,
        &optimized_config,
        &mut timing,
        transport,
    )?;
    let set_seconds = transport.allreduce_max(probe_start.elapsed().as_secs_f64())?;
    final_norms.push(solution.normr);
    set_iterations.push(solution.iterations);
    all_sets_converged &= solution.converged;

    let sets = ((run_params.rt as f64 / set_seconds.max(1e-9)).ceil() as usize).clamp(1, MAX_SETS);
    log::info!(
        "one optimized set takes {set_seconds:.2}s; running {sets} sets for rt={}s",
        run_params.rt
    );
    for _ in 1..sets {
        solution = run_set(
            &problem.a,
            &problem.b,
            &mut ws,
            &mut mg_ws,
            &optimized_config,
            &mut timing,
            transport,
        )?;
        final_norms.push(solution.normr);
        set_iterations.push(solution.iterations);
        all_sets_converged &= solution.converged;
    }

    validation.norms = Some(test_norms(&final_norms));
    let conformant = validation.conformant() && all_sets_converged;
    let cg_seconds = transport.allreduce_max(timing.total)?;
    let levels = level_summaries(&problem.a, transport)?;

    if transport.rank() == 0 {
        let total_iterations: u64 = set_iterations.iter().map(|&i| i as u64).sum();
        let flops = count_flops(&levels, total_iterations, sets as u64);
        let gflops = flops.total / cg_seconds.max(1e-9) / 1.0e9;

        let run_report = RunReport {
            benchmark: "cgbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            parameters: run_params,
            geometry: geometry_summary,
            levels,
            validation,
            conformant,
            reference: ReferencePhase {
                iterations: reference_solution.iterations,
                reduction: reference_reduction,
            },
            cg: CgPhase {
                sets,
                iterations_per_set: set_iterations,
                total_iterations,
                all_sets_converged,
                final_scaled_residual: solution.normr / solution.normr0,
                residual_trace: solution.residual_trace.clone(),
            },
            timing: TimingSummary {
                setup_seconds,
                reference: reference_timing,
                optimized: timing,
            },
            flops,
            gflops,
        };
        write_report(&cli.report, &run_report)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_set(
    a: &SparseMatrix,
    b: &Vector,
    ws: &mut CgWorkspace,
    mg_ws: &mut MgWorkspace,
    config: &CgConfig,
    timing: &mut CgTiming,
    transport: &dyn Transport,
) -> Result<CgSolution> {
    let mut x = Vector::zeros(a.local_rows, a.local_cols);
    Ok(cg(a, b, &mut x, ws, mg_ws, config, timing, transport)?)
}
