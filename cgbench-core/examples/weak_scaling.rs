//! Weak-scaling sweep over in-process participant counts.
//!
//! Keeps the local box fixed while the participant count grows, so the
//! global problem scales with the group. Prints one table row per
//! configuration.
//!
//! Usage:
//!   cargo run --release --example weak_scaling -- --n 16 --participants 1,2,4,8

use std::time::Instant;

use clap::Parser;

use cgbench_comm::{LocalCluster, Transport};
use cgbench_core::geometry::{Geometry, GeometryConfig};
use cgbench_core::{
    attach_hierarchy, cg, generate, optimize_problem, CgConfig, CgTiming, CgWorkspace,
    MgWorkspace,
};

#[derive(Parser, Debug)]
#[command(name = "weak_scaling")]
#[command(about = "CG weak-scaling sweep over participant counts")]
struct Args {
    /// Local box edge length (must be a multiple of 8).
    #[arg(short, long, default_value = "16")]
    n: usize,

    /// Participant counts to test (comma-separated).
    #[arg(short, long, default_value = "1,2,4,8")]
    participants: String,

    /// CG iterations per run.
    #[arg(long, default_value = "50")]
    iterations: usize,
}

fn run_group(n: usize, participants: usize, iterations: usize) {
    let cfg = GeometryConfig::uniform(n, n, n);

    let start = Instant::now();
    let results = LocalCluster::run(participants, |ep| {
        let geometry = Geometry::build(&cfg, ep.rank(), ep.size()).unwrap();
        let setup_start = Instant::now();
        let mut problem = generate(geometry, &ep).unwrap();
        attach_hierarchy(&mut problem.a, &ep).unwrap();
        optimize_problem(&mut problem.a);
        let mut ws = CgWorkspace::new(&problem.a);
        let mut mg_ws = MgWorkspace::new(&problem.a);
        let setup = setup_start.elapsed().as_secs_f64();

        let config = CgConfig {
            max_iterations: iterations,
            ..CgConfig::default()
        };
        let mut timing = CgTiming::default();
        let mut x = problem.x;
        let solution = cg(
            &problem.a,
            &problem.b,
            &mut x,
            &mut ws,
            &mut mg_ws,
            &config,
            &mut timing,
            &ep,
        )
        .unwrap();

        let rows = problem.a.total_rows;
        (rows, setup, timing.total, solution.normr / solution.normr0)
    });
    let wall = start.elapsed().as_secs_f64();

    let (rows, _, _, reduction) = results[0];
    let setup_max = results.iter().map(|r| r.1).fold(0.0, f64::max);
    let cg_max = results.iter().map(|r| r.2).fold(0.0, f64::max);

    println!(
        "{:>12} {:>12} {:>12.1} {:>12.1} {:>12.1} {:>14.3e}",
        participants,
        rows,
        setup_max * 1000.0,
        cg_max * 1000.0,
        wall * 1000.0,
        reduction
    );
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!(
        "\n=== CG weak scaling (local box {0}x{0}x{0}, {1} iterations) ===\n",
        args.n, args.iterations
    );
    println!(
        "{:>12} {:>12} {:>12} {:>12} {:>12} {:>14}",
        "Participants", "GlobalRows", "Setup(ms)", "CG(ms)", "Wall(ms)", "Reduction"
    );
    println!("{}", "-".repeat(80));

    let counts: Vec<usize> = args
        .participants
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    for participants in counts {
        run_group(args.n, participants, args.iterations);
    }
}
