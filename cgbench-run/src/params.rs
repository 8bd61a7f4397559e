//! Run parameters: command line, options file, and the rank-0 broadcast.
//!
//! Dimensions can arrive three ways, in priority order: `--nx`-style
//! flags, legacy positional `nx ny nz [rt]`, or the options file when
//! the command line names no dimensions at all. Rank 0 does the file
//! I/O and broadcasts the ten-integer parameter vector to the group.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cgbench_comm::Transport;
use clap::Parser;
use serde::Serialize;

use cgbench_core::GeometryConfig;

/// Distributed-memory CG benchmark on a synthetic 27-point stencil.
#[derive(Debug, Parser)]
#[command(name = "cgbench", version, about)]
pub struct Cli {
    /// Local grid points in x.
    #[arg(long)]
    pub nx: Option<usize>,
    /// Local grid points in y.
    #[arg(long)]
    pub ny: Option<usize>,
    /// Local grid points in z.
    #[arg(long)]
    pub nz: Option<usize>,
    /// Target duration of the timed phase in seconds.
    #[arg(long)]
    pub rt: Option<usize>,
    /// Thickness of the inflated z-slab (pencil mode).
    #[arg(long)]
    pub pz: Option<usize>,
    /// Local depth outside the slab.
    #[arg(long)]
    pub zl: Option<usize>,
    /// Local depth inside the slab.
    #[arg(long)]
    pub zu: Option<usize>,
    /// Explicit process grid in x.
    #[arg(long)]
    pub npx: Option<usize>,
    /// Explicit process grid in y.
    #[arg(long)]
    pub npy: Option<usize>,
    /// Explicit process grid in z.
    #[arg(long)]
    pub npz: Option<usize>,
    /// Legacy shorthand: nx ny nz [rt].
    #[arg(value_name = "DIM")]
    pub positional: Vec<usize>,
    /// Participants to run in-process (threads).
    #[arg(long, default_value_t = 1)]
    pub participants: usize,
    /// Options file consulted when the command line has no dimensions.
    #[arg(long, default_value = "hpcg.dat")]
    pub options_file: PathBuf,
    /// Where to write the run report.
    #[arg(long, default_value = "cgbench_report.json")]
    pub report: PathBuf,
}

/// The resolved ten-integer parameter vector, identical on every
/// participant after the broadcast.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Params {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub rt: usize,
    pub pz: usize,
    pub zl: usize,
    pub zu: usize,
    pub npx: usize,
    pub npy: usize,
    pub npz: usize,
}

impl Params {
    fn to_vector(self) -> Vec<i64> {
        vec![
            self.nx as i64,
            self.ny as i64,
            self.nz as i64,
            self.rt as i64,
            self.pz as i64,
            self.zl as i64,
            self.zu as i64,
            self.npx as i64,
            self.npy as i64,
            self.npz as i64,
        ]
    }

    fn from_vector(v: &[i64]) -> Self {
        Self {
            nx: v[0] as usize,
            ny: v[1] as usize,
            nz: v[2] as usize,
            rt: v[3] as usize,
            pz: v[4] as usize,
            zl: v[5] as usize,
            zu: v[6] as usize,
            npx: v[7] as usize,
            npy: v[8] as usize,
            npz: v[9] as usize,
        }
    }

    /// Geometry configuration for this parameter set.
    pub fn geometry_config(&self) -> GeometryConfig {
        let mut cfg = GeometryConfig::uniform(self.nx, self.ny, self.nz);
        cfg.npx = self.npx;
        cfg.npy = self.npy;
        cfg.npz = self.npz;
        cfg.pz = self.pz;
        cfg.zl = self.zl;
        cfg.zu = self.zu;
        cfg
    }
}

/// Resolve parameters on rank 0 and broadcast them to the group.
pub fn resolve(cli: &Cli, transport: &dyn Transport) -> Result<Params> {
    let mut vector = if transport.rank() == 0 {
        resolve_on_root(cli)?.to_vector()
    } else {
        vec![0i64; 10]
    };
    transport
        .broadcast_i64(0, &mut vector)
        .context("parameter broadcast failed")?;
    Ok(Params::from_vector(&vector))
}

fn resolve_on_root(cli: &Cli) -> Result<Params> {
    let mut dims = [
        cli.positional.first().copied().unwrap_or(0),
        cli.positional.get(1).copied().unwrap_or(0),
        cli.positional.get(2).copied().unwrap_or(0),
    ];
    let mut rt = cli.positional.get(3).copied().unwrap_or(0);

    if let Some(nx) = cli.nx {
        dims[0] = nx;
    }
    if let Some(ny) = cli.ny {
        dims[1] = ny;
    }
    if let Some(nz) = cli.nz {
        dims[2] = nz;
    }
    if let Some(flag_rt) = cli.rt {
        rt = flag_rt;
    }

    if dims.iter().all(|&d| d == 0) {
        let rt_already_set = rt > 0;
        match read_options_file(&cli.options_file, rt_already_set) {
            Ok((file_dims, file_rt)) => {
                dims = file_dims;
                if let Some(file_rt) = file_rt {
                    rt = file_rt;
                }
            }
            Err(err) => {
                log::warn!(
                    "no dimensions given and {} unreadable ({err}); using 16^3",
                    cli.options_file.display()
                );
            }
        }
    }

    snap_dims(&mut dims);

    Ok(Params {
        nx: dims[0],
        ny: dims[1],
        nz: dims[2],
        rt,
        pz: cli.pz.unwrap_or(0),
        zl: cli.zl.unwrap_or(0),
        zu: cli.zu.unwrap_or(0),
        npx: cli.npx.unwrap_or(0),
        npy: cli.npy.unwrap_or(0),
        npz: cli.npz.unwrap_or(0),
    })
}

/// Any dimension under 16 becomes the largest of the three, floored at 16.
fn snap_dims(dims: &mut [usize; 3]) {
    for i in 0..3 {
        if dims[i] < 16 {
            let largest = dims.iter().copied().max().unwrap_or(0);
            dims[i] = largest.max(16);
        }
    }
}

/// Options file layout: two header lines ignored, third line `nx ny nz`,
/// fourth line the runtime in seconds. The fourth line is skipped when
/// the runtime was already given on the command line.
fn read_options_file(path: &Path, rt_already_set: bool) -> Result<([usize; 3], Option<usize>)> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading options file {}", path.display()))?;
    let mut lines = contents.lines().skip(2);

    let dims_line = lines.next().context("options file has no dimension line")?;
    let parsed: Vec<usize> = dims_line
        .split_whitespace()
        .take(3)
        .map(|tok| tok.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .context("options file dimension line is not three integers")?;
    anyhow::ensure!(parsed.len() == 3, "options file dimension line is short");
    let dims = [parsed[0], parsed[1], parsed[2]];

    let rt = if rt_already_set {
        None
    } else {
        lines
            .next()
            .and_then(|line| line.split_whitespace().next())
            .and_then(|tok| tok.parse::<usize>().ok())
    };

    Ok((dims, rt))
}
