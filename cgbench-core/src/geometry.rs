//! Partitioning of the global grid among participants.
//!
//! Every participant owns one box of `nx * ny * nz` grid points inside a
//! `npx * npy * npz` process grid. The process grid is either given
//! explicitly or chosen from the divisor triples of the participant
//! count by minimizing the total cross-boundary face area
//! `nx*ny*npz + nx*nz*npy + ny*nz*npx`. An optional pencil mode assigns
//! a different local depth to a contiguous z-slab of the process grid.

use serde::Serialize;

use crate::error::{BenchError, Result};

/// Requested partitioning, before it is resolved against the group.
#[derive(Debug, Clone)]
pub struct GeometryConfig {
    /// Local box dimensions.
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Explicit process grid; zero means choose automatically.
    pub npx: usize,
    pub npy: usize,
    pub npz: usize,
    /// Thickness of the inflated z-slab; zero disables pencil mode.
    pub pz: usize,
    /// Local depth outside the slab.
    pub zl: usize,
    /// Local depth inside the slab.
    pub zu: usize,
    /// Largest tolerated ratio between the longest and shortest global
    /// box side.
    pub max_aspect: f64,
}

impl GeometryConfig {
    /// Uniform configuration with automatic process-grid selection.
    pub fn uniform(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            nx,
            ny,
            nz,
            npx: 0,
            npy: 0,
            npz: 0,
            pz: 0,
            zl: 0,
            zu: 0,
            max_aspect: 64.0,
        }
    }
}

/// Resolved partitioning for one participant.
#[derive(Debug, Clone, Serialize)]
pub struct Geometry {
    pub rank: usize,
    pub size: usize,
    /// Local box dimensions (depth already pencil-adjusted).
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Process grid.
    pub npx: usize,
    pub npy: usize,
    pub npz: usize,
    /// This participant's coordinate in the process grid.
    pub ipx: usize,
    pub ipy: usize,
    pub ipz: usize,
    /// Global grid dimensions.
    pub gnx: u64,
    pub gny: u64,
    pub gnz: u64,
    /// Global coordinate of the local box origin.
    pub base_x: u64,
    pub base_y: u64,
    pub base_z: u64,
    /// Local depth of each z-plane of the process grid.
    z_depths: Vec<usize>,
    /// Global z coordinate where each process plane starts.
    z_starts: Vec<u64>,
}

impl Geometry {
    /// Resolve the configuration for participant `rank` of `size`.
    pub fn build(cfg: &GeometryConfig, rank: usize, size: usize) -> Result<Self> {
        check_dims(cfg.nx, cfg.ny, cfg.nz)?;

        let (npx, npy, npz) = if cfg.npx > 0 || cfg.npy > 0 || cfg.npz > 0 {
            if cfg.npx * cfg.npy * cfg.npz != size {
                return Err(BenchError::ProcessGridMismatch {
                    npx: cfg.npx,
                    npy: cfg.npy,
                    npz: cfg.npz,
                    size,
                });
            }
            (cfg.npx, cfg.npy, cfg.npz)
        } else {
            choose_process_grid(size, cfg.nx, cfg.ny, cfg.nz, cfg.max_aspect)?
        };

        let ipx = rank % npx;
        let ipy = (rank / npx) % npy;
        let ipz = rank / (npx * npy);

        let z_depths: Vec<usize> = if cfg.pz > 0 {
            if cfg.pz > npz || cfg.zl == 0 || cfg.zu == 0 || cfg.zl % 8 != 0 || cfg.zu % 8 != 0 {
                return Err(BenchError::InvalidPencil {
                    pz: cfg.pz,
                    zl: cfg.zl,
                    zu: cfg.zu,
                    npz,
                });
            }
            (0..npz)
                .map(|p| if p < cfg.pz { cfg.zu } else { cfg.zl })
                .collect()
        } else {
            vec![cfg.nz; npz]
        };

        let mut z_starts = Vec::with_capacity(npz);
        let mut cursor = 0u64;
        for depth in &z_depths {
            z_starts.push(cursor);
            cursor += *depth as u64;
        }
        let gnz = cursor;

        let nz = z_depths[ipz];
        let geom = Self {
            rank,
            size,
            nx: cfg.nx,
            ny: cfg.ny,
            nz,
            npx,
            npy,
            npz,
            ipx,
            ipy,
            ipz,
            gnx: (cfg.nx * npx) as u64,
            gny: (cfg.ny * npy) as u64,
            gnz,
            base_x: (ipx * cfg.nx) as u64,
            base_y: (ipy * cfg.ny) as u64,
            base_z: z_starts[ipz],
            z_depths,
            z_starts,
        };
        log::debug!(
            "participant {}/{} at ({},{},{}) of {}x{}x{}, local box {}x{}x{}",
            rank,
            size,
            ipx,
            ipy,
            ipz,
            npx,
            npy,
            npz,
            geom.nx,
            geom.ny,
            geom.nz
        );
        Ok(geom)
    }

    /// Number of grid points this participant owns.
    pub fn local_rows(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Number of grid points in the global box.
    pub fn total_rows(&self) -> u64 {
        self.gnx * self.gny * self.gnz
    }

    /// Whether a global coordinate lies inside the global box.
    pub fn contains(&self, gx: i64, gy: i64, gz: i64) -> bool {
        gx >= 0
            && gy >= 0
            && gz >= 0
            && (gx as u64) < self.gnx
            && (gy as u64) < self.gny
            && (gz as u64) < self.gnz
    }

    /// Linearized global id of a grid point.
    pub fn global_index(&self, gx: u64, gy: u64, gz: u64) -> u64 {
        gx + gy * self.gnx + gz * self.gnx * self.gny
    }

    /// Global coordinates back out of a linearized global id.
    pub fn global_coords(&self, id: u64) -> (u64, u64, u64) {
        let plane = self.gnx * self.gny;
        (id % self.gnx, (id % plane) / self.gnx, id / plane)
    }

    /// The participant owning a global coordinate.
    pub fn rank_of(&self, gx: u64, gy: u64, gz: u64) -> usize {
        let ipx = (gx as usize) / self.nx;
        let ipy = (gy as usize) / self.ny;
        let ipz = self.z_starts.partition_point(|&start| start <= gz) - 1;
        ipx + ipy * self.npx + ipz * self.npx * self.npy
    }

    /// Local row index of an owned global coordinate, if owned here.
    pub fn local_index_of(&self, gx: u64, gy: u64, gz: u64) -> Option<usize> {
        if gx < self.base_x
            || gy < self.base_y
            || gz < self.base_z
            || gx >= self.base_x + self.nx as u64
            || gy >= self.base_y + self.ny as u64
            || gz >= self.base_z + self.nz as u64
        {
            return None;
        }
        let ix = (gx - self.base_x) as usize;
        let iy = (gy - self.base_y) as usize;
        let iz = (gz - self.base_z) as usize;
        Some(ix + iy * self.nx + iz * self.nx * self.ny)
    }

    /// Global coordinates of a local row.
    pub fn coords_of_local(&self, row: usize) -> (u64, u64, u64) {
        let ix = row % self.nx;
        let iy = (row / self.nx) % self.ny;
        let iz = row / (self.nx * self.ny);
        (
            self.base_x + ix as u64,
            self.base_y + iy as u64,
            self.base_z + iz as u64,
        )
    }

    /// Geometry of the next coarser level: every dimension halves.
    pub fn coarsen(&self) -> Self {
        debug_assert!(self.nx % 2 == 0 && self.ny % 2 == 0 && self.nz % 2 == 0);
        let z_depths: Vec<usize> = self.z_depths.iter().map(|d| d / 2).collect();
        let mut z_starts = Vec::with_capacity(self.npz);
        let mut cursor = 0u64;
        for depth in &z_depths {
            z_starts.push(cursor);
            cursor += *depth as u64;
        }
        Self {
            nx: self.nx / 2,
            ny: self.ny / 2,
            nz: self.nz / 2,
            gnx: self.gnx / 2,
            gny: self.gny / 2,
            gnz: cursor,
            base_x: self.base_x / 2,
            base_y: self.base_y / 2,
            base_z: z_starts[self.ipz],
            z_depths,
            z_starts,
            ..self.clone()
        }
    }
}

fn check_dims(nx: usize, ny: usize, nz: usize) -> Result<()> {
    let ok = |n: usize| n > 0 && n % 8 == 0;
    if ok(nx) && ok(ny) && ok(nz) {
        Ok(())
    } else {
        Err(BenchError::InvalidDimensions { nx, ny, nz })
    }
}

/// Pick the divisor triple of `size` with the smallest cross-boundary
/// face area, rejecting triples whose global box is too elongated.
fn choose_process_grid(
    size: usize,
    nx: usize,
    ny: usize,
    nz: usize,
    max_aspect: f64,
) -> Result<(usize, usize, usize)> {
    let mut best: Option<((usize, usize, usize), u128)> = None;
    for px in 1..=size {
        if size % px != 0 {
            continue;
        }
        let rest = size / px;
        for py in 1..=rest {
            if rest % py != 0 {
                continue;
            }
            let pzc = rest / py;

            let sides = [(nx * px) as f64, (ny * py) as f64, (nz * pzc) as f64];
            let longest = sides.iter().cloned().fold(f64::MIN, f64::max);
            let shortest = sides.iter().cloned().fold(f64::MAX, f64::min);
            if longest / shortest > max_aspect {
                continue;
            }

            let cost = (nx * ny * pzc) as u128 + (nx * nz * py) as u128 + (ny * nz * px) as u128;
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some(((px, py, pzc), cost));
            }
        }
    }
    best.map(|(grid, _)| grid)
        .ok_or(BenchError::AspectRatio {
            size,
            bound: max_aspect,
        })
}
