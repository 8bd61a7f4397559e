//! Halo planning and the boundary exchange.
//!
//! Setup walks the freshly generated matrix, buckets off-process column
//! references by owner, and assigns each distinct external column a halo
//! slot: neighbors in ascending rank order, global ids ascending within
//! a neighbor. Both sides of an exchange enumerate the same sorted id
//! list, and that shared ordering is the wire contract: the order a
//! participant packs `elements_to_send` for a neighbor is exactly the
//! order that neighbor laid out its receive slots.
//!
//! After setup the exchange is purely index-driven: gather, send to each
//! neighbor, then receive into the halo range. On a single participant
//! the whole module is a no-op.

use std::collections::{BTreeMap, BTreeSet};

use cgbench_comm::{Rank, Transport};

use crate::error::Result;
use crate::sparse::{SparseMatrix, UNMAPPED};
use crate::vector::Vector;

/// Index schedule for the boundary exchange of one level.
#[derive(Debug, Clone)]
pub struct HaloPlan {
    /// Neighbor ranks, ascending. The 27-point stencil is structurally
    /// symmetric, so send and receive neighbors coincide.
    pub neighbors: Vec<Rank>,
    /// Owned values to gather, packed contiguously by neighbor.
    pub elements_to_send: Vec<usize>,
    /// Per-neighbor send counts and prefix offsets into `elements_to_send`.
    pub send_counts: Vec<usize>,
    pub send_offsets: Vec<usize>,
    /// Per-neighbor receive counts and prefix offsets into the halo range.
    pub recv_counts: Vec<usize>,
    pub recv_offsets: Vec<usize>,
}

impl HaloPlan {
    /// Total values sent per exchange.
    pub fn total_send(&self) -> usize {
        self.elements_to_send.len()
    }

    /// Total values received per exchange (the halo width).
    pub fn total_recv(&self) -> usize {
        self.recv_counts.iter().sum()
    }
}

/// Resolve off-process columns to halo slots and agree on the exchange
/// schedule with every neighbor.
pub fn setup_halo(a: &mut SparseMatrix, transport: &dyn Transport) -> Result<()> {
    if transport.size() == 1 {
        debug_assert!(a.col_indices.iter().all(|&c| c != UNMAPPED));
        a.local_cols = a.local_rows;
        return Ok(());
    }

    // Bucket distinct external columns by owning participant.
    let mut wanted: BTreeMap<Rank, BTreeSet<u64>> = BTreeMap::new();
    for (k, &col) in a.col_indices.iter().enumerate() {
        if col == UNMAPPED {
            let gid = a.global_cols[k];
            let (gx, gy, gz) = a.geometry.global_coords(gid);
            let owner = a.geometry.rank_of(gx, gy, gz);
            debug_assert_ne!(owner, transport.rank());
            wanted.entry(owner).or_default().insert(gid);
        }
    }

    // Halo slots: neighbor rank ascending, global id ascending within.
    let mut external_to_local: BTreeMap<u64, usize> = BTreeMap::new();
    let mut next_slot = a.local_rows;
    for ids in wanted.values() {
        for &gid in ids {
            external_to_local.insert(gid, next_slot);
            next_slot += 1;
        }
    }
    for (k, col) in a.col_indices.iter_mut().enumerate() {
        if *col == UNMAPPED {
            *col = external_to_local[&a.global_cols[k]];
        }
    }

    let neighbors: Vec<Rank> = wanted.keys().copied().collect();
    let recv_counts: Vec<usize> = wanted.values().map(|ids| ids.len()).collect();
    let mut recv_offsets = Vec::with_capacity(neighbors.len());
    let mut cursor = 0;
    for &count in &recv_counts {
        recv_offsets.push(cursor);
        cursor += count;
    }

    // Tell each neighbor which of its rows we need. The stencil is
    // structurally symmetric, so the set of ranks that will ask for our
    // rows is exactly our own neighbor set.
    for (&neighbor, ids) in &wanted {
        transport.send_indices(neighbor, ids.iter().copied().collect())?;
    }

    let mut elements_to_send = Vec::new();
    let mut send_counts = Vec::with_capacity(neighbors.len());
    let mut send_offsets = Vec::with_capacity(neighbors.len());
    for &neighbor in &neighbors {
        let requested = transport.recv_indices(neighbor)?;
        send_offsets.push(elements_to_send.len());
        send_counts.push(requested.len());
        for gid in requested {
            let (gx, gy, gz) = a.geometry.global_coords(gid);
            let local = a
                .geometry
                .local_index_of(gx, gy, gz)
                .expect("neighbor requested a row we do not own");
            elements_to_send.push(local);
        }
    }

    let plan = HaloPlan {
        neighbors,
        elements_to_send,
        send_counts,
        send_offsets,
        recv_counts,
        recv_offsets,
    };
    log::debug!(
        "halo plan on rank {}: {} neighbors, send {} recv {}",
        transport.rank(),
        plan.neighbors.len(),
        plan.total_send(),
        plan.total_recv()
    );

    a.local_cols = a.local_rows + plan.total_recv();
    a.halo = Some(plan);
    Ok(())
}

/// Refresh the halo slots of `x` with the owned values of the neighbors.
///
/// Running this twice with unchanged owned values leaves the halo
/// byte-identical.
pub fn exchange_halo(a: &SparseMatrix, x: &mut Vector, transport: &dyn Transport) -> Result<()> {
    let Some(plan) = &a.halo else {
        return Ok(());
    };
    debug_assert_eq!(x.as_slice().len(), a.local_cols);

    for (n, &neighbor) in plan.neighbors.iter().enumerate() {
        let start = plan.send_offsets[n];
        let buffer: Vec<f64> = plan.elements_to_send[start..start + plan.send_counts[n]]
            .iter()
            .map(|&row| x.as_slice()[row])
            .collect();
        transport.send_values(neighbor, buffer)?;
    }

    let local_len = x.local_len;
    for (n, &neighbor) in plan.neighbors.iter().enumerate() {
        let incoming = transport.recv_values(neighbor)?;
        debug_assert_eq!(incoming.len(), plan.recv_counts[n]);
        let base = local_len + plan.recv_offsets[n];
        x.as_mut_slice()[base..base + incoming.len()].copy_from_slice(&incoming);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryConfig};
    use crate::problem;
    use cgbench_comm::{LocalCluster, Transport};

    fn two_rank_config() -> GeometryConfig {
        let mut cfg = GeometryConfig::uniform(8, 8, 8);
        cfg.npx = 1;
        cfg.npy = 1;
        cfg.npz = 2;
        cfg
    }

    #[test]
    fn face_neighbors_exchange_one_plane() {
        let cfg = two_rank_config();
        LocalCluster::run(2, |ep| {
            let geometry = Geometry::build(&cfg, ep.rank(), ep.size()).unwrap();
            let a = problem::generate_matrix(geometry, &ep).unwrap();
            let plan = a.halo.as_ref().unwrap();
            assert_eq!(plan.neighbors, vec![1 - ep.rank()]);
            // One full 8x8 plane crosses the z cut in each direction.
            assert_eq!(plan.total_send(), 64);
            assert_eq!(plan.total_recv(), 64);
            assert_eq!(a.local_cols, a.local_rows + 64);
        });
    }

    #[test]
    fn exchange_delivers_owned_values() {
        let cfg = two_rank_config();
        LocalCluster::run(2, |ep| {
            let geometry = Geometry::build(&cfg, ep.rank(), ep.size()).unwrap();
            let a = problem::generate_matrix(geometry, &ep).unwrap();
            let mut x = Vector::zeros(a.local_rows, a.local_cols);
            // Tag every owned value with its global row id.
            for row in 0..a.local_rows {
                x.as_mut_slice()[row] = a.row_globals[row] as f64;
            }
            exchange_halo(&a, &mut x, &ep).unwrap();

            // Every nonzero now reads the global id of its column.
            for k in 0..a.local_nonzeros() {
                assert_eq!(x.as_slice()[a.col_indices[k]], a.global_cols[k] as f64);
            }
        });
    }

    #[test]
    fn exchange_is_idempotent() {
        let cfg = two_rank_config();
        LocalCluster::run(2, |ep| {
            let geometry = Geometry::build(&cfg, ep.rank(), ep.size()).unwrap();
            let a = problem::generate_matrix(geometry, &ep).unwrap();
            let mut x = Vector::random(a.local_rows, a.local_cols, 5 + ep.rank() as u64);
            exchange_halo(&a, &mut x, &ep).unwrap();
            let first: Vec<f64> = x.as_slice().to_vec();
            exchange_halo(&a, &mut x, &ep).unwrap();
            assert_eq!(x.as_slice(), &first[..]);
        });
    }
}
