//! Message-passing layer for the distributed CG benchmark
//!
//! The numerical engine talks to its peers exclusively through the
//! [`Transport`] trait: point-to-point index/value messages for the halo
//! exchange, plus rank-ordered collectives for reductions and parameter
//! broadcast. Two implementations are provided:
//!
//! - [`SoloTransport`]: the single-participant run, where every exchange
//!   is a no-op and reductions return the local value.
//! - [`LocalCluster`]: an in-process cluster that runs one participant
//!   per thread over channels. Integration tests and the driver's
//!   `--participants N` mode use it to exercise the full distributed
//!   data path on one machine.
//!
//! Collectives are deterministic: partial values are combined in
//! participant-rank order, so repeated runs of the same configuration
//! reduce in the same order.

mod cluster;
mod transport;

pub use cluster::{ClusterEndpoint, LocalCluster};
pub use transport::{CommError, Rank, SoloTransport, Transport};
