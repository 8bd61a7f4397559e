//! The [`Transport`] trait and the single-participant implementation.

use thiserror::Error;

/// Participant index within the group, `0..size`.
pub type Rank = usize;

/// Errors raised by the message layer. All of these are fatal: a failed
/// participant takes the whole run down, there is no recovery.
#[derive(Debug, Error)]
pub enum CommError {
    /// The peer's end of a channel was dropped mid-run.
    #[error("participant {peer} disconnected")]
    Disconnected { peer: Rank },

    /// A message of an unexpected kind arrived, which means the
    /// participants have fallen out of protocol lockstep.
    #[error("protocol mismatch: participant {from} sent {got}, expected {expected}")]
    Protocol {
        from: Rank,
        got: &'static str,
        expected: &'static str,
    },

    /// Point-to-point operation addressed to a rank outside the group.
    #[error("rank {rank} outside group of size {size}")]
    RankOutOfRange { rank: Rank, size: usize },
}

/// Two-sided message passing plus rank-ordered collectives.
///
/// The halo exchange uses the point-to-point half; DOT reductions and
/// the parameter broadcast use the collectives. Implementations must
/// preserve per-(sender, receiver) FIFO ordering, which is what the
/// halo setup protocol relies on.
pub trait Transport: Send + Sync {
    /// This participant's rank.
    fn rank(&self) -> Rank;

    /// Number of participants in the group.
    fn size(&self) -> usize;

    /// Send a list of global indices to `to`. Does not block on delivery.
    fn send_indices(&self, to: Rank, indices: Vec<u64>) -> Result<(), CommError>;

    /// Receive a list of global indices from `from`. Blocks until the
    /// message arrives.
    fn recv_indices(&self, from: Rank) -> Result<Vec<u64>, CommError>;

    /// Send a buffer of floating-point values to `to`.
    fn send_values(&self, to: Rank, values: Vec<f64>) -> Result<(), CommError>;

    /// Receive a buffer of floating-point values from `from`.
    fn recv_values(&self, from: Rank) -> Result<Vec<f64>, CommError>;

    /// Global sum over all participants. Partial sums are combined in
    /// rank order on rank 0 and the result is broadcast, so the value is
    /// identical on every participant and across repeated runs.
    fn allreduce_sum(&self, local: f64) -> Result<f64, CommError>;

    /// Global sum of unsigned counters (row/nonzero totals, failure
    /// counts).
    fn allreduce_sum_u64(&self, local: u64) -> Result<u64, CommError>;

    /// Global maximum, used for timing summaries.
    fn allreduce_max(&self, local: f64) -> Result<f64, CommError>;

    /// Broadcast `values` from `root` to everyone, in place.
    fn broadcast_i64(&self, root: Rank, values: &mut Vec<i64>) -> Result<(), CommError>;

    /// Block until every participant has entered the barrier.
    fn barrier(&self) -> Result<(), CommError>;
}

/// Transport for a group of one. Every exchange is a no-op and every
/// reduction returns the local value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoloTransport;

impl Transport for SoloTransport {
    fn rank(&self) -> Rank {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send_indices(&self, to: Rank, _indices: Vec<u64>) -> Result<(), CommError> {
        Err(CommError::RankOutOfRange { rank: to, size: 1 })
    }

    fn recv_indices(&self, from: Rank) -> Result<Vec<u64>, CommError> {
        Err(CommError::RankOutOfRange {
            rank: from,
            size: 1,
        })
    }

    fn send_values(&self, to: Rank, _values: Vec<f64>) -> Result<(), CommError> {
        Err(CommError::RankOutOfRange { rank: to, size: 1 })
    }

    fn recv_values(&self, from: Rank) -> Result<Vec<f64>, CommError> {
        Err(CommError::RankOutOfRange {
            rank: from,
            size: 1,
        })
    }

    fn allreduce_sum(&self, local: f64) -> Result<f64, CommError> {
        Ok(local)
    }

    fn allreduce_sum_u64(&self, local: u64) -> Result<u64, CommError> {
        Ok(local)
    }

    fn allreduce_max(&self, local: f64) -> Result<f64, CommError> {
        Ok(local)
    }

    fn broadcast_i64(&self, _root: Rank, _values: &mut Vec<i64>) -> Result<(), CommError> {
        Ok(())
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }
}
