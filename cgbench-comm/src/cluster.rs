//! In-process cluster: one participant per thread, channels for wires.
//!
//! Every ordered pair of participants gets its own FIFO channel, so a
//! receive names the sender explicitly and messages from distinct
//! senders can never be confused. The group-wide barrier is shared.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::transport::{CommError, Rank, Transport};

enum Message {
    Indices(Vec<u64>),
    Values(Vec<f64>),
    Ints(Vec<i64>),
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Indices(_) => "indices",
            Message::Values(_) => "values",
            Message::Ints(_) => "ints",
        }
    }
}

/// One participant's endpoint into a [`LocalCluster`].
pub struct ClusterEndpoint {
    rank: Rank,
    size: usize,
    to: Vec<Sender<Message>>,
    from: Vec<Receiver<Message>>,
    barrier: Arc<Barrier>,
}

impl ClusterEndpoint {
    fn check_peer(&self, peer: Rank) -> Result<(), CommError> {
        if peer >= self.size || peer == self.rank {
            Err(CommError::RankOutOfRange {
                rank: peer,
                size: self.size,
            })
        } else {
            Ok(())
        }
    }

    fn send(&self, to: Rank, msg: Message) -> Result<(), CommError> {
        self.check_peer(to)?;
        self.to[to]
            .send(msg)
            .map_err(|_| CommError::Disconnected { peer: to })
    }

    fn recv(&self, from: Rank, expected: &'static str) -> Result<Message, CommError> {
        self.check_peer(from)?;
        let msg = self.from[from]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: from })?;
        if msg.kind() != expected {
            return Err(CommError::Protocol {
                from,
                got: msg.kind(),
                expected,
            });
        }
        Ok(msg)
    }
}

impl Transport for ClusterEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_indices(&self, to: Rank, indices: Vec<u64>) -> Result<(), CommError> {
        self.send(to, Message::Indices(indices))
    }

    fn recv_indices(&self, from: Rank) -> Result<Vec<u64>, CommError> {
        match self.recv(from, "indices")? {
            Message::Indices(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    fn send_values(&self, to: Rank, values: Vec<f64>) -> Result<(), CommError> {
        self.send(to, Message::Values(values))
    }

    fn recv_values(&self, from: Rank) -> Result<Vec<f64>, CommError> {
        match self.recv(from, "values")? {
            Message::Values(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    fn allreduce_sum(&self, local: f64) -> Result<f64, CommError> {
        self.allreduce(local, |acc, v| acc + v)
    }

    fn allreduce_sum_u64(&self, local: u64) -> Result<u64, CommError> {
        // Counters ride the f64 channel; the values involved (row and
        // nonzero totals) stay far below 2^53.
        let sum = self.allreduce(local as f64, |acc, v| acc + v)?;
        Ok(sum as u64)
    }

    fn allreduce_max(&self, local: f64) -> Result<f64, CommError> {
        self.allreduce(local, f64::max)
    }

    fn broadcast_i64(&self, root: Rank, values: &mut Vec<i64>) -> Result<(), CommError> {
        if self.size == 1 {
            return Ok(());
        }
        if self.rank == root {
            for peer in 0..self.size {
                if peer != root {
                    self.send(peer, Message::Ints(values.clone()))?;
                }
            }
        } else {
            *values = match self.recv(root, "ints")? {
                Message::Ints(v) => v,
                _ => unreachable!(),
            };
        }
        Ok(())
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.barrier.wait();
        Ok(())
    }
}

impl ClusterEndpoint {
    /// Combine partial values in rank order on rank 0, then broadcast.
    fn allreduce<F>(&self, local: f64, combine: F) -> Result<f64, CommError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.size == 1 {
            return Ok(local);
        }
        if self.rank == 0 {
            let mut acc = local;
            for src in 1..self.size {
                let partial = match self.recv(src, "values")? {
                    Message::Values(v) => v[0],
                    _ => unreachable!(),
                };
                acc = combine(acc, partial);
            }
            for peer in 1..self.size {
                self.send(peer, Message::Values(vec![acc]))?;
            }
            Ok(acc)
        } else {
            self.send(0, Message::Values(vec![local]))?;
            match self.recv(0, "values")? {
                Message::Values(v) => Ok(v[0]),
                _ => unreachable!(),
            }
        }
    }
}

/// Runs `size` participants on `size` threads and returns their results
/// in rank order.
pub struct LocalCluster;

impl LocalCluster {
    /// Spawn the group, hand each thread its endpoint, and join.
    ///
    /// Panics in a participant propagate to the caller once every other
    /// participant has finished or failed; there is no partial-failure
    /// recovery, matching the benchmark's abort-the-run semantics.
    pub fn run<F, T>(size: usize, body: F) -> Vec<T>
    where
        F: Fn(ClusterEndpoint) -> T + Send + Sync,
        T: Send,
    {
        assert!(size > 0, "cluster needs at least one participant");
        log::debug!("spawning {size} in-process participants");

        // Channel matrix: wires[s][d] carries messages from s to d.
        let mut senders: Vec<Vec<Option<Sender<Message>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Message>>>> = Vec::with_capacity(size);
        for _ in 0..size {
            senders.push((0..size).map(|_| None).collect());
            receivers.push((0..size).map(|_| None).collect());
        }
        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = unbounded();
                senders[src][dst] = Some(tx);
                receivers[dst][src] = Some(rx);
            }
        }

        let barrier = Arc::new(Barrier::new(size));

        let mut endpoints: Vec<ClusterEndpoint> = Vec::with_capacity(size);
        for rank in (0..size).rev() {
            // Dead channels to self keep the vectors rank-indexable.
            let (self_tx, self_rx) = unbounded();
            let to = senders
                .pop()
                .unwrap()
                .into_iter()
                .map(|s| s.unwrap_or_else(|| self_tx.clone()))
                .collect();
            let from = receivers
                .pop()
                .unwrap()
                .into_iter()
                .map(|r| r.unwrap_or_else(|| self_rx.clone()))
                .collect();
            endpoints.push(ClusterEndpoint {
                rank,
                size,
                to,
                from,
                barrier: Arc::clone(&barrier),
            });
        }
        endpoints.reverse();

        let body = &body;
        thread::scope(|scope| {
            let handles: Vec<_> = endpoints
                .into_iter()
                .map(|ep| scope.spawn(move || body(ep)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("participant panicked"))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allreduce_sums_in_rank_order() {
        let sums = LocalCluster::run(4, |ep| ep.allreduce_sum(ep.rank() as f64 + 1.0).unwrap());
        assert_eq!(sums, vec![10.0; 4]);
    }

    #[test]
    fn allreduce_max_agrees_everywhere() {
        let maxima = LocalCluster::run(3, |ep| {
            ep.allreduce_max(-(ep.rank() as f64)).unwrap()
        });
        assert_eq!(maxima, vec![0.0; 3]);
    }

    #[test]
    fn point_to_point_ring() {
        let got = LocalCluster::run(4, |ep| {
            let next = (ep.rank() + 1) % ep.size();
            let prev = (ep.rank() + ep.size() - 1) % ep.size();
            ep.send_values(next, vec![ep.rank() as f64]).unwrap();
            ep.recv_values(prev).unwrap()[0]
        });
        assert_eq!(got, vec![3.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn per_pair_fifo_ordering() {
        let got = LocalCluster::run(2, |ep| {
            if ep.rank() == 0 {
                ep.send_indices(1, vec![1]).unwrap();
                ep.send_indices(1, vec![2]).unwrap();
                ep.send_values(1, vec![3.0]).unwrap();
                Vec::new()
            } else {
                let a = ep.recv_indices(0).unwrap();
                let b = ep.recv_indices(0).unwrap();
                let c = ep.recv_values(0).unwrap();
                vec![a[0], b[0], c[0] as u64]
            }
        });
        assert_eq!(got[1], vec![1, 2, 3]);
    }

    #[test]
    fn broadcast_from_root() {
        let got = LocalCluster::run(3, |ep| {
            let mut params = if ep.rank() == 0 {
                vec![16, 16, 16, 60]
            } else {
                Vec::new()
            };
            ep.broadcast_i64(0, &mut params).unwrap();
            params
        });
        for p in got {
            assert_eq!(p, vec![16, 16, 16, 60]);
        }
    }

    #[test]
    fn barrier_releases_everyone() {
        let got = LocalCluster::run(4, |ep| {
            ep.barrier().unwrap();
            ep.allreduce_sum(1.0).unwrap()
        });
        assert_eq!(got, vec![4.0; 4]);
    }

    #[test]
    fn single_participant_cluster() {
        let got = LocalCluster::run(1, |ep| ep.allreduce_sum(7.0).unwrap());
        assert_eq!(got, vec![7.0]);
    }
}
