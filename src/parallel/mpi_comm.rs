//! MPI-based parallel communication module.
//!
//! This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
//! backend for distributed-memory parallelism. Every rank is a separate process; the collectives
//! map one-to-one onto MPI collectives, with variable-count variants used wherever blocks have
//! unequal length. The implementation is only available when the `mpi` feature is enabled.
//!
//! # Usage
//!
//! - `MpiComm::new()` initialises MPI and keeps the `Universe` alive for as long as the handle
//!   exists; dropping it finalises MPI.
//! - If MPI was initialised elsewhere, wrap the world communicator with `MpiComm::from_world`.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")]
//! # {
//! use minim::parallel::{Comm, MpiComm};
//! let comm = MpiComm::new().unwrap();
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier();
//! # }
//! ```

use mpi::collective::SystemOperation;
use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

use crate::error::{MinimError, Result};

/// MPI communicator wrapper for distributed parallelism.
pub struct MpiComm {
    /// Held only to keep MPI initialised; `None` when MPI is owned by the caller.
    _universe: Option<Universe>,
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// Fails if no MPI environment is available or MPI is already initialised.
    pub fn new() -> Result<Self> {
        let universe = mpi::initialize()
            .ok_or_else(|| MinimError::Transport("MPI could not be initialised".into()))?;
        let world = universe.world();
        let mut comm = Self::from_world(world);
        comm._universe = Some(universe);
        Ok(comm)
    }

    /// Wrap a world communicator whose MPI environment is managed by the caller.
    pub fn from_world(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { _universe: None, world, rank, size }
    }
}

fn to_counts(counts: &[usize]) -> (Vec<Count>, Vec<Count>) {
    let counts: Vec<Count> = counts.iter().map(|&c| c as Count).collect();
    let displs = counts
        .iter()
        .scan(0 as Count, |acc, &c| {
            let start = *acc;
            *acc += c;
            Some(start)
        })
        .collect();
    (counts, displs)
}

impl super::Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize { self.rank }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize { self.size }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) { self.world.barrier(); }

    fn all_reduce(&self, x: f64) -> f64 {
        let mut y = 0.0;
        self.world.all_reduce_into(&x, &mut y, SystemOperation::sum());
        y
    }

    /// The length travels first so non-root ranks can size their buffer.
    fn broadcast(&self, data: &mut Vec<f64>, root: usize) {
        let root_process = self.world.process_at_rank(root as i32);
        let mut len = data.len() as u64;
        root_process.broadcast_into(&mut len);
        if self.rank != root {
            data.clear();
            data.resize(len as usize, 0.0);
        }
        root_process.broadcast_into(&mut data[..]);
    }

    fn gather(&self, local: &[f64], counts: &[usize], root: Option<usize>) -> Vec<f64> {
        let total: usize = counts.iter().sum();
        let (counts, displs) = to_counts(counts);
        match root {
            None => {
                let mut buf = vec![0.0; total];
                {
                    let mut partition = PartitionMut::new(&mut buf[..], counts, displs);
                    self.world.all_gather_varcount_into(local, &mut partition);
                }
                buf
            }
            Some(root) => {
                let root_process = self.world.process_at_rank(root as i32);
                if self.rank == root {
                    let mut buf = vec![0.0; total];
                    {
                        let mut partition = PartitionMut::new(&mut buf[..], counts, displs);
                        root_process.gather_varcount_into_root(local, &mut partition);
                    }
                    buf
                } else {
                    root_process.gather_varcount_into(local);
                    Vec::new()
                }
            }
        }
    }

    fn scatter(&self, global: &[f64], counts: &[usize], root: usize) -> Vec<f64> {
        let mut out = vec![0.0; counts[self.rank]];
        let root_process = self.world.process_at_rank(root as i32);
        if self.rank == root {
            let (counts, displs) = to_counts(counts);
            let partition = Partition::new(global, counts, displs);
            root_process.scatter_varcount_into_root(&partition, &mut out[..]);
        } else {
            root_process.scatter_varcount_into(&mut out[..]);
        }
        out
    }

    fn exchange(&self, outgoing: &[Vec<f64>], incoming_counts: &[usize]) -> Vec<Vec<f64>> {
        let send: Vec<f64> = outgoing.concat();
        let send_counts: Vec<usize> = outgoing.iter().map(Vec::len).collect();
        let (scounts, sdispls) = to_counts(&send_counts);
        let (rcounts, rdispls) = to_counts(incoming_counts);
        let mut recv = vec![0.0; incoming_counts.iter().sum()];
        {
            let partition = Partition::new(&send[..], scounts, sdispls);
            let mut recv_partition = PartitionMut::new(&mut recv[..], rcounts, rdispls);
            self.world.all_to_all_varcount_into(&partition, &mut recv_partition);
        }
        super::displacements(incoming_counts)
            .into_iter()
            .zip(incoming_counts)
            .map(|(start, &n)| recv[start..start + n].to_vec())
            .collect()
    }
}
