//! Rank-level transport primitives.
//!
//! Every method of [`Comm`] is a blocking collective: all ranks of a run must
//! issue the same sequence of calls, otherwise the run deadlocks. The domain
//! level (block partition, halo bookkeeping) lives in [`crate::communicator`];
//! backends here only move `f64` buffers between ranks.

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Global sum. The reduction order is fixed by rank, so every rank obtains
    /// the bitwise-identical result.
    fn all_reduce(&self, x: f64) -> f64;
    /// Replace `data` on every rank with the contents it has on `root`.
    fn broadcast(&self, data: &mut Vec<f64>, root: usize);
    /// Concatenate the `local` buffers in rank order. `counts[r]` is the length
    /// contributed by rank `r`. With `root == None` every rank receives the
    /// result; otherwise only `root` does and the others get an empty vector.
    fn gather(&self, local: &[f64], counts: &[usize], root: Option<usize>) -> Vec<f64>;
    /// Inverse of `gather` from a single root: rank `r` receives the
    /// `counts[r]` values of `global` starting at the sum of the previous counts.
    /// Only the root needs to hold `global`.
    fn scatter(&self, global: &[f64], counts: &[usize], root: usize) -> Vec<f64>;
    /// Personalised all-to-all: `outgoing[r]` is delivered to rank `r`, and the
    /// result holds at position `r` what rank `r` sent here. `incoming_counts[r]`
    /// must equal the length rank `r` sends to this rank.
    fn exchange(&self, outgoing: &[Vec<f64>], incoming_counts: &[usize]) -> Vec<Vec<f64>>;
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce(local)
    }
}

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature = "rayon")]
pub mod rayon_comm;
#[cfg(feature = "rayon")]
pub use rayon_comm::RayonComm;

/// The transport a run is wired to.
pub enum UniverseComm {
    #[cfg(feature = "mpi")]
    Mpi(MpiComm),
    #[cfg(feature = "rayon")]
    Rayon(RayonComm),
    Serial,
}

#[cfg(feature = "rayon")]
impl From<RayonComm> for UniverseComm {
    fn from(comm: RayonComm) -> Self {
        UniverseComm::Rayon(comm)
    }
}

#[cfg(feature = "mpi")]
impl From<MpiComm> for UniverseComm {
    fn from(comm: MpiComm) -> Self {
        UniverseComm::Mpi(comm)
    }
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.rank(),
            UniverseComm::Serial => 0,
        }
    }
    fn size(&self) -> usize {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.size(),
            UniverseComm::Serial => 1,
        }
    }
    fn barrier(&self) {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.barrier(),
            UniverseComm::Serial => {}
        }
    }
    fn all_reduce(&self, x: f64) -> f64 {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce(x),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.all_reduce(x),
            UniverseComm::Serial => x,
        }
    }
    fn broadcast(&self, data: &mut Vec<f64>, root: usize) {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.broadcast(data, root),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.broadcast(data, root),
            UniverseComm::Serial => {}
        }
    }
    fn gather(&self, local: &[f64], counts: &[usize], root: Option<usize>) -> Vec<f64> {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.gather(local, counts, root),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.gather(local, counts, root),
            UniverseComm::Serial => local.to_vec(),
        }
    }
    fn scatter(&self, global: &[f64], counts: &[usize], root: usize) -> Vec<f64> {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.scatter(global, counts, root),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.scatter(global, counts, root),
            UniverseComm::Serial => global.to_vec(),
        }
    }
    fn exchange(&self, outgoing: &[Vec<f64>], incoming_counts: &[usize]) -> Vec<Vec<f64>> {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.exchange(outgoing, incoming_counts),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.exchange(outgoing, incoming_counts),
            UniverseComm::Serial => outgoing.to_vec(),
        }
    }
}

/// Values that can be sent from a root to every rank.
///
/// Integers travel as `f64`, which is exact for anything below 2^53.
pub trait Broadcast {
    fn broadcast_from<C: Comm + ?Sized>(&mut self, comm: &C, root: usize);
}

impl Broadcast for Vec<f64> {
    fn broadcast_from<C: Comm + ?Sized>(&mut self, comm: &C, root: usize) {
        comm.broadcast(self, root);
    }
}

impl Broadcast for f64 {
    fn broadcast_from<C: Comm + ?Sized>(&mut self, comm: &C, root: usize) {
        let mut buf = vec![*self];
        comm.broadcast(&mut buf, root);
        if let Some(&value) = buf.first() {
            *self = value;
        }
    }
}

impl Broadcast for bool {
    fn broadcast_from<C: Comm + ?Sized>(&mut self, comm: &C, root: usize) {
        let mut value = if *self { 1.0 } else { 0.0 };
        value.broadcast_from(comm, root);
        *self = value != 0.0;
    }
}

impl Broadcast for usize {
    fn broadcast_from<C: Comm + ?Sized>(&mut self, comm: &C, root: usize) {
        let mut value = *self as f64;
        value.broadcast_from(comm, root);
        *self = value as usize;
    }
}

/// Offsets of each rank's segment given per-rank counts.
pub(crate) fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0, |acc, &c| {
            let start = *acc;
            *acc += c;
            Some(start)
        })
        .collect()
}
