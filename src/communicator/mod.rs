//! Domain decomposition of the DOF vector and the collectives built on it.
//!
//! A [`Communicator`] ties a transport ([`UniverseComm`]) to one partition of
//! `ndof` values and to the halo plan of one element list. Every method that
//! moves data is a collective: all ranks must call it in the same order.
//!
//! Vectors handled here come in three shapes:
//! - *block*: the `nblock` values this rank owns;
//! - *local*: the block followed by the halo values (`nlocal` entries), the
//!   layout element evaluators see;
//! - *global*: all `ndof` values in index order.

pub mod halo;
pub mod partition;

pub use halo::HaloPlan;
pub use partition::Partition;

use crate::core::{Args, Element};
use crate::error::{MinimError, Result};
use crate::parallel::{Broadcast, Comm, UniverseComm};

pub struct Communicator {
    transport: UniverseComm,
    partition: Partition,
    counts: Vec<usize>,
    plan: HaloPlan,
    args: Args,
}

impl Communicator {
    /// Partition `ndof` DOFs over the ranks of `transport` (or the ordered
    /// subset `ranks`) and distribute `elements` between owners and halos.
    pub fn new(transport: UniverseComm, ndof: usize, elements: &[Element], ranks: Option<&[usize]>) -> Result<Self> {
        let partition = Partition::new(ndof, transport.size(), ranks)?;
        let (plan, args) = HaloPlan::build(&partition, transport.rank(), elements)?;
        let counts = partition.counts();
        Ok(Communicator { transport, partition, counts, plan, args })
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn nproc(&self) -> usize {
        self.transport.size()
    }

    /// Rank 0 coordinates root-only work (the L-BFGS history).
    pub fn is_root(&self) -> bool {
        self.rank() == 0
    }

    pub fn ndof(&self) -> usize {
        self.partition.ndof()
    }

    pub fn nblock(&self) -> usize {
        self.plan.nblock()
    }

    pub fn nlocal(&self) -> usize {
        self.plan.nlocal()
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn transport(&self) -> &UniverseComm {
        &self.transport
    }

    /// Slice this rank's block out of a global vector. No communication.
    pub fn assign_block(&self, global: &[f64]) -> Result<Vec<f64>> {
        if global.len() != self.ndof() {
            return Err(MinimError::SizeMismatch {
                what: "global vector",
                expected: self.ndof(),
                got: global.len(),
            });
        }
        Ok(global[self.partition.range(self.rank())].to_vec())
    }

    /// Halo exchange: resize `vector` to the local layout and fill its halo
    /// region with the current values of the owning ranks. Returns after all
    /// values have arrived.
    pub fn communicate(&self, vector: &mut Vec<f64>) {
        self.plan.exchange(&self.transport, vector);
    }

    /// Value at global index `i` from a local-layout vector.
    pub fn get(&self, vector: &[f64], i: usize) -> Result<f64> {
        if i >= self.ndof() {
            return Err(MinimError::IndexOutOfRange { index: i, ndof: self.ndof() });
        }
        self.plan
            .local_index(i)
            .and_then(|k| vector.get(k).copied())
            .ok_or(MinimError::NotLocal(i))
    }

    /// Make a locally detected outcome collective: if any rank failed, every
    /// rank returns an error. A failing rank keeps its own error; the others
    /// get `PeerFailed`. Collective.
    pub fn agree<T>(&self, local: Result<T>) -> Result<T> {
        let failed = self.transport.all_reduce(if local.is_err() { 1.0 } else { 0.0 });
        match local {
            Ok(_) if failed > 0.0 => Err(MinimError::PeerFailed(failed as usize)),
            outcome => outcome,
        }
    }

    /// Global dot product of two block (or local) vectors. Only the owned
    /// block enters the sum; the result is identical on every rank.
    pub fn dot_product(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        let n = self.nblock();
        let checked = if a.len() != b.len() {
            Err(MinimError::SizeMismatch { what: "dot product operands", expected: a.len(), got: b.len() })
        } else {
            self.check_block("dot product operand", a.len())
        };
        self.agree(checked)?;
        Ok(self.transport.dot(&a[..n], &b[..n]))
    }

    /// Global sum of one value per rank.
    pub fn sum(&self, x: f64) -> f64 {
        self.transport.all_reduce(x)
    }

    /// Assemble the global vector from every rank's block, on every rank
    /// (`root == None`) or on `root` only. Non-root ranks get an empty vector.
    pub fn gather(&self, block: &[f64], root: Option<usize>) -> Result<Vec<f64>> {
        self.agree(self.check_block("gathered block", block.len()))?;
        let buf = self.transport.gather(&block[..self.nblock()], &self.counts, root);
        Ok(match root {
            Some(root) if root != self.rank() => buf,
            _ => self.partition.from_rank_order(&buf),
        })
    }

    /// Inverse of [`Communicator::gather`]. With `root == None` every rank
    /// already holds `data` and slices its block locally; otherwise only
    /// `root` needs to hold it.
    pub fn scatter(&self, data: &[f64], root: Option<usize>) -> Result<Vec<f64>> {
        match root {
            None => self.assign_block(data),
            Some(root) => {
                let checked = if self.rank() == root && data.len() != self.ndof() {
                    Err(MinimError::SizeMismatch { what: "scattered vector", expected: self.ndof(), got: data.len() })
                } else {
                    Ok(())
                };
                self.agree(checked)?;
                let ordered = if self.rank() == root { self.partition.to_rank_order(data) } else { Vec::new() };
                Ok(self.transport.scatter(&ordered, &self.counts, root))
            }
        }
    }

    /// Make `value` on every rank equal to its value on `root`.
    pub fn bcast<T: Broadcast + ?Sized>(&self, value: &mut T, root: usize) {
        value.broadcast_from(&self.transport, root);
    }

    /// A block or local vector must hold at least the owned block.
    fn check_block(&self, what: &'static str, len: usize) -> Result<()> {
        if len < self.nblock() {
            return Err(MinimError::SizeMismatch { what, expected: self.nblock(), got: len });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(ndof: usize, elements: &[Element]) -> Communicator {
        Communicator::new(UniverseComm::Serial, ndof, elements, None).unwrap()
    }

    #[test]
    fn serial_block_is_whole_vector() {
        let comm = serial(4, &[]);
        assert!(comm.is_root());
        assert_eq!(comm.nblock(), 4);
        let x = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(comm.assign_block(&x).unwrap(), x);
        assert_eq!(comm.gather(&x, None).unwrap(), x);
        assert_eq!(comm.scatter(&x, Some(0)).unwrap(), x);
        assert_eq!(comm.dot_product(&x, &x).unwrap(), 30.0);
    }

    #[test]
    fn short_or_mismatched_operands_are_rejected() {
        let comm = serial(3, &[]);
        let x = [1.0, 2.0, 3.0];
        assert!(matches!(
            comm.dot_product(&x, &[1.0]),
            Err(MinimError::SizeMismatch { expected: 3, got: 1, .. })
        ));
        assert!(matches!(
            comm.dot_product(&[1.0], &[1.0]),
            Err(MinimError::SizeMismatch { expected: 3, got: 1, .. })
        ));
        assert!(matches!(
            comm.gather(&[1.0], None),
            Err(MinimError::SizeMismatch { expected: 3, got: 1, .. })
        ));
        assert!(matches!(
            comm.scatter(&[1.0, 2.0], Some(0)),
            Err(MinimError::SizeMismatch { expected: 3, got: 2, .. })
        ));
    }

    #[test]
    fn agree_passes_local_outcome_on_one_rank() {
        let comm = serial(1, &[]);
        assert_eq!(comm.agree(Ok(4)).unwrap(), 4);
        assert!(matches!(comm.agree::<()>(Err(MinimError::NotLocal(7))), Err(MinimError::NotLocal(7))));
    }

    #[test]
    fn assign_block_checks_length() {
        let comm = serial(4, &[]);
        assert!(matches!(
            comm.assign_block(&[1.0]),
            Err(MinimError::SizeMismatch { expected: 4, got: 1, .. })
        ));
    }

    #[test]
    fn get_reads_block_values() {
        let comm = serial(3, &[Element::new(0, vec![0, 2], vec![])]);
        let mut x = vec![5.0, 6.0, 7.0];
        comm.communicate(&mut x);
        assert_eq!(comm.get(&x, 2).unwrap(), 7.0);
        assert!(matches!(comm.get(&x, 3), Err(MinimError::IndexOutOfRange { .. })));
    }

    #[test]
    fn bcast_on_single_rank_keeps_value() {
        let comm = serial(1, &[]);
        let mut v = vec![1.0, 2.0];
        comm.bcast(&mut v, 0);
        assert_eq!(v, vec![1.0, 2.0]);
    }
}
