//! Contiguous block assignment of a global DOF vector.
//!
//! The DOFs are cut into `nowners` chunks of `ceil(ndof / nowners)` entries
//! (the trailing chunks absorb the remainder and may be shorter or empty).
//! Chunk `k` belongs to `owners[k]`; every other transport rank holds an
//! empty block. The assignment is a pure function of its inputs, so every
//! rank computes it without communication.

use std::ops::Range;

use crate::error::{MinimError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    ndof: usize,
    chunk: usize,
    owners: Vec<usize>,
    /// Global index range per transport rank.
    ranges: Vec<Range<usize>>,
}

impl Partition {
    /// Partition `ndof` DOFs over `nproc` transport ranks. `ranks` optionally
    /// restricts ownership to an ordered subset of them.
    pub fn new(ndof: usize, nproc: usize, ranks: Option<&[usize]>) -> Result<Self> {
        if nproc == 0 {
            return Err(MinimError::Config("communicator has no ranks".into()));
        }
        let owners: Vec<usize> = match ranks {
            None => (0..nproc).collect(),
            Some(ranks) => {
                if ranks.is_empty() {
                    return Err(MinimError::InvalidRanks("no owning ranks given".into()));
                }
                let mut seen = vec![false; nproc];
                for &r in ranks {
                    if r >= nproc {
                        return Err(MinimError::InvalidRanks(format!(
                            "rank {r} out of range for {nproc} processes"
                        )));
                    }
                    if std::mem::replace(&mut seen[r], true) {
                        return Err(MinimError::InvalidRanks(format!("rank {r} listed twice")));
                    }
                }
                ranks.to_vec()
            }
        };

        let chunk = ndof.div_ceil(owners.len()).max(1);
        let mut ranges = vec![0..0; nproc];
        for (k, &r) in owners.iter().enumerate() {
            let start = (k * chunk).min(ndof);
            let end = ((k + 1) * chunk).min(ndof);
            ranges[r] = start..end;
        }
        Ok(Partition { ndof, chunk, owners, ranges })
    }

    pub fn ndof(&self) -> usize {
        self.ndof
    }

    pub fn nproc(&self) -> usize {
        self.ranges.len()
    }

    pub fn owners(&self) -> &[usize] {
        &self.owners
    }

    /// Transport rank holding global index `i`.
    pub fn owner(&self, i: usize) -> Result<usize> {
        if i >= self.ndof {
            return Err(MinimError::IndexOutOfRange { index: i, ndof: self.ndof });
        }
        Ok(self.owners[i / self.chunk])
    }

    pub fn range(&self, rank: usize) -> Range<usize> {
        self.ranges.get(rank).cloned().unwrap_or(0..0)
    }

    pub fn nblock(&self, rank: usize) -> usize {
        self.range(rank).len()
    }

    /// Block lengths indexed by transport rank.
    pub fn counts(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.len()).collect()
    }

    /// Reorder a buffer laid out as blocks concatenated in transport-rank
    /// order into global index order.
    pub(crate) fn from_rank_order(&self, buf: &[f64]) -> Vec<f64> {
        if self.is_rank_ordered() {
            return buf.to_vec();
        }
        let mut out = vec![0.0; self.ndof];
        let mut offset = 0;
        for range in &self.ranges {
            out[range.clone()].copy_from_slice(&buf[offset..offset + range.len()]);
            offset += range.len();
        }
        out
    }

    /// Inverse of [`Partition::from_rank_order`].
    pub(crate) fn to_rank_order(&self, global: &[f64]) -> Vec<f64> {
        if self.is_rank_ordered() {
            return global.to_vec();
        }
        self.ranges.iter().flat_map(|range| global[range.clone()].iter().copied()).collect()
    }

    fn is_rank_ordered(&self) -> bool {
        self.owners.windows(2).all(|w| w[0] < w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_cover_every_index_once() {
        for ndof in 0..40 {
            for nproc in 1..7 {
                let p = Partition::new(ndof, nproc, None).unwrap();
                let mut next = 0;
                for rank in 0..nproc {
                    let range = p.range(rank);
                    assert_eq!(range.start, next);
                    for i in range.clone() {
                        assert_eq!(p.owner(i).unwrap(), rank);
                    }
                    next = range.end;
                }
                assert_eq!(p.counts().iter().sum::<usize>(), ndof);
            }
        }
    }

    #[test]
    fn last_block_takes_the_remainder() {
        let p = Partition::new(10, 4, None).unwrap();
        assert_eq!(p.owners(), &[0, 1, 2, 3]);
        assert_eq!(p.counts(), vec![3, 3, 3, 1]);
    }

    #[test]
    fn subset_of_ranks_owns_in_listed_order() {
        let p = Partition::new(6, 4, Some(&[3, 1])).unwrap();
        assert_eq!(p.owners(), &[3, 1]);
        assert_eq!(p.counts(), vec![0, 3, 0, 3]);
        assert_eq!(p.range(3), 0..3);
        assert_eq!(p.range(1), 3..6);
        assert_eq!(p.owner(4).unwrap(), 1);

        let global: Vec<f64> = (0..6).map(f64::from).collect();
        let by_rank = p.to_rank_order(&global);
        assert_eq!(by_rank, vec![3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
        assert_eq!(p.from_rank_order(&by_rank), global);
    }

    #[test]
    fn invalid_rank_lists_are_rejected() {
        assert!(matches!(Partition::new(4, 2, Some(&[])), Err(MinimError::InvalidRanks(_))));
        assert!(matches!(Partition::new(4, 2, Some(&[2])), Err(MinimError::InvalidRanks(_))));
        assert!(matches!(Partition::new(4, 2, Some(&[1, 1])), Err(MinimError::InvalidRanks(_))));
    }

    #[test]
    fn owner_out_of_range() {
        let p = Partition::new(4, 2, None).unwrap();
        assert!(matches!(p.owner(4), Err(MinimError::IndexOutOfRange { index: 4, ndof: 4 })));
    }
}
