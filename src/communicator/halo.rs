//! Halo bookkeeping for element-decomposed potentials.
//!
//! Every rank walks the full element list and derives the same global
//! picture: an element belongs to the rank owning its first DOF, and every
//! other rank owning one of its DOFs keeps a read-only halo copy of it. Each
//! rank that evaluates an element needs all of that element's DOF values, so
//! a DOF value crosses from its owner to every such rank. Because send and
//! receive lists are built from the same rule on both sides, they agree in
//! content and in (ascending global) order without any negotiation.
//!
//! Local storage is `[owned block | halo values]`, halo values sorted by
//! global index. Element `idof` entries are rewritten into that layout.

use std::collections::BTreeSet;

use log::debug;

use crate::communicator::partition::Partition;
use crate::core::{Args, Element};
use crate::error::{MinimError, Result};
use crate::parallel::Comm;

#[derive(Clone, Debug)]
pub struct HaloPlan {
    block_start: usize,
    nblock: usize,
    /// Global indices of the halo values, ascending.
    halo: Vec<usize>,
    /// Per destination rank: local positions of owned values to send.
    send: Vec<Vec<usize>>,
    /// Per source rank: local positions of halo values to fill.
    recv: Vec<Vec<usize>>,
    /// True when some element spans more than one rank. Identical on every
    /// rank, so either every rank exchanges or none does.
    active: bool,
}

impl HaloPlan {
    /// Build the plan for rank `me` and split `elements` into the ones it owns
    /// and the ones it mirrors.
    pub fn build(partition: &Partition, me: usize, elements: &[Element]) -> Result<(Self, Args)> {
        let nproc = partition.nproc();
        let mut need = BTreeSet::new();
        let mut send: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nproc];
        let mut active = false;
        let mut owned = Vec::new();
        let mut mirrored = Vec::new();

        for el in elements {
            let first = *el.idof.first().ok_or_else(|| {
                MinimError::Config(format!("element {} has no degrees of freedom", el.id))
            })?;
            let owner = partition.owner(first)?;
            let owners = el
                .idof
                .iter()
                .map(|&i| partition.owner(i))
                .collect::<Result<Vec<usize>>>()?;
            let mut touched: Vec<usize> = owners.clone();
            touched.sort_unstable();
            touched.dedup();
            if touched.len() > 1 {
                active = true;
                for &p in &touched {
                    for (&i, &o) in el.idof.iter().zip(&owners) {
                        if o == p {
                            continue;
                        }
                        if p == me {
                            need.insert(i);
                        }
                        if o == me {
                            send[p].insert(i);
                        }
                    }
                }
            }
            if owner == me {
                owned.push(el);
            } else if touched.binary_search(&me).is_ok() {
                mirrored.push(el);
            }
        }

        let range = partition.range(me);
        let halo: Vec<usize> = need.into_iter().collect();
        let mut plan = HaloPlan {
            block_start: range.start,
            nblock: range.len(),
            halo,
            send: Vec::with_capacity(nproc),
            recv: vec![Vec::new(); nproc],
            active,
        };
        for set in send {
            plan.send.push(set.into_iter().map(|i| i - plan.block_start).collect());
        }
        for (k, &i) in plan.halo.iter().enumerate() {
            let from = partition.owner(i)?;
            plan.recv[from].push(plan.nblock + k);
        }

        let local = Args {
            ndof: partition.ndof(),
            nlocal: plan.nlocal(),
            elements: owned.into_iter().map(|el| plan.localise(el)).collect::<Result<_>>()?,
            elements_halo: mirrored.into_iter().map(|el| plan.localise(el)).collect::<Result<_>>()?,
        };
        debug!(
            "rank {me}: {} owned DOFs, {} halo DOFs, {} owned elements, {} halo elements",
            plan.nblock,
            plan.halo.len(),
            local.elements.len(),
            local.elements_halo.len()
        );
        Ok((plan, local))
    }

    pub fn nblock(&self) -> usize {
        self.nblock
    }

    pub fn nhalo(&self) -> usize {
        self.halo.len()
    }

    pub fn nlocal(&self) -> usize {
        self.nblock + self.halo.len()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Local storage position of global index `i`, if this rank holds it.
    pub fn local_index(&self, i: usize) -> Option<usize> {
        if (self.block_start..self.block_start + self.nblock).contains(&i) {
            Some(i - self.block_start)
        } else {
            self.halo.binary_search(&i).ok().map(|k| self.nblock + k)
        }
    }

    fn localise(&self, el: &Element) -> Result<Element> {
        let idof = el
            .idof
            .iter()
            .map(|&i| self.local_index(i).ok_or(MinimError::NotLocal(i)))
            .collect::<Result<Vec<usize>>>()?;
        Ok(Element { id: el.id, kind: el.kind, idof, parameters: el.parameters.clone() })
    }

    /// Refresh the halo region of `vector` from the owning ranks.
    pub fn exchange<C: Comm + ?Sized>(&self, comm: &C, vector: &mut Vec<f64>) {
        vector.resize(self.nlocal(), 0.0);
        if !self.active {
            return;
        }
        let outgoing: Vec<Vec<f64>> =
            self.send.iter().map(|positions| positions.iter().map(|&k| vector[k]).collect()).collect();
        let counts: Vec<usize> = self.recv.iter().map(Vec::len).collect();
        let incoming = comm.exchange(&outgoing, &counts);
        for (positions, values) in self.recv.iter().zip(incoming) {
            for (&k, v) in positions.iter().zip(values) {
                vector[k] = v;
            }
        }
    }
}
