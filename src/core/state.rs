//! Per-rank optimisation state.

use std::sync::Arc;

use crate::communicator::Communicator;
use crate::core::potential::Potential;
use crate::error::{MinimError, Result};
use crate::parallel::UniverseComm;

/// Default RMS-gradient threshold below which a minimiser stops.
pub const DEFAULT_CONVERGENCE: f64 = 1e-6;

/// The coordinates one rank owns, bound to a potential and a communicator.
///
/// Only the owned block is ever mutated. Halo values are refreshed by a halo
/// exchange at the start of every energy or gradient evaluation, so they are
/// never stale after [`State::set_block_coords`].
pub struct State {
    pub comm: Arc<Communicator>,
    pub ndof: usize,
    /// RMS-gradient convergence threshold.
    pub convergence: f64,
    potential: Arc<Potential>,
    /// Local layout: owned block then halo values.
    coords: Vec<f64>,
}

impl State {
    pub(crate) fn new(
        potential: Arc<Potential>,
        coords: &[f64],
        transport: UniverseComm,
        ranks: Option<&[usize]>,
    ) -> Result<Self> {
        potential.check_elements()?;
        let elements = if potential.parallel_def() { potential.elements() } else { &[] };
        let comm = Communicator::new(transport, coords.len(), elements, ranks)?;
        let block = comm.assign_block(coords)?;
        Ok(State {
            comm: Arc::new(comm),
            ndof: coords.len(),
            convergence: DEFAULT_CONVERGENCE,
            potential,
            coords: block,
        })
    }

    pub fn potential(&self) -> &Arc<Potential> {
        &self.potential
    }

    pub fn set_convergence(&mut self, convergence: f64) -> &mut Self {
        self.convergence = convergence;
        self
    }

    /// Total energy, identical on every rank. Collective.
    ///
    /// Halo elements never contribute here; each element's energy is counted
    /// once, by its owner.
    pub fn energy(&mut self) -> Result<f64> {
        if self.potential.parallel_def() {
            self.comm.communicate(&mut self.coords);
            let mut e = 0.0;
            let local = self.comm.args().elements.iter().try_for_each(|el| {
                self.potential.element_energy_gradient(&self.coords, el, Some(&mut e), None)
            });
            self.comm.agree(local)?;
            Ok(self.comm.sum(e))
        } else {
            let full = self.comm.gather(&self.coords, None)?;
            self.potential.energy(&full)
        }
    }

    /// Gradient restricted to the owned block. Collective.
    ///
    /// Owned and halo elements both contribute, so every owned entry carries
    /// the contributions of all elements touching it.
    pub fn block_gradient(&mut self) -> Result<Vec<f64>> {
        if self.potential.parallel_def() {
            self.comm.communicate(&mut self.coords);
            let args = self.comm.args();
            let mut g = vec![0.0; args.nlocal];
            let local = args.elements.iter().chain(&args.elements_halo).try_for_each(|el| {
                self.potential.element_energy_gradient(&self.coords, el, None, Some(&mut g))
            });
            self.comm.agree(local)?;
            g.truncate(self.comm.nblock());
            Ok(g)
        } else {
            let full = self.comm.gather(&self.coords, None)?;
            let g = self.potential.gradient(&full)?;
            self.comm.assign_block(&g)
        }
    }

    /// Full gradient, replicated on every rank. Collective.
    pub fn gradient(&mut self) -> Result<Vec<f64>> {
        let block = self.block_gradient()?;
        self.comm.gather(&block, None)
    }

    pub fn block_coords(&self) -> &[f64] {
        &self.coords[..self.comm.nblock()]
    }

    pub fn set_block_coords(&mut self, block: &[f64]) -> Result<()> {
        let nblock = self.comm.nblock();
        if block.len() != nblock {
            return Err(MinimError::SizeMismatch { what: "block coordinates", expected: nblock, got: block.len() });
        }
        self.coords[..nblock].copy_from_slice(block);
        Ok(())
    }

    /// Full coordinate vector, replicated on every rank. Collective.
    pub fn coords(&self) -> Result<Vec<f64>> {
        self.comm.gather(&self.coords, None)
    }

    /// Replace the coordinates from a global vector every rank holds.
    pub fn set_coords(&mut self, coords: &[f64]) -> Result<()> {
        let block = self.comm.assign_block(coords)?;
        self.set_block_coords(&block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Element;

    fn spring(coords: &[f64], el: &Element, e: Option<&mut f64>, g: Option<&mut [f64]>) -> Result<()> {
        let (a, b) = (el.idof[0], el.idof[1]);
        let d = coords[a] - coords[b];
        if let Some(e) = e {
            *e += 0.5 * d * d;
        }
        if let Some(g) = g {
            g[a] += d;
            g[b] -= d;
        }
        Ok(())
    }

    #[test]
    fn element_mode_on_one_rank() {
        let elements = vec![Element::new(0, vec![0, 1], vec![]), Element::new(0, vec![1, 2], vec![])];
        let pot = Arc::new(Potential::with_elements(spring, elements));
        let mut state = pot.new_state(&[0.0, 1.0, 3.0], UniverseComm::Serial).unwrap();
        assert_eq!(state.energy().unwrap(), 2.5);
        assert_eq!(state.gradient().unwrap(), vec![-1.0, -1.0, 2.0]);
    }

    #[test]
    fn whole_vector_mode_on_one_rank() {
        let pot = Arc::new(Potential::new(|x: &[f64]| x[0] * x[0], |x: &[f64]| vec![2.0 * x[0]]));
        let mut state = pot.new_state(&[3.0], UniverseComm::Serial).unwrap();
        assert_eq!(state.energy().unwrap(), 9.0);
        state.set_block_coords(&[1.0]).unwrap();
        assert_eq!(state.block_gradient().unwrap(), vec![2.0]);
    }

    #[test]
    fn block_setter_checks_length() {
        let pot = Arc::new(Potential::new(|_: &[f64]| 0.0, |x: &[f64]| vec![0.0; x.len()]));
        let mut state = pot.new_state_zeroed(2, UniverseComm::Serial).unwrap();
        assert!(matches!(
            state.set_block_coords(&[1.0]),
            Err(MinimError::SizeMismatch { expected: 2, got: 1, .. })
        ));
        assert_eq!(state.convergence, DEFAULT_CONVERGENCE);
    }
}
