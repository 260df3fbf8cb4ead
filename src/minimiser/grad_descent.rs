//! Fixed-step steepest descent.
//!
//! Each rank updates its own block with `x -= alpha * g`; the only
//! collectives are the gradient evaluation and the RMS reduction. Mostly
//! useful as a reference to check [`Lbfgs`](super::Lbfgs) against.

use log::trace;

use crate::config::GradDescentOptions;
use crate::core::State;
use crate::error::Result;
use crate::minimiser::{Minimiser, MinimiserBase};
use crate::utils::convergence::rms;
use crate::utils::vec::axpy;

#[derive(Debug)]
pub struct GradDescent {
    base: MinimiserBase,
    alpha: f64,
    /// Block gradient of the last iteration.
    g: Vec<f64>,
}

impl GradDescent {
    pub fn new() -> Self {
        Self::with_options(GradDescentOptions::default())
    }

    pub fn with_options(options: GradDescentOptions) -> Self {
        GradDescent { base: MinimiserBase::new(options.max_iter), alpha: options.alpha, g: Vec::new() }
    }

    pub fn set_alpha(&mut self, alpha: f64) -> &mut Self {
        self.alpha = alpha;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for GradDescent {
    fn default() -> Self {
        Self::new()
    }
}

impl Minimiser for GradDescent {
    fn base(&self) -> &MinimiserBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MinimiserBase {
        &mut self.base
    }

    fn init(&mut self, _state: &mut State) -> Result<()> {
        self.g.clear();
        Ok(())
    }

    fn iteration(&mut self, state: &mut State) -> Result<()> {
        self.g = state.block_gradient()?;
        let mut block = state.block_coords().to_vec();
        axpy(-self.alpha, &self.g, &mut block);
        state.set_block_coords(&block)
    }

    fn check_convergence(&mut self, state: &State) -> Result<bool> {
        let rms_gradient = rms(state.comm.dot_product(&self.g, &self.g)?, state.ndof);
        trace!("iteration {}: rms gradient {:.3e}", self.base.iter, rms_gradient);
        Ok(rms_gradient < state.convergence)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::Potential;
    use crate::parallel::UniverseComm;
    use crate::utils::Status;

    #[test]
    fn one_step_on_a_parabola() {
        let pot = Arc::new(Potential::new(|x: &[f64]| x[0] * x[0], |x: &[f64]| vec![2.0 * x[0]]));
        let mut state = pot.new_state(&[1.0], UniverseComm::Serial).unwrap();
        let mut gd = GradDescent::new();
        gd.set_alpha(0.25);
        gd.iteration(&mut state).unwrap();
        assert_abs_diff_eq!(state.block_coords()[0], 0.5, epsilon = 1e-15);
    }

    #[test]
    fn max_iter_is_reported() {
        let pot = Arc::new(Potential::new(|x: &[f64]| x[0] * x[0], |x: &[f64]| vec![2.0 * x[0]]));
        let mut state = pot.new_state(&[1.0], UniverseComm::Serial).unwrap();
        let mut gd = GradDescent::new();
        gd.set_max_iter(3);
        let stats = gd.minimise(&mut state).unwrap();
        assert_eq!(stats.status, Status::MaxIterReached);
        assert_eq!(stats.iterations, 3);
        assert_eq!(gd.status(), Status::MaxIterReached);
    }
}
