//! Factory for minimisers.
//!
//! `MinimiserContext` selects a minimiser by [`MinimiserKind`], carries the
//! parameters of every kind, and runs it on a [`State`].
//!
//! # Usage
//!
//! 1. Build a context with the desired kind (defaults for everything else).
//! 2. Adjust `max_iter` or the per-kind option structs.
//! 3. Call [`MinimiserContext::run`] on every rank.

use crate::config::{GradDescentOptions, LbfgsOptions};
use crate::core::State;
use crate::error::Result;
use crate::minimiser::{GradDescent, Lbfgs, Minimiser};
use crate::utils::convergence::MinimiseStats;

/// The available minimisers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimiserKind {
    /// Fixed-step steepest descent
    GradDescent,
    /// Limited-memory BFGS with backtracking line search
    Lbfgs,
}

#[derive(Debug, Clone)]
pub struct MinimiserContext {
    pub kind: MinimiserKind,
    /// Overrides the per-kind iteration cap when set.
    pub max_iter: Option<usize>,
    pub grad_descent: GradDescentOptions,
    pub lbfgs: LbfgsOptions,
}

impl MinimiserContext {
    pub fn new(kind: MinimiserKind) -> Self {
        MinimiserContext {
            kind,
            max_iter: None,
            grad_descent: GradDescentOptions::default(),
            lbfgs: LbfgsOptions::default(),
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    /// Build the selected minimiser.
    pub fn build(&self) -> Box<dyn Minimiser> {
        match self.kind {
            MinimiserKind::GradDescent => {
                let mut options = self.grad_descent.clone();
                if let Some(max_iter) = self.max_iter {
                    options.max_iter = max_iter;
                }
                Box::new(GradDescent::with_options(options))
            }
            MinimiserKind::Lbfgs => {
                let mut options = self.lbfgs.clone();
                if let Some(max_iter) = self.max_iter {
                    options.max_iter = max_iter;
                }
                Box::new(Lbfgs::with_options(options))
            }
        }
    }

    /// Minimise `state` with the selected minimiser. Collective.
    pub fn run(&self, state: &mut State) -> Result<MinimiseStats<f64>> {
        self.build().minimise(state)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::Potential;
    use crate::parallel::UniverseComm;

    #[test]
    fn both_kinds_find_the_parabola_minimum() {
        let pot = Arc::new(Potential::new(
            |x: &[f64]| (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2),
            |x: &[f64]| vec![2.0 * (x[0] - 1.0), 4.0 * (x[1] + 0.5)],
        ));
        for kind in [MinimiserKind::GradDescent, MinimiserKind::Lbfgs] {
            let mut ctx = MinimiserContext::new(kind).with_max_iter(5000);
            ctx.grad_descent.alpha = 0.1;
            let mut state = pot.new_state(&[0.0, 0.0], UniverseComm::Serial).unwrap();
            let stats = ctx.run(&mut state).unwrap();
            assert!(stats.converged(), "{kind:?} did not converge: {stats:?}");
            let x = state.coords().unwrap();
            assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(x[1], -0.5, epsilon = 1e-5);
        }
    }
}
