//! Minimisers and the iteration driver they share.
//!
//! A minimiser supplies one step ([`Minimiser::iteration`]) and a convergence
//! test ([`Minimiser::check_convergence`]); [`Minimiser::minimise`] drives
//! them until convergence or the iteration cap. Both hooks are collectives:
//! every rank runs the same loop, and convergence decisions are made from
//! values that are identical on all ranks, so ranks leave the loop together.
//!
//! Available minimisers:
//! - [`GradDescent`]: fixed-step steepest descent.
//! - [`Lbfgs`]: limited-memory BFGS with backtracking line search.

pub mod grad_descent;
pub mod lbfgs;
pub mod linesearch;

pub use grad_descent::GradDescent;
pub use lbfgs::{Lbfgs, LbfgsHistory};
pub use linesearch::{backtracking, LineSearchOutcome};

use log::info;

use crate::core::State;
use crate::error::Result;
use crate::utils::convergence::{rms, MinimiseStats, Status};

/// Called at the start of every iteration with the iteration number.
pub type AdjustModel = Box<dyn FnMut(usize, &mut State)>;

/// Bookkeeping common to every minimiser.
pub struct MinimiserBase {
    pub iter: usize,
    pub max_iter: usize,
    pub status: Status,
    pub rejected_pairs: usize,
    pub failed_line_searches: usize,
    adjust_model: Option<AdjustModel>,
}

impl MinimiserBase {
    pub fn new(max_iter: usize) -> Self {
        MinimiserBase {
            iter: 0,
            max_iter,
            status: Status::Created,
            rejected_pairs: 0,
            failed_line_searches: 0,
            adjust_model: None,
        }
    }
}

impl std::fmt::Debug for MinimiserBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinimiserBase")
            .field("iter", &self.iter)
            .field("max_iter", &self.max_iter)
            .field("status", &self.status)
            .field("adjust_model", &self.adjust_model.is_some())
            .finish()
    }
}

pub trait Minimiser {
    fn base(&self) -> &MinimiserBase;
    fn base_mut(&mut self) -> &mut MinimiserBase;

    /// Prepare for a fresh run on `state`.
    fn init(&mut self, _state: &mut State) -> Result<()> {
        Ok(())
    }

    /// Move `state` one step toward lower energy.
    fn iteration(&mut self, state: &mut State) -> Result<()>;

    /// Whether the last step reached the RMS-gradient threshold. The answer
    /// is identical on every rank.
    fn check_convergence(&mut self, state: &State) -> Result<bool>;

    fn set_max_iter(&mut self, max_iter: usize) -> &mut Self
    where
        Self: Sized,
    {
        self.base_mut().max_iter = max_iter;
        self
    }

    /// Install a callback run at the start of every iteration on every rank.
    fn set_adjust_model<F>(&mut self, adjust_model: F) -> &mut Self
    where
        Self: Sized,
        F: FnMut(usize, &mut State) + 'static,
    {
        self.base_mut().adjust_model = Some(Box::new(adjust_model));
        self
    }

    fn status(&self) -> Status {
        self.base().status
    }

    /// Run until convergence or `max_iter` iterations. Collective.
    fn minimise(&mut self, state: &mut State) -> Result<MinimiseStats<f64>> {
        self.init(state)?;
        {
            let base = self.base_mut();
            base.iter = 0;
            base.rejected_pairs = 0;
            base.failed_line_searches = 0;
            base.status = Status::Running;
        }

        let mut status = Status::MaxIterReached;
        while self.base().iter < self.base().max_iter {
            let iter = self.base().iter;
            if let Some(adjust_model) = self.base_mut().adjust_model.as_mut() {
                adjust_model(iter, state);
            }
            self.iteration(state)?;
            let converged = self.check_convergence(state)?;
            self.base_mut().iter += 1;
            if converged {
                status = Status::Converged;
                break;
            }
        }
        self.base_mut().status = status;

        let energy = state.energy()?;
        let g = state.block_gradient()?;
        let rms_gradient = rms(state.comm.dot_product(&g, &g)?, state.ndof);
        let base = self.base();
        if state.comm.is_root() {
            info!(
                "minimisation finished: {:?} after {} iterations, energy {:.10e}, rms gradient {:.3e}",
                status, base.iter, energy, rms_gradient
            );
        }
        Ok(MinimiseStats {
            iterations: base.iter,
            energy,
            rms_gradient,
            status,
            rejected_pairs: base.rejected_pairs,
            failed_line_searches: base.failed_line_searches,
        })
    }
}
