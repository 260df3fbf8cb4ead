//! Backtracking line search on the Armijo sufficient-decrease condition.
//!
//! Searches for `t` such that `E(x + t d) <= E(x) + c t de0`, where `de0` is
//! the directional derivative along the full direction `d`. Every trial is a
//! distributed energy evaluation; since energies and `de0` are identical on
//! every rank, all ranks accept or reject the same trials.

use log::{trace, warn};

use crate::config::LineSearchOptions;
use crate::core::State;
use crate::error::Result;

/// Result of one line search. On failure the state is left at the lowest
/// energy point seen (the starting point when no trial improved on it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome {
    /// Accepted step multiplier.
    pub step: f64,
    /// Energy at the accepted point.
    pub energy: f64,
    /// Trial energy evaluations.
    pub evaluations: usize,
    pub success: bool,
}

/// Backtrack along the block `direction` from the current coordinates.
/// Collective.
pub fn backtracking(
    state: &mut State,
    direction: &[f64],
    de0: f64,
    options: &LineSearchOptions,
) -> Result<LineSearchOutcome> {
    let x0 = state.block_coords().to_vec();
    let e0 = state.energy()?;
    let mut trial = x0.clone();
    let mut best = (0.0, e0);
    let mut evaluations = 0;
    let mut t = options.initial_step;

    while t >= options.min_step {
        move_along(&mut trial, &x0, direction, t);
        state.set_block_coords(&trial)?;
        let e = state.energy()?;
        evaluations += 1;
        trace!("line search: t = {t:.3e}, energy = {e:.10e}");
        if e <= e0 + options.c * t * de0 {
            return Ok(LineSearchOutcome { step: t, energy: e, evaluations, success: true });
        }
        if e < best.1 {
            best = (t, e);
        }
        t *= options.shrink;
    }

    let (step, energy) = best;
    move_along(&mut trial, &x0, direction, step);
    state.set_block_coords(&trial)?;
    if state.comm.is_root() {
        warn!("line search reached minimum step {:.1e}; keeping step {step:.3e}", options.min_step);
    }
    Ok(LineSearchOutcome { step, energy, evaluations, success: false })
}

fn move_along(out: &mut [f64], x0: &[f64], direction: &[f64], t: f64) {
    for ((o, &x), &d) in out.iter_mut().zip(x0).zip(direction) {
        *o = x + t * d;
    }
}
