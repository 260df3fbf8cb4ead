//! Limited-memory BFGS with a root-held history.
//!
//! The two-loop recursion runs sequentially over full-length vectors, so the
//! curvature history and the full gradient live on rank 0 only. Each
//! iteration:
//!
//! 1. rank 0 computes the search direction from its history;
//! 2. the direction is scattered into blocks;
//! 3. rank 0 computes `de0 = g . d` and broadcasts it;
//! 4. every rank takes part in the backtracking line search on its block;
//! 5. the new gradient is gathered on rank 0, which stores the pair
//!    `s = t d`, `y = g_new - g` unless `s . y == 0`.
//!
//! Convergence is decided on rank 0 from the latest gradient and broadcast.

use faer::{ColRef, Mat};
use log::debug;

use crate::config::{LbfgsOptions, LineSearchOptions};
use crate::core::State;
use crate::error::Result;
use crate::minimiser::linesearch::backtracking;
use crate::minimiser::{Minimiser, MinimiserBase};
use crate::utils::convergence::rms;
use crate::utils::vec::{difference, dot, scaled};

const ROOT: usize = 0;

/// Circular buffer of the `m` most recent curvature pairs.
///
/// Pairs are stored column-wise; slot `stored % m` is overwritten next.
#[derive(Debug, Clone)]
pub struct LbfgsHistory {
    s: Mat<f64>,
    y: Mat<f64>,
    rho: Vec<f64>,
    stored: usize,
}

impl LbfgsHistory {
    pub fn new(ndof: usize, m: usize) -> Self {
        LbfgsHistory { s: Mat::zeros(ndof, m), y: Mat::zeros(ndof, m), rho: vec![0.0; m], stored: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.rho.len()
    }

    /// Number of valid pairs.
    pub fn len(&self) -> usize {
        self.stored.min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }

    /// Slot the next accepted pair is written to.
    pub fn cursor(&self) -> usize {
        self.stored % self.capacity()
    }

    /// The pair in `slot` as `(s, y, rho)`.
    pub fn pair(&self, slot: usize) -> (Vec<f64>, Vec<f64>, f64) {
        let column = |c: ColRef<'_, f64>| -> Vec<f64> { c.iter().copied().collect() };
        (column(self.s.col(slot)), column(self.y.col(slot)), self.rho[slot])
    }

    /// Store `(s, y)` unless `s . y` is exactly zero. Returns whether the pair
    /// was stored; a rejected pair leaves the history untouched.
    pub fn push(&mut self, s: &[f64], y: &[f64]) -> bool {
        let sy = dot(s, y);
        if sy == 0.0 {
            return false;
        }
        let slot = self.cursor();
        for (dst, &v) in self.s.col_mut(slot).iter_mut().zip(s) {
            *dst = v;
        }
        for (dst, &v) in self.y.col_mut(slot).iter_mut().zip(y) {
            *dst = v;
        }
        self.rho[slot] = 1.0 / sy;
        self.stored += 1;
        true
    }

    /// Quasi-Newton descent direction for gradient `g` by two-loop recursion.
    /// Falls back to `-init_hessian * g` while the history is empty.
    pub fn direction(&self, g: &[f64], init_hessian: f64) -> Vec<f64> {
        let k = self.len();
        if k == 0 {
            return scaled(-init_hessian, g);
        }
        let m = self.capacity();
        let cursor = self.cursor();
        let mut alpha = vec![0.0; m];
        let mut r = scaled(-1.0, g);

        for i1 in 0..k {
            let i = (cursor + m - 1 - i1) % m;
            alpha[i] = self.rho[i] * col_dot(self.s.col(i), &r);
            col_axpy(-alpha[i], self.y.col(i), &mut r);
        }

        let newest = (cursor + m - 1) % m;
        let gamma = 1.0 / (self.rho[newest] * self.y.col(newest).squared_norm_l2());
        for v in r.iter_mut() {
            *v *= gamma;
        }

        for i1 in 0..k {
            let i = (cursor + m - k + i1) % m;
            let beta = self.rho[i] * col_dot(self.y.col(i), &r);
            col_axpy(alpha[i] - beta, self.s.col(i), &mut r);
        }

        if dot(&r, g) > 0.0 {
            for v in r.iter_mut() {
                *v = -*v;
            }
        }
        r
    }
}

fn col_dot(col: ColRef<'_, f64>, v: &[f64]) -> f64 {
    col.iter().zip(v).map(|(&c, &x)| c * x).sum()
}

/// `v += a * col`
fn col_axpy(a: f64, col: ColRef<'_, f64>, v: &mut [f64]) {
    for (x, &c) in v.iter_mut().zip(col.iter()) {
        *x += a * c;
    }
}

pub struct Lbfgs {
    base: MinimiserBase,
    options: LbfgsOptions,
    /// Present on rank 0 only.
    history: Option<LbfgsHistory>,
    /// Full gradient at the current point; rank 0 only.
    g: Vec<f64>,
}

impl Lbfgs {
    pub fn new() -> Self {
        Self::with_options(LbfgsOptions::default())
    }

    pub fn with_options(options: LbfgsOptions) -> Self {
        Lbfgs { base: MinimiserBase::new(options.max_iter), options, history: None, g: Vec::new() }
    }

    pub fn set_m(&mut self, m: usize) -> &mut Self {
        self.options.m = m;
        self
    }

    pub fn set_init_hessian(&mut self, init_hessian: f64) -> &mut Self {
        self.options.init_hessian = init_hessian;
        self
    }

    pub fn set_line_search(&mut self, line_search: LineSearchOptions) -> &mut Self {
        self.options.line_search = line_search;
        self
    }

    pub fn options(&self) -> &LbfgsOptions {
        &self.options
    }

    /// The curvature history; `None` off the root rank or before `init`.
    pub fn history(&self) -> Option<&LbfgsHistory> {
        self.history.as_ref()
    }
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self::new()
    }
}

impl Minimiser for Lbfgs {
    fn base(&self) -> &MinimiserBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MinimiserBase {
        &mut self.base
    }

    fn init(&mut self, state: &mut State) -> Result<()> {
        self.options.validate()?;
        self.history = state.comm.is_root().then(|| LbfgsHistory::new(state.ndof, self.options.m));
        self.g.clear();
        Ok(())
    }

    fn iteration(&mut self, state: &mut State) -> Result<()> {
        if self.base.iter == 0 {
            let block = state.block_gradient()?;
            self.g = state.comm.gather(&block, Some(ROOT))?;
        }

        let direction = match &self.history {
            Some(history) => history.direction(&self.g, self.options.init_hessian),
            None => Vec::new(),
        };
        let direction_block = state.comm.scatter(&direction, Some(ROOT))?;

        let mut de0 = if state.comm.is_root() { dot(&self.g, &direction) } else { 0.0 };
        state.comm.bcast(&mut de0, ROOT);

        let outcome = backtracking(state, &direction_block, de0, &self.options.line_search)?;
        if !outcome.success {
            self.base.failed_line_searches += 1;
        }

        let block = state.block_gradient()?;
        let g_new = state.comm.gather(&block, Some(ROOT))?;

        if let Some(history) = self.history.as_mut() {
            let s = scaled(outcome.step, &direction);
            let y = difference(&g_new, &self.g);
            if !history.push(&s, &y) {
                self.base.rejected_pairs += 1;
                debug!("iteration {}: curvature pair rejected (s . y = 0)", self.base.iter);
            }
            debug!(
                "iteration {}: energy {:.10e}, step {:.3e}, {} line-search evaluations",
                self.base.iter, outcome.energy, outcome.step, outcome.evaluations
            );
            self.g = g_new;
        }
        Ok(())
    }

    fn check_convergence(&mut self, state: &State) -> Result<bool> {
        let mut rms_gradient = if state.comm.is_root() { rms(dot(&self.g, &self.g), state.ndof) } else { 0.0 };
        state.comm.bcast(&mut rms_gradient, ROOT);
        Ok(rms_gradient < state.convergence)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn empty_history_gives_scaled_steepest_descent() {
        let history = LbfgsHistory::new(3, 4);
        let g = [1.0, -2.0, 0.5];
        let d = history.direction(&g, 1e-4);
        for (di, gi) in d.iter().zip(g) {
            assert_eq!(*di, -1e-4 * gi);
        }
    }

    #[test]
    fn zero_curvature_pair_is_a_no_op() {
        let mut history = LbfgsHistory::new(2, 3);
        assert!(history.push(&[1.0, 0.0], &[2.0, 0.0]));
        let before = history.clone();
        assert!(!history.push(&[1.0, 0.0], &[0.0, 5.0]));
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), before.cursor());
        for slot in 0..3 {
            assert_eq!(history.pair(slot), before.pair(slot));
        }
    }

    #[test]
    fn cursor_wraps_and_len_saturates() {
        let mut history = LbfgsHistory::new(1, 2);
        for k in 1..=3 {
            assert!(history.push(&[k as f64], &[1.0]));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.pair(0).0, vec![3.0]);
    }

    #[test]
    fn one_pair_recovers_exact_newton_step_in_1d() {
        // E = 2 x^2: y = 4 s, so the secant inverse Hessian is exactly 1/4
        let mut history = LbfgsHistory::new(1, 5);
        history.push(&[0.5], &[2.0]);
        let d = history.direction(&[8.0], 1e-4);
        assert_abs_diff_eq!(d[0], -2.0, epsilon = 1e-14);
    }

    #[test]
    fn direction_is_always_descent() {
        let mut history = LbfgsHistory::new(2, 2);
        // negative curvature pair
        history.push(&[1.0, 0.0], &[-1.0, 0.0]);
        let g = [1.0, 1.0];
        let d = history.direction(&g, 1.0);
        assert!(dot(&d, &g) <= 0.0);
    }
}
