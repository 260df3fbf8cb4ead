//! Tuning options for the minimisers and the line search.
//!
//! Plain structs with `Default` impls; the minimisers also expose setters for
//! the individual fields.

use crate::error::{MinimError, Result};

/// Backtracking line-search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchOptions {
    /// Sufficient-decrease constant of the Armijo condition.
    pub c: f64,
    /// Factor the step multiplier is scaled by after each rejected trial.
    pub shrink: f64,
    /// First step multiplier tried.
    pub initial_step: f64,
    /// The search fails once the step multiplier drops below this.
    pub min_step: f64,
}

impl Default for LineSearchOptions {
    fn default() -> Self {
        LineSearchOptions { c: 1e-4, shrink: 0.5, initial_step: 1.0, min_step: 1e-10 }
    }
}

impl LineSearchOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.shrink > 0.0 && self.shrink < 1.0) {
            return Err(MinimError::Config(format!("line-search shrink factor {} not in (0, 1)", self.shrink)));
        }
        if !(self.min_step > 0.0) {
            return Err(MinimError::Config(format!("line-search minimum step {} must be positive", self.min_step)));
        }
        if !(self.initial_step >= self.min_step) {
            return Err(MinimError::Config(format!(
                "line-search initial step {} below minimum step {}",
                self.initial_step, self.min_step
            )));
        }
        Ok(())
    }
}

/// L-BFGS parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsOptions {
    /// Number of curvature pairs kept.
    pub m: usize,
    /// Scale of the diagonal initial inverse Hessian used before any pair is stored.
    pub init_hessian: f64,
    pub max_iter: usize,
    pub line_search: LineSearchOptions,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        LbfgsOptions { m: 5, init_hessian: 1e-4, max_iter: 10000, line_search: LineSearchOptions::default() }
    }
}

impl LbfgsOptions {
    pub fn validate(&self) -> Result<()> {
        if self.m == 0 {
            return Err(MinimError::Config("L-BFGS history size must be at least 1".into()));
        }
        if !(self.init_hessian > 0.0) {
            return Err(MinimError::Config(format!("initial Hessian scale {} must be positive", self.init_hessian)));
        }
        self.line_search.validate()
    }
}

/// Gradient-descent parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GradDescentOptions {
    /// Fixed step multiplier applied to the gradient.
    pub alpha: f64,
    pub max_iter: usize,
}

impl Default for GradDescentOptions {
    fn default() -> Self {
        GradDescentOptions { alpha: 1e-5, max_iter: 10000 }
    }
}
