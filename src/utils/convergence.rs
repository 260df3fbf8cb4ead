//! Convergence measures and run statistics for minimisers.

use num_traits::Float;

/// Where a minimiser is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Created,
    Running,
    Converged,
    MaxIterReached,
}

/// Summary of one `minimise` run.
#[derive(Clone, Debug)]
pub struct MinimiseStats<T> {
    pub iterations: usize,
    pub energy: T,
    pub rms_gradient: T,
    pub status: Status,
    /// Curvature pairs dropped because `s . y` was exactly zero.
    pub rejected_pairs: usize,
    /// Line searches that hit their minimum step.
    pub failed_line_searches: usize,
}

impl<T> MinimiseStats<T> {
    pub fn converged(&self) -> bool {
        self.status == Status::Converged
    }
}

/// Root-mean-square from a sum of squares over `n` entries. Zero when `n == 0`.
pub fn rms<T: Float>(sum_sq: T, n: usize) -> T {
    match T::from(n) {
        Some(n) if n > T::zero() => (sum_sq / n).sqrt(),
        _ => T::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_vector() {
        assert_eq!(rms(4.0 * 9.0, 4), 3.0_f64);
        assert_eq!(rms(1.0_f32, 0), 0.0);
    }
}
