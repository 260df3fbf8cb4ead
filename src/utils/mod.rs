//! Shared helpers: slice arithmetic and convergence bookkeeping.

pub mod convergence;
pub mod vec;

pub use convergence::{rms, MinimiseStats, Status};
