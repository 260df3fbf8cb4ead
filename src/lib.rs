//! minim: distributed-memory energy minimisation
//!
//! This crate minimises a scalar energy over a vector of degrees of freedom
//! that is partitioned across ranks. Energies are sums of small per-element
//! contributions; each rank evaluates the elements it owns plus halo copies of
//! elements crossing its block boundary, and collectives assemble the global
//! energy and gradient. L-BFGS (history held on rank 0) and gradient descent
//! drive the optimisation.
//!
//! Ranks are provided by a transport: a single process (`UniverseComm::Serial`),
//! threads of a rayon pool (feature `rayon`, default) or MPI processes
//! (feature `mpi`).

pub mod parallel;

pub mod communicator;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod minimiser;
pub mod potentials;
pub mod utils;

// Re-exports for convenience
pub use communicator::Communicator;
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use error::*;
pub use minimiser::{GradDescent, Lbfgs, LbfgsHistory, Minimiser};
pub use parallel::{Comm, UniverseComm};
pub use potentials::*;
pub use utils::convergence::{MinimiseStats, Status};
