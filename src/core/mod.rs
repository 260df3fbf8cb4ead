//! Core data model: elements, the potential evaluation contract, and the
//! per-rank optimisation state.

pub mod element;
pub mod potential;
pub mod state;
pub mod traits;

pub use element::{Args, Element};
pub use potential::Potential;
pub use state::State;
pub use traits::{Capabilities, ElementEnergyGradient};
