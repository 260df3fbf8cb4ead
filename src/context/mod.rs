//! Context types for configuring and running minimisers.
//!
//! Modules:
//! - [`minimiser_context`]: `MinimiserContext`, which selects a minimiser by
//!   kind, applies its options, and runs it on a state.

pub mod minimiser_context;

pub use minimiser_context::{MinimiserContext, MinimiserKind};
