//! Option structs for configuring minimisers.

pub mod options;

pub use options::{GradDescentOptions, LbfgsOptions, LineSearchOptions};
