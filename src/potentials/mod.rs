//! Concrete element potentials.
//!
//! - [`Lj3d`]: pairwise Lennard-Jones between point particles.
//! - [`BarAndHinge`]: bar stretching and dihedral bending of triangulated sheets.
//! - [`PfWetting`]: diffuse-interface fluid on a periodic grid with solid walls.

pub mod bar_and_hinge;
pub mod lj3d;
pub mod pf_wetting;

pub use bar_and_hinge::BarAndHinge;
pub use lj3d::Lj3d;
pub use pf_wetting::PfWetting;
