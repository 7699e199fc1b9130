//! Basis projection engine for machine-learned exchange-correlation corrections.
//!
//! Converts electron densities on a real-space grid into fixed-size per-species
//! basis representations (radial Gaussians × real spherical harmonics), maps
//! per-coefficient gradients back onto the grid (adjoint pass), and provides an
//! exact, invertible padding between an external atomic-orbital ordering and
//! dense per-species coefficient arrays.

pub mod basis;
pub mod config;
pub mod grid;
pub mod padding;
pub mod projector;

pub use basis::{BasisSet, RadialContraction, Shell, SpeciesBasis};
pub use config::{GapPolicy, ProjectionConfig, ShellConfig, SpeciesConfig};
pub use grid::{Grid, GridWindow};
pub use padding::{AoLabel, BasisPadder};
pub use projector::Projector;
