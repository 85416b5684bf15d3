//! # Starfield Physics
//!
//! Host-side data model for the point-mass simulation: the packed GPU records,
//! the persistence unit, procedural galaxy generation and CPU reference forces.

pub mod constants;
pub mod forces;
pub mod point_mass;
pub mod state;

pub use constants::*;
pub use forces::*;
pub use point_mass::*;
pub use state::*;
