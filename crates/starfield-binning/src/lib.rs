//! # Starfield Binning
//!
//! Screen-space spatial binning: bodies are projected to pixels on the GPU and
//! counting-sorted into a grid of 32 px cells every frame.

pub mod binner;
pub mod camera;
pub mod error;
pub mod grid;

pub use binner::*;
pub use camera::*;
pub use error::*;
pub use grid::*;
