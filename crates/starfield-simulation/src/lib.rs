//! # Starfield Simulation Engine
//!
//! GPU-based N-body integration using compute shaders, with a CPU reference
//! engine sharing the same state-exchange contract.

pub mod cpu;
pub mod device;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod kernels;
pub mod params;
pub mod readback;

pub use cpu::*;
pub use device::*;
pub use engine::*;
pub use error::*;
pub use exchange::*;
pub use kernels::*;
pub use params::*;
pub use starfield_physics::EnergyReport;
