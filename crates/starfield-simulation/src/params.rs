//! Simulation parameters for runtime tuning

use bytemuck::{Pod, Zeroable};
use starfield_physics::{GRAVITY, SOFTENING};

/// Uniform block shared by every simulation kernel (matches WGSL `SimParams`).
///
/// Layout: 32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SimulationParams {
    pub delta_time: f32,
    pub half_delta_time: f32,
    pub gravity: f32,
    pub softening_sq: f32,
    pub num_masses: u32,
    pub _padding: [u32; 3],
}

impl SimulationParams {
    pub fn new(gravity: f32, softening: f32) -> Self {
        Self {
            gravity,
            softening_sq: softening * softening,
            ..Self::default()
        }
    }

    /// Set the step and its half
    pub fn with_time_step(mut self, delta_time: f32) -> Self {
        self.delta_time = delta_time;
        self.half_delta_time = delta_time * 0.5;
        self
    }

    pub fn softening(&self) -> f32 {
        self.softening_sq.sqrt()
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            delta_time: 0.01,
            half_delta_time: 0.005,
            gravity: GRAVITY,
            softening_sq: SOFTENING * SOFTENING,
            num_masses: 0,
            _padding: [0; 3],
        }
    }
}
