//! Single-threaded reference engine
//!
//! Runs the same symmetric update and energy formulas as the compute kernels on
//! the host. Used to verify the GPU engine and to drive persistence without a device.

use crate::{
    assert_state_buffer, decode_states, SimulationError, SimulationParams, StateExchange,
    StreamLock,
};
use starfield_physics::{
    body_energy, gravitational_acceleration, EnergyReport, PointMassState, SimulationState,
};

pub struct CpuSimulation {
    bodies: Vec<PointMassState>,
    params: SimulationParams,
    stream_lock: StreamLock,
}

impl CpuSimulation {
    pub fn new(state: &SimulationState, params: SimulationParams) -> Result<Self, SimulationError> {
        if state.is_empty() {
            return Err(SimulationError::EmptyState);
        }
        Ok(Self {
            bodies: state.masses().to_vec(),
            params,
            stream_lock: StreamLock::new(),
        })
    }

    /// Advance the system by `dt`
    pub fn step(&mut self, dt: f32) {
        let params = self.params.with_time_step(dt);
        let gravity = params.gravity;
        let softening = params.softening();

        // Pass 1: accelerations from the current positions, then velocities
        let accelerations: Vec<_> = (0..self.bodies.len())
            .map(|i| gravitational_acceleration(&self.bodies, i, gravity, softening))
            .collect();

        for (body, acceleration) in self.bodies.iter_mut().zip(accelerations) {
            let v_old = body.velocity();
            let v_new = v_old + acceleration * params.delta_time;
            let position = body.position() + (v_old + v_new) * params.half_delta_time;

            body.velocity = v_new.to_array();
            body.acceleration = acceleration.to_array();
            body.position = position.to_array();
        }
    }

    pub fn total_energy(&self) -> EnergyReport {
        let gravity = self.params.gravity;
        let softening = self.params.softening();
        let pairs: Vec<[f32; 2]> = (0..self.bodies.len())
            .map(|i| body_energy(&self.bodies, i, gravity, softening))
            .collect();
        EnergyReport::from_pairs(&pairs)
    }

    pub fn bodies(&self) -> &[PointMassState] {
        &self.bodies
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn update_params(&mut self, params: &SimulationParams) {
        self.params = *params;
    }
}

impl StateExchange for CpuSimulation {
    fn num_masses(&self) -> usize {
        self.bodies.len()
    }

    fn stream_lock(&self) -> &StreamLock {
        &self.stream_lock
    }

    fn state_bytes(&self, buf: &mut [u8]) -> Result<(), SimulationError> {
        assert_state_buffer(buf.len(), self.bodies.len())?;
        let bytes: &[u8] = bytemuck::cast_slice(&self.bodies);
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn set_state_bytes(&mut self, buf: &[u8], num_masses: usize) -> Result<(), SimulationError> {
        if num_masses == 0 {
            return Err(SimulationError::EmptyState);
        }
        assert_state_buffer(buf.len(), num_masses)?;
        self.bodies = decode_states(buf, num_masses)?;
        Ok(())
    }
}
