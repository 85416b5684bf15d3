//! GPU-based point-mass simulation
//!
//! NOTE: Every kernel argument that references `masses`, `motions` or `readout` is
//! rebuilt in [`GpuSimulation::bind_buffers`], which runs after every allocation.
//! Nothing else creates bind groups over those buffers, so a reallocation can never
//! leave a stale binding behind. Consumers outside the engine track
//! [`GpuSimulation::buffer_generation`] or get rebound through
//! [`GpuSimulation::rebind_consumers`].

use crate::kernels::{workgroup_count, Kernel, KernelSet};
use crate::readback::{read_buffer, read_buffer_bytes};
use crate::{
    assert_state_buffer, EnergyReport, SimulationError, SimulationParams, StateBufferConsumer,
    StateExchange, StreamLock,
};
use starfield_physics::{
    SimulationState, SIZE_OF_MOTION, SIZE_OF_POINT_MASS, SIZE_OF_POINT_MASS_STATE,
};
use wgpu::util::DeviceExt;

/// Per-body `(kinetic, potential)` pair written by the energy kernel
const SIZE_OF_ENERGY_PAIR: u64 = 8;

/// Device-resident body state and the step kernel's view of it
struct StateBuffers {
    masses: wgpu::Buffer,
    motions: wgpu::Buffer,
    step_bind_group: wgpu::BindGroup,
}

/// Energy readout, kept across state reallocations until explicitly released
struct Readout {
    buffer: wgpu::Buffer,
    capacity: u32,
    bind_group: Option<wgpu::BindGroup>,
}

/// GPU point-mass simulation.
///
/// Sole owner of the live state once constructed; reads go through explicit
/// blocking readbacks.
pub struct GpuSimulation {
    device: wgpu::Device,
    queue: wgpu::Queue,

    kernels: KernelSet,
    params: SimulationParams,
    params_buffer: wgpu::Buffer,

    state: Option<StateBuffers>,
    readout: Option<Readout>,

    num_masses: u32,
    buffer_generation: u64,
    stream_lock: StreamLock,
}

impl GpuSimulation {
    /// Allocate device buffers for `state`, upload it and bind every kernel.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        state: &SimulationState,
        params: SimulationParams,
    ) -> Result<Self, SimulationError> {
        log::info!(
            "Initializing GpuSimulation with {} masses...",
            state.num_masses()
        );

        if state.is_empty() {
            return Err(SimulationError::EmptyState);
        }

        let kernels = KernelSet::new(&device);

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let mut simulation = Self {
            device,
            queue,
            kernels,
            params,
            params_buffer,
            state: None,
            readout: None,
            num_masses: 0,
            buffer_generation: 0,
            stream_lock: StreamLock::new(),
        };

        let num_masses = simulation.checked_count(state.num_masses())?;
        simulation.readout = Some(simulation.create_readout(num_masses));

        let (point_masses, motions) = state.split();
        simulation.allocate_state(
            bytemuck::cast_slice(&point_masses),
            bytemuck::cast_slice(&motions),
            num_masses,
        )?;

        log::info!("GpuSimulation initialized");
        Ok(simulation)
    }

    /// Advance the system by `dt`.
    ///
    /// Dispatches the step kernel's two passes over `ceil(N / COMPUTE_THREADS)`
    /// workgroups. Fire-and-forget: nothing waits on the device.
    pub fn step(&mut self, dt: f32) {
        let Some(state) = &self.state else {
            log::warn!("step called after the state buffers were released");
            return;
        };

        self.params = self.params.with_time_step(dt);
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Simulation Step Encoder"),
            });

        let workgroups = workgroup_count(self.num_masses);

        for kernel in [Kernel::Accelerate, Kernel::Advance] {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.label()),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(self.kernels.pipeline(kernel));
            compute_pass.set_bind_group(0, &state.step_bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroups, 1, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Kinetic, potential and total energy of the live state.
    ///
    /// Blocks until the energy kernel has run and its readout has been copied back.
    pub fn total_energy(&self) -> Result<EnergyReport, SimulationError> {
        let readout = self
            .readout
            .as_ref()
            .ok_or(SimulationError::MissingResource("energy readout"))?;
        let bind_group = readout
            .bind_group
            .as_ref()
            .ok_or(SimulationError::MissingResource("state"))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Energy Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Energy Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(self.kernels.pipeline(Kernel::Energy));
            compute_pass.set_bind_group(0, bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroup_count(self.num_masses), 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let pairs: Vec<[f32; 2]> = read_buffer(
            &self.device,
            &self.queue,
            &readout.buffer,
            self.num_masses as usize,
        )?;

        Ok(EnergyReport::from_pairs(&pairs))
    }

    /// Release the state buffers, and the energy readout if `release_readout` is set.
    ///
    /// The readout survives state reallocation and only needs releasing on teardown.
    pub fn release_buffers(&mut self, release_readout: bool) {
        if let Some(state) = self.state.take() {
            state.masses.destroy();
            state.motions.destroy();
            log::info!("Released state buffers");
        }

        if let Some(readout) = self.readout.as_mut() {
            // The energy bind group references the released state
            readout.bind_group = None;
        }

        if release_readout {
            if let Some(readout) = self.readout.take() {
                readout.buffer.destroy();
                log::info!("Released energy readout buffer");
            }
        }
    }

    /// Rebind every external consumer of the state buffers.
    ///
    /// Call after any operation that may reallocate (`set_simulation_state`,
    /// `set_state_bytes`).
    pub fn rebind_consumers(
        &self,
        consumers: &mut [&mut dyn StateBufferConsumer],
    ) -> Result<(), SimulationError> {
        let state = self
            .state
            .as_ref()
            .ok_or(SimulationError::MissingResource("state"))?;

        for consumer in consumers.iter_mut() {
            consumer.set_buffers(&self.device, &state.masses, &state.motions, self.num_masses);
        }
        Ok(())
    }

    /// Rebind a single consumer
    pub fn rebind(&self, consumer: &mut dyn StateBufferConsumer) -> Result<(), SimulationError> {
        self.rebind_consumers(&mut [consumer])
    }

    /// Replace physics parameters (gravity, softening). The time step is set by `step`.
    pub fn update_params(&mut self, params: &SimulationParams) {
        self.params = SimulationParams {
            num_masses: self.num_masses,
            ..*params
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Incremented on every (re)allocation of the state buffers
    pub fn buffer_generation(&self) -> u64 {
        self.buffer_generation
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn checked_count(&self, num_masses: usize) -> Result<u32, SimulationError> {
        if num_masses == 0 {
            return Err(SimulationError::EmptyState);
        }
        let limit = self.device.limits().max_storage_buffer_binding_size as u64;
        let largest = (num_masses * SIZE_OF_MOTION) as u64;
        if largest > limit {
            return Err(SimulationError::TooManyMasses { num_masses, limit });
        }
        Ok(num_masses as u32)
    }

    fn create_readout(&self, capacity: u32) -> Readout {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Energy Readout Buffer"),
            size: capacity as u64 * SIZE_OF_ENERGY_PAIR,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Readout {
            buffer,
            capacity,
            bind_group: None,
        }
    }

    /// Release, reallocate and upload the state buffers, then rebind.
    fn allocate_state(
        &mut self,
        point_mass_bytes: &[u8],
        motion_bytes: &[u8],
        num_masses: u32,
    ) -> Result<(), SimulationError> {
        self.release_buffers(false);

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let masses = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Masses Buffer"),
                contents: point_mass_bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            });

        let motions = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Motions Buffer"),
                contents: motion_bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            });

        // A live readout follows the body count; a released one stays released
        let resize_readout = self
            .readout
            .as_ref()
            .is_some_and(|r| r.capacity != num_masses);
        if resize_readout {
            if let Some(old) = self.readout.take() {
                old.buffer.destroy();
            }
            self.readout = Some(self.create_readout(num_masses));
        }

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SimulationError::OutOfMemory(error.to_string()));
        }

        log::info!("Allocated state buffers for {num_masses} masses");

        self.num_masses = num_masses;
        self.params.num_masses = num_masses;
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));

        self.bind_buffers(masses, motions);
        Ok(())
    }

    /// Build every bind group over freshly allocated state buffers
    fn bind_buffers(&mut self, masses: wgpu::Buffer, motions: wgpu::Buffer) {
        let step_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Step Bind Group"),
            layout: self.kernels.step_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: masses.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: motions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        });

        if let Some(readout) = self.readout.as_mut() {
            readout.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Energy Bind Group"),
                layout: self.kernels.energy_layout(),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: masses.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: motions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: readout.buffer.as_entire_binding(),
                    },
                ],
            }));
        }

        self.state = Some(StateBuffers {
            masses,
            motions,
            step_bind_group,
        });
        self.buffer_generation += 1;

        log::debug!("Bound state buffers (generation {})", self.buffer_generation);
    }
}

impl StateExchange for GpuSimulation {
    fn num_masses(&self) -> usize {
        if self.state.is_some() {
            self.num_masses as usize
        } else {
            0
        }
    }

    fn stream_lock(&self) -> &StreamLock {
        &self.stream_lock
    }

    fn state_bytes(&self, buf: &mut [u8]) -> Result<(), SimulationError> {
        let state = self
            .state
            .as_ref()
            .ok_or(SimulationError::MissingResource("state"))?;
        let n = self.num_masses as usize;
        assert_state_buffer(buf.len(), n)?;

        let mass_bytes = read_buffer_bytes(
            &self.device,
            &self.queue,
            &state.masses,
            (n * SIZE_OF_POINT_MASS) as u64,
        )?;
        let motion_bytes = read_buffer_bytes(
            &self.device,
            &self.queue,
            &state.motions,
            (n * SIZE_OF_MOTION) as u64,
        )?;

        for ((record, mass), motion) in buf
            .chunks_exact_mut(SIZE_OF_POINT_MASS_STATE)
            .zip(mass_bytes.chunks_exact(SIZE_OF_POINT_MASS))
            .zip(motion_bytes.chunks_exact(SIZE_OF_MOTION))
        {
            record[..SIZE_OF_POINT_MASS].copy_from_slice(mass);
            record[SIZE_OF_POINT_MASS..].copy_from_slice(motion);
        }
        Ok(())
    }

    fn set_state_bytes(&mut self, buf: &[u8], num_masses: usize) -> Result<(), SimulationError> {
        let count = self.checked_count(num_masses)?;
        assert_state_buffer(buf.len(), num_masses)?;

        let mut mass_bytes = Vec::with_capacity(num_masses * SIZE_OF_POINT_MASS);
        let mut motion_bytes = Vec::with_capacity(num_masses * SIZE_OF_MOTION);
        let records = &buf[..num_masses * SIZE_OF_POINT_MASS_STATE];
        for record in records.chunks_exact(SIZE_OF_POINT_MASS_STATE) {
            mass_bytes.extend_from_slice(&record[..SIZE_OF_POINT_MASS]);
            motion_bytes.extend_from_slice(&record[SIZE_OF_POINT_MASS..]);
        }

        // Same body count: overwrite in place, bindings stay valid
        if let Some(state) = self.state.as_ref().filter(|_| count == self.num_masses) {
            self.queue.write_buffer(&state.masses, 0, &mass_bytes);
            self.queue.write_buffer(&state.motions, 0, &motion_bytes);
            return Ok(());
        }

        self.allocate_state(&mass_bytes, &motion_bytes, count)
    }
}

impl Drop for GpuSimulation {
    fn drop(&mut self) {
        self.release_buffers(true);
    }
}
