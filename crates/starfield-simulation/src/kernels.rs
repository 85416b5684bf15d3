//! Typed table of the simulation's compute kernels
//!
//! Every pipeline is compiled once when the engine is created and looked up by
//! [`Kernel`] afterwards.

/// Threads per workgroup, must match `@workgroup_size` in the shaders
pub const COMPUTE_THREADS: u32 = 256;

/// Workgroups needed to cover `num_masses` bodies
pub fn workgroup_count(num_masses: u32) -> u32 {
    num_masses.div_ceil(COMPUTE_THREADS)
}

/// The simulation's compute kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// First half of a step: recompute accelerations, advance velocities
    Accelerate,
    /// Second half of a step: advance positions with the averaged velocity
    Advance,
    /// Per-body kinetic and potential energy into the readout buffer
    Energy,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::Accelerate, Kernel::Advance, Kernel::Energy];

    pub fn entry_point(self) -> &'static str {
        match self {
            Kernel::Accelerate => "accelerate",
            Kernel::Advance => "advance",
            Kernel::Energy => "compute_energy",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Kernel::Accelerate => "Accelerate Pipeline",
            Kernel::Advance => "Advance Pipeline",
            Kernel::Energy => "Energy Pipeline",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compiled pipelines and their bind group layouts
pub struct KernelSet {
    pipelines: [wgpu::ComputePipeline; 3],
    step_layout: wgpu::BindGroupLayout,
    energy_layout: wgpu::BindGroupLayout,
}

impl KernelSet {
    pub fn new(device: &wgpu::Device) -> Self {
        let step_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Step Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/step.wgsl").into()),
        });

        let energy_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Energy Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/energy.wgsl").into()),
        });

        log::debug!("Simulation shaders loaded");

        // 0: masses, 1: motions, 2: params
        let step_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Step Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                uniform_entry(2),
            ],
        });

        // 0: masses, 1: motions, 2: params, 3: readout
        let energy_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Energy Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                uniform_entry(2),
                storage_entry(3, false),
            ],
        });

        let step_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Step Pipeline Layout"),
            bind_group_layouts: &[&step_layout],
            push_constant_ranges: &[],
        });

        let energy_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Energy Pipeline Layout"),
                bind_group_layouts: &[&energy_layout],
                push_constant_ranges: &[],
            });

        let pipelines = Kernel::ALL.map(|kernel| {
            let (layout, module) = match kernel {
                Kernel::Accelerate | Kernel::Advance => (&step_pipeline_layout, &step_shader),
                Kernel::Energy => (&energy_pipeline_layout, &energy_shader),
            };
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.label()),
                layout: Some(layout),
                module,
                entry_point: Some(kernel.entry_point()),
                compilation_options: Default::default(),
                cache: None,
            })
        });

        log::debug!("Simulation pipelines created");

        Self {
            pipelines,
            step_layout,
            energy_layout,
        }
    }

    pub fn pipeline(&self, kernel: Kernel) -> &wgpu::ComputePipeline {
        &self.pipelines[kernel.index()]
    }

    pub fn step_layout(&self) -> &wgpu::BindGroupLayout {
        &self.step_layout
    }

    pub fn energy_layout(&self) -> &wgpu::BindGroupLayout {
        &self.energy_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(256), 1);
        assert_eq!(workgroup_count(257), 2);
        assert_eq!(workgroup_count(10240), 40);
    }

    #[test]
    fn kernel_indices_follow_table_order() {
        for (i, kernel) in Kernel::ALL.iter().enumerate() {
            assert_eq!(kernel.index(), i);
        }
    }
}
