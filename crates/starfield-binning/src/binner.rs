//! GPU projection plus host counting sort
//!
//! Each [`ScreenBinner::bin`] projects every body to screen pixels on the GPU, reads
//! the positions back, sorts them into the [`ScreenGrid`] and uploads the result:
//! the permuted positions go back into the same buffer (padded with
//! [`OFFSCREEN`]) and the packed cell headers into an `R32Uint` texture with one
//! texel per cell.

use crate::camera::{ScreenCamera, OFFSCREEN};
use crate::grid::{ScreenGrid, ScreenPosition, MAX_BINNED_POSITIONS};
use crate::BinningError;
use starfield_simulation::readback::read_buffer;
use starfield_simulation::{workgroup_count, GpuSimulation, StateBufferConsumer};
use wgpu::util::DeviceExt;

const SIZE_OF_SCREEN_POSITION: u64 = 8;

/// Resources that depend on the simulation's state buffers
struct Binding {
    positions: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_masses: u32,
}

pub struct ScreenBinner {
    device: wgpu::Device,
    queue: wgpu::Queue,

    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,

    binding: Option<Binding>,
    bound_generation: u64,

    header_texture: wgpu::Texture,
    header_view: wgpu::TextureView,

    grid: ScreenGrid,
    upload: Vec<ScreenPosition>,
}

impl ScreenBinner {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Projection Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/project.wgsl").into()),
        });

        // 0: masses, 1: params, 2: screen positions
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Projection Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Projection Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Projection Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("project"),
            compilation_options: Default::default(),
            cache: None,
        });

        let camera = ScreenCamera::new(width, height);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Projection Params Buffer"),
            contents: bytemuck::bytes_of(&camera.projection_params(width, height, 0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let grid = ScreenGrid::new(width, height);
        let (header_texture, header_view) = create_header_texture(device, &grid);

        log::info!(
            "ScreenBinner created for {}x{} ({:?} cells)",
            width,
            height,
            grid.dimensions()
        );

        Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline,
            bind_group_layout,
            params_buffer,
            binding: None,
            bound_generation: 0,
            header_texture,
            header_view,
            grid,
            upload: Vec::new(),
        }
    }

    /// Rebind to `simulation`'s state buffers if they were reallocated since the last bind
    pub fn sync(&mut self, simulation: &GpuSimulation) -> Result<(), BinningError> {
        let generation = simulation.buffer_generation();
        if self.binding.is_some() && self.bound_generation == generation {
            return Ok(());
        }

        simulation.rebind(self)?;
        self.bound_generation = generation;
        log::debug!("ScreenBinner bound to buffer generation {generation}");
        Ok(())
    }

    /// Project, sort and upload. Returns the number of bodies that landed on screen.
    pub fn bin(
        &mut self,
        simulation: &GpuSimulation,
        camera: &ScreenCamera,
    ) -> Result<usize, BinningError> {
        self.sync(simulation)?;
        let binding = self.binding.as_ref().ok_or(BinningError::Unbound)?;

        let num_masses = binding.num_masses as usize;
        if num_masses > MAX_BINNED_POSITIONS {
            return Err(BinningError::CapacityExceeded {
                count: num_masses,
                limit: MAX_BINNED_POSITIONS,
            });
        }

        let (width, height) = self.grid.screen_size();
        let params = camera.projection_params(width, height, binding.num_masses);
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Projection Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Projection Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &binding.bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroup_count(binding.num_masses), 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let positions: Vec<ScreenPosition> =
            read_buffer(&self.device, &self.queue, &binding.positions, num_masses)?;
        let binned = self.grid.sort(&positions)?;

        self.upload.clear();
        self.upload.extend_from_slice(self.grid.sorted_positions());
        self.upload.resize(num_masses, OFFSCREEN);
        self.queue
            .write_buffer(&binding.positions, 0, bytemuck::cast_slice(&self.upload));

        write_headers(&self.queue, &self.header_texture, &self.grid);

        log::debug!("Binned {binned} of {num_masses} masses");
        Ok(binned)
    }

    /// Resize the grid and reallocate the header texture
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.grid.screen_size() == (width.max(1), height.max(1)) {
            return;
        }

        self.grid.resize(width, height);
        let (texture, view) = create_header_texture(&self.device, &self.grid);
        self.header_texture.destroy();
        self.header_texture = texture;
        self.header_view = view;

        log::info!(
            "ScreenBinner resized to {width}x{height} ({:?} cells)",
            self.grid.dimensions()
        );
    }

    /// Result of the last sort
    pub fn grid(&self) -> &ScreenGrid {
        &self.grid
    }

    /// Sorted screen positions, one `vec2<f32>` per body
    pub fn positions_buffer(&self) -> Option<&wgpu::Buffer> {
        self.binding.as_ref().map(|b| &b.positions)
    }

    /// Packed `(start << 16) | length` per cell
    pub fn header_texture(&self) -> &wgpu::Texture {
        &self.header_texture
    }

    pub fn header_view(&self) -> &wgpu::TextureView {
        &self.header_view
    }

    pub fn num_masses(&self) -> u32 {
        self.binding.as_ref().map_or(0, |b| b.num_masses)
    }
}

impl StateBufferConsumer for ScreenBinner {
    fn set_buffers(
        &mut self,
        device: &wgpu::Device,
        masses: &wgpu::Buffer,
        _motions: &wgpu::Buffer,
        num_masses: u32,
    ) {
        // Keep the positions buffer when only the state buffers moved
        let positions = match self.binding.take() {
            Some(old) if old.num_masses == num_masses => old.positions,
            old => {
                if let Some(old) = old {
                    old.positions.destroy();
                }
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Screen Positions Buffer"),
                    size: num_masses as u64 * SIZE_OF_SCREEN_POSITION,
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            }
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Projection Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: masses.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: positions.as_entire_binding(),
                },
            ],
        });

        self.binding = Some(Binding {
            positions,
            bind_group,
            num_masses,
        });
    }
}

fn create_header_texture(
    device: &wgpu::Device,
    grid: &ScreenGrid,
) -> (wgpu::Texture, wgpu::TextureView) {
    let (columns, rows) = grid.dimensions();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Cell Header Texture"),
        size: wgpu::Extent3d {
            width: columns,
            height: rows,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R32Uint,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn write_headers(queue: &wgpu::Queue, texture: &wgpu::Texture, grid: &ScreenGrid) {
    let (columns, rows) = grid.dimensions();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(grid.packed_headers()),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(columns * 4),
            rows_per_image: Some(rows),
        },
        wgpu::Extent3d {
            width: columns,
            height: rows,
            depth_or_array_layers: 1,
        },
    );
}
