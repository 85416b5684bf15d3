//! Headless device bootstrap

use crate::SimulationError;

/// Request a high-performance adapter and a compute-capable device without a surface.
///
/// Blocks on the async adapter/device requests with `pollster`.
pub fn request_compute_device() -> Result<(wgpu::Device, wgpu::Queue), SimulationError> {
    pollster::block_on(request_compute_device_async())
}

async fn request_compute_device_async() -> Result<(wgpu::Device, wgpu::Queue), SimulationError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| SimulationError::NoAdapter(e.to_string()))?;

    log::info!("Using GPU: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Simulation Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| SimulationError::Device(e.to_string()))?;

    Ok((device, queue))
}
