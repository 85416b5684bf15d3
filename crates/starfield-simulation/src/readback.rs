//! Blocking buffer readback

use crate::SimulationError;

/// Copy the first `size` bytes of `buffer` into host memory.
///
/// Creates a staging buffer, copies into it, maps it and blocks on the device
/// until every previously submitted dispatch has completed. The source buffer
/// needs `COPY_SRC` usage.
pub fn read_buffer_bytes(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<u8>, SimulationError> {
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging Buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .map_err(|e| SimulationError::Readback(format!("device poll failed: {e}")))?;
    receiver
        .recv()
        .map_err(|e| SimulationError::Readback(format!("channel closed: {e}")))?
        .map_err(|e| SimulationError::Readback(format!("buffer mapping failed: {e}")))?;

    let bytes = slice.get_mapped_range().to_vec();
    staging.unmap();

    Ok(bytes)
}

/// Read `count` packed records back from `buffer`
pub fn read_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<T>, SimulationError> {
    let size = (count * std::mem::size_of::<T>()) as u64;
    let bytes = read_buffer_bytes(device, queue, buffer, size)?;
    Ok(bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect())
}
