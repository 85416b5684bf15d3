//! Engine error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("simulation state is empty")]
    EmptyState,
    #[error("buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("{0} buffer has been released")]
    MissingResource(&'static str),
    #[error("{num_masses} bodies exceed the device limit of {limit} bytes per storage buffer")]
    TooManyMasses { num_masses: usize, limit: u64 },
    #[error("out of device memory: {0}")]
    OutOfMemory(String),
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("buffer readback failed: {0}")]
    Readback(String),
}
