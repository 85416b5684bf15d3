//! Binning error type

use starfield_simulation::SimulationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinningError {
    #[error("{count} positions exceed the binning limit of {limit}")]
    CapacityExceeded { count: usize, limit: usize },
    #[error("screen binner is not bound to simulation buffers")]
    Unbound,
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}
