//! Full-precision state snapshots (`.simstate`)
//!
//! A snapshot is the raw concatenation of `N` packed 40-byte [`PointMassState`]
//! records with no header; `N` is the file length divided by 40.
//!
//! [`PointMassState`]: starfield_physics::PointMassState

use crate::paths::open_existing;
use crate::PersistenceError;
use starfield_physics::{SimulationState, SIZE_OF_POINT_MASS_STATE};
use starfield_simulation::StateExchange;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const KIND: &str = "snapshot";

/// Decode snapshot bytes
pub fn decode_snapshot(bytes: &[u8]) -> Result<SimulationState, PersistenceError> {
    if bytes.is_empty() {
        return Err(PersistenceError::format(KIND, "file is empty"));
    }
    SimulationState::from_bytes(bytes).ok_or_else(|| {
        PersistenceError::format(
            KIND,
            format!(
                "length {} is not a multiple of {SIZE_OF_POINT_MASS_STATE}",
                bytes.len()
            ),
        )
    })
}

/// Write the engine's live state to `writer`
pub fn write_snapshot<E, W>(engine: &E, writer: &mut W) -> Result<usize, PersistenceError>
where
    E: StateExchange + ?Sized,
    W: Write,
{
    let mut bytes = vec![0u8; engine.state_len()];
    engine.state_bytes(&mut bytes)?;
    writer.write_all(&bytes)?;
    Ok(engine.num_masses())
}

/// Read a whole snapshot from `reader`
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<SimulationState, PersistenceError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_snapshot(&bytes)
}

/// Save the engine's live state to `path`, replacing any existing file
pub fn save_snapshot<E>(engine: &E, path: &Path) -> Result<(), PersistenceError>
where
    E: StateExchange + ?Sized,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let num_masses = write_snapshot(engine, &mut writer)?;
    writer.flush()?;
    log::info!("Saved {num_masses} masses to {}", path.display());
    Ok(())
}

/// Load a snapshot from `path`
pub fn load_snapshot(path: &Path) -> Result<SimulationState, PersistenceError> {
    let mut file = open_existing(path)?;
    let state = read_snapshot(&mut file)?;
    log::info!(
        "Loaded {} masses from {}",
        state.num_masses(),
        path.display()
    );
    Ok(state)
}

/// Load a snapshot from `path` straight into `engine`, reallocating if `N` differs
pub fn restore_snapshot<E>(engine: &mut E, path: &Path) -> Result<usize, PersistenceError>
where
    E: StateExchange + ?Sized,
{
    let state = load_snapshot(path)?;
    engine.set_simulation_state(&state)?;
    Ok(state.num_masses())
}
