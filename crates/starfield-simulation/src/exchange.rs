//! State exchange contract between an engine and its collaborators
//!
//! Persistence only ever talks to an engine through [`StateExchange`], using the
//! packed 40-byte [`PointMassState`] layout.

use crate::SimulationError;
use starfield_physics::{PointMassState, SimulationState, SIZE_OF_POINT_MASS_STATE};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Byte-level access to an engine's live state
pub trait StateExchange {
    /// Number of bodies currently owned by the engine
    fn num_masses(&self) -> usize;

    /// Marks the engine as being recorded or replayed
    fn stream_lock(&self) -> &StreamLock;

    /// Write the live state into `buf` as `num_masses()` packed records.
    ///
    /// `buf` must hold at least `num_masses() * 40` bytes. A shorter buffer is a
    /// contract violation: debug builds panic, release builds return
    /// [`SimulationError::BufferTooSmall`].
    fn state_bytes(&self, buf: &mut [u8]) -> Result<(), SimulationError>;

    /// Replace the live state with `num_masses` packed records from `buf`,
    /// reallocating if the body count changes.
    fn set_state_bytes(&mut self, buf: &[u8], num_masses: usize) -> Result<(), SimulationError>;

    /// Bytes needed to hold the full state
    fn state_len(&self) -> usize {
        self.num_masses() * SIZE_OF_POINT_MASS_STATE
    }

    /// Read back the full state
    fn simulation_state(&self) -> Result<SimulationState, SimulationError> {
        let mut bytes = vec![0u8; self.state_len()];
        self.state_bytes(&mut bytes)?;
        Ok(SimulationState::new(decode_states(&bytes, self.num_masses())?))
    }

    /// Replace the full state
    fn set_simulation_state(&mut self, state: &SimulationState) -> Result<(), SimulationError> {
        self.set_state_bytes(state.as_bytes(), state.num_masses())
    }
}

/// What a stream claim is using the engine for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamActivity {
    Recording,
    Replaying,
}

const UNCLAIMED: u8 = 0;

impl StreamActivity {
    fn code(self) -> u8 {
        match self {
            StreamActivity::Recording => 1,
            StreamActivity::Replaying => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StreamActivity::Recording),
            2 => Some(StreamActivity::Replaying),
            _ => None,
        }
    }
}

/// Per-engine slot holding at most one [`StreamClaim`].
///
/// Recording and replay of one engine are mutually exclusive no matter how many
/// recorders or replayers exist.
#[derive(Debug, Default)]
pub struct StreamLock(Arc<AtomicU8>);

impl StreamLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activity currently holding the engine, if any
    pub fn activity(&self) -> Option<StreamActivity> {
        StreamActivity::from_code(self.0.load(Ordering::Acquire))
    }

    /// Claim the engine for `activity`, or return the activity already holding it
    pub fn claim(&self, activity: StreamActivity) -> Result<StreamClaim, StreamActivity> {
        match self
            .0
            .compare_exchange(UNCLAIMED, activity.code(), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(StreamClaim {
                slot: Arc::clone(&self.0),
                activity,
            }),
            Err(held) => Err(StreamActivity::from_code(held).unwrap_or(activity)),
        }
    }
}

/// Exclusive use of one engine by a recording or replay; released on drop
#[derive(Debug)]
pub struct StreamClaim {
    slot: Arc<AtomicU8>,
    activity: StreamActivity,
}

impl StreamClaim {
    pub fn activity(&self) -> StreamActivity {
        self.activity
    }

    /// Whether this claim was taken on `lock`
    pub fn holds(&self, lock: &StreamLock) -> bool {
        Arc::ptr_eq(&self.slot, &lock.0)
    }
}

impl Drop for StreamClaim {
    fn drop(&mut self) {
        self.slot.store(UNCLAIMED, Ordering::Release);
    }
}

/// Engine-side form of [`check_state_buffer`] that also asserts in debug builds
pub fn assert_state_buffer(buf_len: usize, num_masses: usize) -> Result<(), SimulationError> {
    let required = num_masses * SIZE_OF_POINT_MASS_STATE;
    debug_assert!(
        buf_len >= required,
        "state buffer too small: need {required} bytes, got {buf_len}"
    );
    check_state_buffer(buf_len, num_masses)
}

/// Fail with `BufferTooSmall` unless `buf_len` covers `num_masses` records
pub fn check_state_buffer(buf_len: usize, num_masses: usize) -> Result<(), SimulationError> {
    let required = num_masses * SIZE_OF_POINT_MASS_STATE;
    if buf_len < required {
        return Err(SimulationError::BufferTooSmall {
            required,
            actual: buf_len,
        });
    }
    Ok(())
}

/// Decode the first `num_masses` records of `buf`
pub fn decode_states(
    buf: &[u8],
    num_masses: usize,
) -> Result<Vec<PointMassState>, SimulationError> {
    check_state_buffer(buf.len(), num_masses)?;
    Ok(buf[..num_masses * SIZE_OF_POINT_MASS_STATE]
        .chunks_exact(SIZE_OF_POINT_MASS_STATE)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// A GPU pass outside the engine that binds the engine's state buffers.
///
/// The engine reallocates `masses` and `motions` whenever the body count changes;
/// every consumer must be rebound after that through
/// [`crate::GpuSimulation::rebind_consumers`].
pub trait StateBufferConsumer {
    fn set_buffers(
        &mut self,
        device: &wgpu::Device,
        masses: &wgpu::Buffer,
        motions: &wgpu::Buffer,
        num_masses: u32,
    );
}
