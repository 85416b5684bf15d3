//! Lossy time-series stream format (`.simstream`)
//!
//! Layout, all little-endian:
//!
//! ```text
//! i32 N
//! f32 mass[N]                           // written once, assumed constant
//! { f32 position[3]; f32 speed; }[N]    // one frame per recorded step
//! ```
//!
//! A frame keeps only position and speed. Decoding rebuilds velocity as
//! `(speed, 0, 0)` with zero acceleration.

use crate::PersistenceError;
use glam::Vec3;
use starfield_physics::PointMassState;
use std::io::{Read, Write};

const KIND: &str = "stream";

/// Bytes per body per frame: position (12) + speed (4)
pub const SIZE_OF_STREAM_RECORD: usize = 16;

/// Bytes in the body-count field
pub const SIZE_OF_STREAM_COUNT: usize = 4;

/// One body in one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamRecord {
    pub position: [f32; 3],
    pub speed: f32,
}

impl StreamRecord {
    pub fn from_state(state: &PointMassState) -> Self {
        Self {
            position: state.position,
            speed: state.speed(),
        }
    }

    /// Inverse of [`StreamRecord::from_state`], up to the discarded direction and acceleration
    pub fn to_state(&self, mass: f32) -> PointMassState {
        PointMassState::moving(
            mass,
            Vec3::from_array(self.position),
            Vec3::new(self.speed, 0.0, 0.0),
        )
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        for value in self.position.iter().chain(std::iter::once(&self.speed)) {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut values = bytes.chunks_exact(4).map(read_f32);
        let mut next = || values.next().unwrap_or_default();
        Self {
            position: [next(), next(), next()],
            speed: next(),
        }
    }
}

/// Byte offsets of a stream with a known body count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    num_masses: usize,
}

impl StreamLayout {
    pub fn new(num_masses: usize) -> Self {
        Self { num_masses }
    }

    pub fn num_masses(&self) -> usize {
        self.num_masses
    }

    /// Count field plus the mass block
    pub fn header_len(&self) -> u64 {
        (SIZE_OF_STREAM_COUNT + 4 * self.num_masses) as u64
    }

    pub fn frame_len(&self) -> u64 {
        (SIZE_OF_STREAM_RECORD * self.num_masses) as u64
    }

    /// File offset of frame `index`
    pub fn frame_offset(&self, index: u64) -> u64 {
        self.header_len() + self.frame_len() * index
    }

    /// Whole frames in a file of `file_len` bytes; a torn trailing frame is not counted
    pub fn frame_count(&self, file_len: u64) -> u64 {
        match self.frame_len() {
            0 => 0,
            frame_len => file_len.saturating_sub(self.header_len()) / frame_len,
        }
    }
}

/// Write the body count and the mass block
pub fn write_header<W: Write>(writer: &mut W, masses: &[f32]) -> Result<(), PersistenceError> {
    let count = i32::try_from(masses.len())
        .map_err(|_| PersistenceError::format(KIND, "body count does not fit in 32 bits"))?;

    let mut bytes = Vec::with_capacity(SIZE_OF_STREAM_COUNT + 4 * masses.len());
    bytes.extend_from_slice(&count.to_le_bytes());
    for mass in masses {
        bytes.extend_from_slice(&mass.to_le_bytes());
    }
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read the body count and the mass block
pub fn read_header<R: Read>(reader: &mut R) -> Result<Vec<f32>, PersistenceError> {
    let mut count = [0u8; SIZE_OF_STREAM_COUNT];
    reader
        .read_exact(&mut count)
        .map_err(|_| PersistenceError::format(KIND, "missing body count"))?;

    let count = i32::from_le_bytes(count);
    if count <= 0 {
        return Err(PersistenceError::format(
            KIND,
            format!("invalid body count {count}"),
        ));
    }

    // Grows with what the file actually holds, not with the claimed count
    let expected = 4 * count as u64;
    let mut bytes = Vec::new();
    reader.by_ref().take(expected).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < expected {
        return Err(PersistenceError::format(KIND, "truncated mass block"));
    }

    Ok(bytes.chunks_exact(4).map(read_f32).collect())
}

/// Append one frame for `states` to `out`
pub fn encode_frame(states: &[PointMassState], out: &mut Vec<u8>) {
    out.reserve(states.len() * SIZE_OF_STREAM_RECORD);
    for state in states {
        StreamRecord::from_state(state).write_le(out);
    }
}

/// Decode one frame, pairing each record with its body's mass
pub fn decode_frame(frame: &[u8], masses: &[f32]) -> Vec<PointMassState> {
    frame
        .chunks_exact(SIZE_OF_STREAM_RECORD)
        .zip(masses)
        .map(|(record, &mass)| StreamRecord::read_le(record).to_state(mass))
        .collect()
}

fn read_f32(bytes: &[u8]) -> f32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    f32::from_le_bytes(word)
}
