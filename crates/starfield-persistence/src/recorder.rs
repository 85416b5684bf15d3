//! Stream recording

use crate::stream::{encode_frame, write_header, StreamLayout};
use crate::{PersistenceError, SessionMode};
use starfield_simulation::{
    decode_states, SimulationError, StateExchange, StreamActivity, StreamClaim,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one frame per [`StreamRecorder::record_step`] to a `.simstream` file.
///
/// The writer is flushed by [`StreamRecorder::finish`] and, failing that, on drop.
/// The engine stays claimed for recording until then.
pub struct StreamRecorder {
    writer: BufWriter<File>,
    claim: StreamClaim,
    path: PathBuf,
    layout: StreamLayout,
    state_bytes: Vec<u8>,
    frame: Vec<u8>,
    frames_written: u64,
}

impl StreamRecorder {
    /// Create `path` and write the header for `engine`'s current bodies
    pub fn create<E>(path: &Path, engine: &E) -> Result<Self, PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        let num_masses = engine.num_masses();
        if num_masses == 0 {
            return Err(SimulationError::EmptyState.into());
        }

        let claim = engine
            .stream_lock()
            .claim(StreamActivity::Recording)
            .map_err(|held| PersistenceError::engine_busy("start recording", held))?;

        let mut state_bytes = vec![0u8; engine.state_len()];
        engine.state_bytes(&mut state_bytes)?;
        let masses: Vec<f32> = decode_states(&state_bytes, num_masses)?
            .iter()
            .map(|m| m.mass)
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        write_header(&mut writer, &masses)?;

        let layout = StreamLayout::new(masses.len());
        log::info!(
            "Started recording {} masses to {}",
            layout.num_masses(),
            path.display()
        );

        Ok(Self {
            writer,
            claim,
            path: path.to_path_buf(),
            frame: Vec::with_capacity(layout.frame_len() as usize),
            layout,
            state_bytes,
            frames_written: 0,
        })
    }

    /// Append the engine's current positions and speeds as one frame
    pub fn record_step<E>(&mut self, engine: &E) -> Result<(), PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        if !self.claim.holds(engine.stream_lock()) {
            return Err(PersistenceError::EngineMismatch {
                operation: "record a step",
                mode: SessionMode::Recording,
            });
        }

        let actual = engine.num_masses();
        if actual != self.layout.num_masses() {
            return Err(PersistenceError::BodyCountChanged {
                expected: self.layout.num_masses(),
                actual,
            });
        }

        engine.state_bytes(&mut self.state_bytes)?;

        self.frame.clear();
        encode_frame(&decode_states(&self.state_bytes, actual)?, &mut self.frame);
        self.writer.write_all(&self.frame)?;
        self.frames_written += 1;

        log::debug!("Recorded frame {}", self.frames_written);
        Ok(())
    }

    /// Flush and close the file, returning the number of frames written
    pub fn finish(mut self) -> Result<u64, PersistenceError> {
        self.writer.flush()?;
        log::info!(
            "Finished recording {} frames to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(self.frames_written)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn num_masses(&self) -> usize {
        self.layout.num_masses()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StreamRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("Failed to flush {}: {e}", self.path.display());
        }
    }
}
