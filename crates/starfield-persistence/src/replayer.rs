//! Seekable stream playback

use crate::paths::open_existing;
use crate::stream::{decode_frame, read_header, StreamLayout};
use crate::{PersistenceError, SessionMode, StreamBoundary};
use starfield_physics::SimulationState;
use starfield_simulation::{StateExchange, StreamActivity, StreamClaim};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Plays a `.simstream` file back into an engine, one frame per update.
///
/// `step` is a signed frame stride: `0` pauses, `1` plays forward, `-1` plays
/// backward and larger magnitudes skip frames. Each update moves to
/// `current_frame + step`; running off either end resets `step` to `0` and returns
/// [`PersistenceError::StreamBoundary`] without touching the engine.
///
/// The engine it was opened on stays claimed for replay until the replayer drops.
#[derive(Debug)]
pub struct StreamReplayer {
    reader: BufReader<File>,
    claim: StreamClaim,
    path: PathBuf,
    layout: StreamLayout,
    masses: Vec<f32>,
    frame_count: u64,
    current_frame: Option<u64>,
    step: i32,
    frame: Vec<u8>,
}

impl StreamReplayer {
    /// Open `path` and load its first frame into `engine`.
    ///
    /// The engine is resized to the stream's body count if needed. Leaves `step` at `1`.
    pub fn open<E>(path: &Path, engine: &mut E) -> Result<Self, PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        let claim = engine
            .stream_lock()
            .claim(StreamActivity::Replaying)
            .map_err(|held| PersistenceError::engine_busy("start replay", held))?;

        let file = open_existing(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let masses = read_header(&mut reader)?;
        let layout = StreamLayout::new(masses.len());
        let frame_count = layout.frame_count(file_len);
        if frame_count == 0 {
            return Err(PersistenceError::format("stream", "no recorded frames"));
        }

        log::info!(
            "Started replay of {} ({} masses, {frame_count} frames)",
            path.display(),
            layout.num_masses()
        );

        let mut replayer = Self {
            reader,
            claim,
            path: path.to_path_buf(),
            frame: vec![0u8; layout.frame_len() as usize],
            layout,
            masses,
            frame_count,
            current_frame: None,
            step: 1,
        };

        replayer.update(engine)?;
        Ok(replayer)
    }

    /// Advance by `step` frames and load the result into `engine`
    pub fn update<E>(&mut self, engine: &mut E) -> Result<(), PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        if !self.claim.holds(engine.stream_lock()) {
            return Err(PersistenceError::EngineMismatch {
                operation: "update replay",
                mode: SessionMode::Replaying,
            });
        }

        if self.step == 0 {
            return Ok(());
        }

        let target = match self.current_frame {
            Some(current) => current as i64 + self.step as i64,
            None => 0,
        };

        if target < 0 {
            return Err(self.hit_boundary(StreamBoundary::Start));
        }
        if target as u64 >= self.frame_count {
            return Err(self.hit_boundary(StreamBoundary::End));
        }

        let state = self.read_frame(target as u64)?;
        engine.set_simulation_state(&state)?;
        self.current_frame = Some(target as u64);

        log::debug!("Replayed frame {target} of {}", self.frame_count);
        Ok(())
    }

    /// Decode frame `index` without loading it anywhere
    pub fn read_frame(&mut self, index: u64) -> Result<SimulationState, PersistenceError> {
        self.reader
            .seek(SeekFrom::Start(self.layout.frame_offset(index)))?;
        self.reader.read_exact(&mut self.frame)?;
        Ok(SimulationState::new(decode_frame(&self.frame, &self.masses)))
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn set_step(&mut self, step: i32) {
        self.step = step;
    }

    /// Index of the frame most recently loaded into the engine
    pub fn current_frame(&self) -> Option<u64> {
        self.current_frame
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn num_masses(&self) -> usize {
        self.layout.num_masses()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn hit_boundary(&mut self, boundary: StreamBoundary) -> PersistenceError {
        self.step = 0;
        log::info!("Replay of {}: {boundary}", self.path.display());
        PersistenceError::StreamBoundary(boundary)
    }
}
