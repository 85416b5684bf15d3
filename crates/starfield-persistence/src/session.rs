//! Recording/replay session owned by the caller
//!
//! Recording and replay are mutually exclusive, both within a session and on any
//! one engine across sessions. Starting one while the other is active, or driving
//! a mode that was never started, fails with [`PersistenceError::ResourceState`].

use crate::snapshot::{load_snapshot, save_snapshot};
use crate::{PersistenceError, SaveDirectories, SessionMode, StreamRecorder, StreamReplayer};
use starfield_physics::SimulationState;
use starfield_simulation::StateExchange;
use std::path::PathBuf;

enum Activity {
    Idle,
    Recording(StreamRecorder),
    Replaying(StreamReplayer),
}

pub struct PersistenceSession {
    dirs: SaveDirectories,
    activity: Activity,
}

impl PersistenceSession {
    pub fn new(dirs: SaveDirectories) -> Self {
        Self {
            dirs,
            activity: Activity::Idle,
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self.activity {
            Activity::Idle => SessionMode::Idle,
            Activity::Recording(_) => SessionMode::Recording,
            Activity::Replaying(_) => SessionMode::Replaying,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.mode() == SessionMode::Recording
    }

    pub fn is_replaying(&self) -> bool {
        self.mode() == SessionMode::Replaying
    }

    pub fn directories(&self) -> &SaveDirectories {
        &self.dirs
    }

    // --- Recording ---

    /// Start recording `engine` to `Streams/<name>.simstream`
    pub fn start_recording<E>(&mut self, name: &str, engine: &E) -> Result<(), PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        self.require_idle("start recording")?;
        self.dirs.ensure()?;
        let recorder = StreamRecorder::create(&self.dirs.stream_path(name), engine)?;
        self.activity = Activity::Recording(recorder);
        Ok(())
    }

    /// Append one frame of `engine` to the active recording
    pub fn record_step<E>(&mut self, engine: &E) -> Result<(), PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        match &mut self.activity {
            Activity::Recording(recorder) => recorder.record_step(engine),
            _ => Err(self.wrong_mode("record a step")),
        }
    }

    /// Close the active recording, returning the number of frames written
    pub fn end_recording(&mut self) -> Result<u64, PersistenceError> {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Recording(recorder) => recorder.finish(),
            other => {
                self.activity = other;
                Err(self.wrong_mode("end recording"))
            }
        }
    }

    // --- Replay ---

    /// Start replaying `Streams/<name>.simstream` into `engine`, loading the first frame
    pub fn start_replay<E>(&mut self, name: &str, engine: &mut E) -> Result<(), PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        self.require_idle("start replay")?;
        let replayer = StreamReplayer::open(&self.dirs.stream_path(name), engine)?;
        self.activity = Activity::Replaying(replayer);
        Ok(())
    }

    /// Move the active replay by its current step
    pub fn update_replay<E>(&mut self, engine: &mut E) -> Result<(), PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        match &mut self.activity {
            Activity::Replaying(replayer) => replayer.update(engine),
            _ => Err(self.wrong_mode("update replay")),
        }
    }

    /// Current replay step, or `None` when not replaying
    pub fn replay_step(&self) -> Option<i32> {
        match &self.activity {
            Activity::Replaying(replayer) => Some(replayer.step()),
            _ => None,
        }
    }

    pub fn set_replay_step(&mut self, step: i32) -> Result<(), PersistenceError> {
        match &mut self.activity {
            Activity::Replaying(replayer) => {
                replayer.set_step(step);
                Ok(())
            }
            _ => Err(self.wrong_mode("set replay step")),
        }
    }

    pub fn replayer(&self) -> Option<&StreamReplayer> {
        match &self.activity {
            Activity::Replaying(replayer) => Some(replayer),
            _ => None,
        }
    }

    pub fn end_replay(&mut self) -> Result<(), PersistenceError> {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Replaying(replayer) => {
                log::info!("Ended replay of {}", replayer.path().display());
                Ok(())
            }
            other => {
                self.activity = other;
                Err(self.wrong_mode("end replay"))
            }
        }
    }

    // --- Snapshots ---

    /// Save `engine` to `SavedStates/<name>.simstate`
    pub fn save_snapshot<E>(&self, name: &str, engine: &E) -> Result<PathBuf, PersistenceError>
    where
        E: StateExchange + ?Sized,
    {
        self.dirs.ensure()?;
        let path = self.dirs.snapshot_path(name);
        save_snapshot(engine, &path)?;
        Ok(path)
    }

    /// Load `SavedStates/<name>.simstate`
    pub fn load_snapshot(&self, name: &str) -> Result<SimulationState, PersistenceError> {
        load_snapshot(&self.dirs.snapshot_path(name))
    }

    /// End whichever mode is active. Called on drop; call it directly to observe flush errors.
    pub fn close(&mut self) -> Result<(), PersistenceError> {
        match self.mode() {
            SessionMode::Recording => self.end_recording().map(|_| ()),
            SessionMode::Replaying => self.end_replay(),
            SessionMode::Idle => Ok(()),
        }
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), PersistenceError> {
        match self.mode() {
            SessionMode::Idle => Ok(()),
            mode => Err(PersistenceError::ResourceState { operation, mode }),
        }
    }

    fn wrong_mode(&self, operation: &'static str) -> PersistenceError {
        PersistenceError::ResourceState {
            operation,
            mode: self.mode(),
        }
    }
}

impl Drop for PersistenceSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close persistence session: {e}");
        }
    }
}
