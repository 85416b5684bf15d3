//! Persistence error type

use starfield_simulation::{SimulationError, StreamActivity};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which end of a stream a replay seek ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamBoundary {
    Start,
    End,
}

impl fmt::Display for StreamBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamBoundary::Start => write!(f, "start of stream reached"),
            StreamBoundary::End => write!(f, "end of stream reached"),
        }
    }
}

/// What a [`crate::PersistenceSession`] is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Recording,
    Replaying,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Idle => write!(f, "idle"),
            SessionMode::Recording => write!(f, "recording"),
            SessionMode::Replaying => write!(f, "replaying"),
        }
    }
}

impl From<StreamActivity> for SessionMode {
    fn from(activity: StreamActivity) -> Self {
        match activity {
            StreamActivity::Recording => SessionMode::Recording,
            StreamActivity::Replaying => SessionMode::Replaying,
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot {operation} while {mode}")]
    ResourceState {
        operation: &'static str,
        mode: SessionMode,
    },
    #[error("cannot {operation}: engine is not the one this {mode} started on")]
    EngineMismatch {
        operation: &'static str,
        mode: SessionMode,
    },
    #[error("{0}")]
    StreamBoundary(StreamBoundary),
    #[error("malformed {kind} file: {reason}")]
    Format { kind: &'static str, reason: String },
    #[error("body count changed from {expected} to {actual} during recording")]
    BodyCountChanged { expected: usize, actual: usize },
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

impl PersistenceError {
    /// `true` for the recoverable start/end-of-stream condition
    pub fn is_stream_boundary(&self) -> bool {
        matches!(self, PersistenceError::StreamBoundary(_))
    }

    /// `ResourceState` for an engine already claimed by another stream
    pub(crate) fn engine_busy(operation: &'static str, held: StreamActivity) -> Self {
        PersistenceError::ResourceState {
            operation,
            mode: held.into(),
        }
    }

    pub(crate) fn format(kind: &'static str, reason: impl Into<String>) -> Self {
        PersistenceError::Format {
            kind,
            reason: reason.into(),
        }
    }
}
