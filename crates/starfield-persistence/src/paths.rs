//! Save directory layout

use crate::PersistenceError;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

pub const SAVED_STATES_DIR: &str = "SavedStates";
pub const STREAMS_DIR: &str = "Streams";
pub const SNAPSHOT_EXTENSION: &str = "simstate";
pub const STREAM_EXTENSION: &str = "simstream";

/// Resolves bare save names to files under a root directory:
/// `SavedStates/<name>.simstate` and `Streams/<name>.simstream`.
#[derive(Debug, Clone)]
pub struct SaveDirectories {
    root: PathBuf,
}

impl SaveDirectories {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create both save directories if they do not exist yet
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let dirs = Self::new(root);
        dirs.ensure()?;
        Ok(dirs)
    }

    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.saved_states_dir())?;
        std::fs::create_dir_all(self.streams_dir())?;
        log::debug!("Save directories ready under {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn saved_states_dir(&self) -> PathBuf {
        self.root.join(SAVED_STATES_DIR)
    }

    pub fn streams_dir(&self) -> PathBuf {
        self.root.join(STREAMS_DIR)
    }

    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.saved_states_dir()
            .join(with_extension(name, SNAPSHOT_EXTENSION))
    }

    pub fn stream_path(&self, name: &str) -> PathBuf {
        self.streams_dir().join(with_extension(name, STREAM_EXTENSION))
    }
}

impl Default for SaveDirectories {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Append `.ext` unless `name` already carries it
fn with_extension(name: &str, ext: &str) -> String {
    if Path::new(name).extension().is_some_and(|e| e == ext) {
        name.to_owned()
    } else {
        format!("{name}.{ext}")
    }
}

/// Open a file for reading, reporting a missing file separately from other I/O failures
pub(crate) fn open_existing(path: &Path) -> Result<File, PersistenceError> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PersistenceError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => PersistenceError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_get_extensions() {
        let dirs = SaveDirectories::new("root");
        assert_eq!(
            dirs.snapshot_path("galaxy"),
            Path::new("root/SavedStates/galaxy.simstate")
        );
        assert_eq!(
            dirs.stream_path("galaxy"),
            Path::new("root/Streams/galaxy.simstream")
        );
    }

    #[test]
    fn existing_extension_is_kept() {
        let dirs = SaveDirectories::new("root");
        assert_eq!(
            dirs.stream_path("run.simstream"),
            Path::new("root/Streams/run.simstream")
        );
        // Dotted names that are not the extension still get one
        assert_eq!(
            dirs.snapshot_path("run.v2"),
            Path::new("root/SavedStates/run.v2.simstate")
        );
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let path = Path::new("definitely/not/here.simstate");
        match open_existing(path) {
            Err(PersistenceError::FileNotFound { path: reported }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
