use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::common::Rotation;
use super::error::{FrameError, Result};

const LAST_FILE: &str = "last.txt";
const LAST_ROTATION: &str = "rotation.txt";

/// What the frame should be showing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub selected: Option<String>,
    pub rotation: Rotation,
}

impl DisplayState {
    pub fn new(selected: impl Into<String>, rotation: Rotation) -> Self {
        Self {
            selected: Some(selected.into()),
            rotation,
        }
    }
}

pub trait StateStore: Send {
    /// Absent or unreadable values come back as defaults.
    fn load(&self) -> DisplayState;
    fn set_selected_filename(&self, name: &str) -> Result<()>;
    fn clear_selected_filename(&self) -> Result<()>;
    fn set_rotation(&self, rotation: Rotation) -> Result<()>;
    fn clear(&self) -> Result<()>;

    /// Persists selection and rotation together. If the rotation cannot be
    /// written the previous selection is put back.
    fn save_selection(&self, name: &str, rotation: Rotation) -> Result<()> {
        let previous = self.load();
        self.set_selected_filename(name)?;
        if let Err(e) = self.set_rotation(rotation) {
            let restored = match previous.selected.as_deref() {
                Some(prev) => self.set_selected_filename(prev),
                None => self.clear_selected_filename(),
            };
            if let Err(restore_err) = restored {
                warn!(error = %restore_err, "Failed restoring previous selection");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Keeps the selection and rotation as two small text files.
#[derive(Clone, Debug)]
pub struct FileStateStore {
    filename_path: PathBuf,
    rotation_path: PathBuf,
}

impl FileStateStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            filename_path: dir.join(LAST_FILE),
            rotation_path: dir.join(LAST_ROTATION),
        }
    }

    fn read_value(path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let value = raw.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed reading persisted state");
                None
            }
        }
    }

    fn write_value(path: &Path, value: &str) -> Result<()> {
        fs::write(path, value).map_err(|source| FrameError::Persistence {
            path: path.to_path_buf(),
            source,
        })
    }

    fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FrameError::Persistence {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> DisplayState {
        let selected = Self::read_value(&self.filename_path);
        let rotation = match Self::read_value(&self.rotation_path) {
            Some(raw) => raw.parse::<Rotation>().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring persisted rotation");
                Rotation::Deg0
            }),
            None => Rotation::Deg0,
        };
        DisplayState { selected, rotation }
    }

    fn set_selected_filename(&self, name: &str) -> Result<()> {
        Self::write_value(&self.filename_path, name)
    }

    fn clear_selected_filename(&self) -> Result<()> {
        Self::remove(&self.filename_path)
    }

    fn set_rotation(&self, rotation: Rotation) -> Result<()> {
        Self::write_value(&self.rotation_path, &rotation.to_string())
    }

    fn clear(&self) -> Result<()> {
        self.clear_selected_filename()?;
        Self::remove(&self.rotation_path)
    }
}
