use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{FrameError, Result};

const IMAGE_EXTENSION: &str = "png";

/// Directory of uploaded PNGs, addressed by bare filename.
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        is_plain_name(name) && self.path_of(name).is_file()
    }

    /// Stored PNG filenames in lexicographic order.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            if !path.is_file() || !has_image_extension(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn first(&self) -> Result<Option<String>> {
        Ok(self.list()?.into_iter().next())
    }

    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(FrameError::InvalidFilename(name.to_string()));
        }
        let path = self.path_of(name);
        fs::write(&path, bytes)?;
        info!(name, size = bytes.len(), "Stored image");
        Ok(path)
    }

    /// Deletes every stored PNG and returns how many were removed.
    pub fn purge(&self) -> Result<usize> {
        let names = self.list()?;
        for name in &names {
            fs::remove_file(self.path_of(name))?;
            debug!(name = %name, "Removed image");
        }
        Ok(names.len())
    }
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(IMAGE_EXTENSION))
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|n| n == name)
}
