use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Source image missing: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Presentation denied: {0}")]
    PresentationDenied(String),

    #[error("Invalid rotation {0:?}: expected one of 0, 90, 180, 270")]
    InvalidRotation(String),

    #[error("Invalid filename {0:?}")]
    InvalidFilename(String),

    #[error("Failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
