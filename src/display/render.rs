use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat};
use tracing::debug;

use super::common::Rotation;
use super::error::{FrameError, Result};

/// Writes the rotated selection to the single file handed to the viewer.
///
/// Every call overwrites the output. A failed render may leave it truncated,
/// so it must not be presented afterwards.
#[derive(Clone, Debug)]
pub struct Renderer {
    output: PathBuf,
}

impl Renderer {
    pub fn new<P: Into<PathBuf>>(output: P) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn render(&self, source: &Path, rotation: Rotation) -> Result<PathBuf> {
        if !source.is_file() {
            return Err(FrameError::SourceNotFound(source.to_path_buf()));
        }
        let image = decode_png(source)?;
        let (w, h) = image.dimensions();
        let rotated = rotation.apply(image);
        rotated
            .save_with_format(&self.output, ImageFormat::Png)
            .map_err(|e| match e {
                ImageError::IoError(io) => FrameError::Io(io),
                other => FrameError::UnsupportedFormat(other.to_string()),
            })?;
        debug!(
            source = %source.display(),
            rotation = rotation.degrees(),
            width = w,
            height = h,
            "Rendered display image"
        );
        Ok(self.output.clone())
    }
}

fn decode_png(source: &Path) -> Result<DynamicImage> {
    let bytes = fs::read(source)?;
    image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| FrameError::UnsupportedFormat(format!("{}: {e}", source.display())))
}
