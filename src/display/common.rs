use std::fmt;
use std::str::FromStr;

use image::DynamicImage;

use super::error::{FrameError, Result};

/// Counter-clockwise rotation applied to an image before it is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn from_degrees(degrees: i64) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(FrameError::InvalidRotation(other.to_string())),
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// The `image` crate rotates clockwise, so the quarter turns are swapped.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Rotation::Deg0 => image,
            Rotation::Deg90 => image.rotate270(),
            Rotation::Deg180 => image.rotate180(),
            Rotation::Deg270 => image.rotate90(),
        }
    }

    pub fn target_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => (width, height),
            Rotation::Deg90 | Rotation::Deg270 => (height, width),
        }
    }
}

impl FromStr for Rotation {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let degrees = trimmed
            .parse::<i64>()
            .map_err(|_| FrameError::InvalidRotation(trimmed.to_string()))?;
        Rotation::from_degrees(degrees)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}
