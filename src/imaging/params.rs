//! What a derived image variant should look like.
//!
//! A [`VariantJob`] names a source file, an output file and a [`VariantShape`].
//! Galleries build jobs for their missing `_z` and `_thm` files and hand them
//! to an [`ImageBackend`](super::ImageBackend); the backend decides how.

use crate::config::ImagesConfig;
use std::path::PathBuf;

/// JPEG quality, always within 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl From<&ImagesConfig> for Quality {
    fn from(images: &ImagesConfig) -> Self {
        Self::new(images.quality)
    }
}

/// Unsharp mask applied after a thumbnail crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Enough to keep a 150px crop from looking soft.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantShape {
    /// Scale to exactly these dimensions (already bounded by the caller).
    Bounded { width: u32, height: u32 },
    /// Fill an `edge` x `edge` square, cropping the overflow around the centre.
    Square {
        edge: u32,
        sharpening: Option<Sharpening>,
    },
}

/// One variant to derive from a file on disk. The output format follows the
/// output extension.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub shape: VariantShape,
    pub quality: Quality,
}

impl VariantJob {
    pub fn bounded(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        (width, height): (u32, u32),
        quality: Quality,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            shape: VariantShape::Bounded { width, height },
            quality,
        }
    }

    /// Sharpened square thumbnail.
    pub fn square(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        edge: u32,
        quality: Quality,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            shape: VariantShape::Square {
                edge,
                sharpening: Some(Sharpening::light()),
            },
            quality,
        }
    }
}
