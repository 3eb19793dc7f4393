//! [`ImageBackend`] on the `image` crate.
//!
//! | Operation | Implementation |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::load_from_memory_with_format` |
//! | Orient | `DynamicImage::rotate90/180/270` |
//! | Scale, bounded variant | `resize_exact`, `Lanczos3` |
//! | Square variant | `resize_to_fill` then `unsharpen` |
//! | Encode | `JpegEncoder`; other outputs by extension |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::exif::Rotation;
use super::params::{Quality, VariantJob, VariantShape};
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageFormat, ImageReader};
use std::path::Path;

/// Containers whose decoders are compiled in.
const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| BackendError::Decode(format!("{}: {e}", path.display())))
}

fn jpeg_bytes(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    // Quality is clamped to 1..=100, so the narrowing is lossless.
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.value() as u8)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(out)
}

/// Write `img` in the format named by the extension of `path`.
fn save(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path)
        .map_err(|_| BackendError::Encode(format!("no format for {}", path.display())))?;
    if format == ImageFormat::Jpeg {
        std::fs::write(path, jpeg_bytes(img, quality)?)?;
        return Ok(());
    }
    img.save_with_format(path, format)
        .map_err(|e| BackendError::Encode(format!("{}: {e}", path.display())))
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        let format = image::guess_format(bytes)
            .map_err(|_| BackendError::UnsupportedFormat("unrecognised container".into()))?;
        if !DECODABLE.contains(&format) {
            return Err(BackendError::UnsupportedFormat(format!("{format:?}")));
        }
        image::load_from_memory_with_format(bytes, format)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn orient(&self, image: DynamicImage, rotation: Rotation) -> DynamicImage {
        match rotation {
            Rotation::None => image,
            Rotation::Rotate90 => image.rotate90(),
            Rotation::Rotate180 => image.rotate180(),
            Rotation::Rotate270 => image.rotate270(),
        }
    }

    fn scale(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        jpeg_bytes(image, quality)
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| BackendError::Unreadable(format!("{}: {e}", path.display())))?;
        Ok(Dimensions { width, height })
    }

    fn derive(&self, job: &VariantJob) -> Result<(), BackendError> {
        let master = open(&job.source)?;
        let variant = match job.shape {
            VariantShape::Bounded { width, height } => self.scale(&master, width, height),
            VariantShape::Square { edge, sharpening } => {
                let filled = master.resize_to_fill(edge, edge, FilterType::Lanczos3);
                match sharpening {
                    Some(s) => DynamicImage::from(image::imageops::unsharpen(
                        &filled,
                        s.sigma,
                        s.threshold,
                    )),
                    None => filled,
                }
            }
        };
        save(&variant, &job.output, job.quality)
    }
}
