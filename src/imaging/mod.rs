//! Pixels, without system libraries.
//!
//! - [`calculate_bounded_dimensions`]: the no-upscale fit shared by mailed-in
//!   media and gallery `_z` variants
//! - [`exif`]: orientation tag lookup on encoded JPEG and TIFF bytes
//! - [`VariantJob`]: a file-to-file variant request
//! - [`ImageBackend`]: the trait pipelines call, with [`RustBackend`] on the
//!   `image` crate (Lanczos3 resampling, baseline JPEG)

pub mod backend;
mod calculations;
pub mod exif;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_bounded_dimensions;
pub use exif::Rotation;
pub use params::{Quality, Sharpening, VariantJob, VariantShape};
pub use rust_backend::RustBackend;
