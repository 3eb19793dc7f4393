//! The seam between pipelines and pixels.
//!
//! Mail attachments go through the in-memory half of [`ImageBackend`]:
//! decode, orient, scale, encode. Nothing touches disk until the media
//! pipeline has chosen an identifier. Gallery variants use the file half:
//! identify a master, then derive a [`VariantJob`] from it.
//!
//! [`RustBackend`](super::rust_backend::RustBackend) is the only production
//! implementation; tests script a recording mock instead.

use super::exif::Rotation;
use super::params::{Quality, VariantJob};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The container is not one we can decode.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    /// The container was recognised but its data is corrupt.
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("cannot read dimensions of {0}")]
    Unreadable(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<Dimensions> for (u32, u32) {
    fn from(d: Dimensions) -> Self {
        (d.width, d.height)
    }
}

pub trait ImageBackend: Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Rotate clockwise by `rotation`.
    fn orient(&self, image: DynamicImage, rotation: Rotation) -> DynamicImage;

    /// Scale to exact dimensions.
    fn scale(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Baseline JPEG bytes.
    fn encode_jpeg(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError>;

    /// Dimensions of an image file, without decoding pixels where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Write `job.output` from `job.source`.
    fn derive(&self, job: &VariantJob) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::VariantShape;
    use std::sync::Mutex;

    /// Records every call. Decoded images are blank canvases of scripted
    /// sizes; derived variants are never written.
    #[derive(Default)]
    pub struct MockBackend {
        pub decode_results: Mutex<Vec<Result<Dimensions, MockFailure>>>,
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockFailure {
        Unsupported,
        Corrupt,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(usize),
        Orient(Rotation),
        Scale { width: u32, height: u32 },
        EncodeJpeg { width: u32, height: u32, quality: u32 },
        Identify(String),
        Derive {
            source: String,
            output: String,
            shape: VariantShape,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Each `decode` pops the next size from the back.
        pub fn decoding(dims: Vec<Dimensions>) -> Self {
            Self {
                decode_results: Mutex::new(dims.into_iter().map(Ok).collect()),
                ..Self::default()
            }
        }

        pub fn failing_decode(failure: MockFailure) -> Self {
            Self {
                decode_results: Mutex::new(vec![Err(failure)]),
                ..Self::default()
            }
        }

        /// Each `identify` pops the next size from the back.
        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl ImageBackend for MockBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Decode(bytes.len()));
            match self.decode_results.lock().unwrap().pop() {
                Some(Ok(d)) => Ok(DynamicImage::new_rgb8(d.width, d.height)),
                Some(Err(MockFailure::Unsupported)) => {
                    Err(BackendError::UnsupportedFormat("mock".into()))
                }
                Some(Err(MockFailure::Corrupt)) | None => Err(BackendError::Decode("mock".into())),
            }
        }

        fn orient(&self, image: DynamicImage, rotation: Rotation) -> DynamicImage {
            self.record(RecordedOp::Orient(rotation));
            match rotation {
                Rotation::Rotate90 | Rotation::Rotate270 => {
                    DynamicImage::new_rgb8(image.height(), image.width())
                }
                _ => image,
            }
        }

        fn scale(&self, _image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
            self.record(RecordedOp::Scale { width, height });
            DynamicImage::new_rgb8(width, height)
        }

        fn encode_jpeg(
            &self,
            image: &DynamicImage,
            quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            self.record(RecordedOp::EncodeJpeg {
                width: image.width(),
                height: image.height(),
                quality: quality.value(),
            });
            Ok(format!("jpeg {}x{}", image.width(), image.height()).into_bytes())
        }

        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            let path = path.to_string_lossy().to_string();
            self.record(RecordedOp::Identify(path.clone()));
            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or(BackendError::Unreadable(path))
        }

        fn derive(&self, job: &VariantJob) -> Result<(), BackendError> {
            self.record(RecordedOp::Derive {
                source: job.source.to_string_lossy().to_string(),
                output: job.output.to_string_lossy().to_string(),
                shape: job.shape,
                quality: job.quality.value(),
            });
            Ok(())
        }
    }

    #[test]
    fn mock_decodes_scripted_size() {
        let backend = MockBackend::decoding(vec![Dimensions {
            width: 800,
            height: 600,
        }]);
        let img = backend.decode(b"abc").unwrap();
        assert_eq!((img.width(), img.height()), (800, 600));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode(3)]);
    }

    #[test]
    fn mock_orient_swaps_quarter_turn() {
        let backend = MockBackend::new();
        let img = backend.orient(DynamicImage::new_rgb8(4, 3), Rotation::Rotate90);
        assert_eq!((img.width(), img.height()), (3, 4));
    }

    #[test]
    fn mock_reports_failures() {
        let backend = MockBackend::failing_decode(MockFailure::Corrupt);
        assert!(matches!(backend.decode(b""), Err(BackendError::Decode(_))));
        let backend = MockBackend::new();
        assert!(matches!(
            backend.identify(Path::new("/g/a.jpg")),
            Err(BackendError::Unreadable(_))
        ));
    }

    #[test]
    fn mock_records_derive() {
        let backend = MockBackend::new();
        backend
            .derive(&VariantJob::bounded(
                "/g/a.jpg",
                "/g/a_z.jpg",
                (800, 600),
                Quality::new(85),
            ))
            .unwrap();

        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Derive {
                source: "/g/a.jpg".into(),
                output: "/g/a_z.jpg".into(),
                shape: VariantShape::Bounded {
                    width: 800,
                    height: 600
                },
                quality: 85,
            }]
        );
    }
}
