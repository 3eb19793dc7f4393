//! Media pipeline: one attachment in, upright size-bounded JPEG variants out.
//!
//! ## Steps
//!
//! 1. **Decode** the bytes. An unknown container is `UnsupportedFormat`; a
//!    known one with corrupt data is `DecodeFailure`.
//! 2. **Orient** by the EXIF Orientation tag, before any resizing.
//! 3. **Bound**: images within `images.max_width` × `images.max_height` get
//!    no resized variant. Larger ones get an `<id>_z.jpg` that is never
//!    bigger than the original.
//! 4. **Identify and persist**: draw a UUID until `<media>/<id>.jpg` is free,
//!    then write the original and resized variant to the media store and, when
//!    the build tree already has a media folder, to that mirror too.
//! 5. **Fragment**: markup linking the original and showing the resized
//!    variant when there is one. Callers prepend it to a post body.
//!
//! A failed write is kept in [`MediaVariantSet::failures`]. The ingest only
//! fails when no copy of the original made it to disk.

use crate::artifact::{self, FilesystemError};
use crate::config::{SiteConfig, SitePaths};
use crate::imaging::{
    BackendError, ImageBackend, Quality, Rotation, calculate_bounded_dimensions,
};
use crate::naming::{Variant, variant_file_name};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on identifier draws before giving up.
pub const MAX_ID_ATTEMPTS: usize = 16;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("image could not be decoded: {0}")]
    DecodeFailure(String),
    #[error("no free media identifier after {0} attempts")]
    IdentifierExhausted(usize),
    #[error("image was not persisted: {0}")]
    Filesystem(#[from] FilesystemError),
    #[error("image processing failed: {0}")]
    Processing(String),
}

impl From<BackendError> for MediaError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::UnsupportedFormat(msg) => MediaError::UnsupportedFormat(msg),
            BackendError::Decode(msg) => MediaError::DecodeFailure(msg),
            other => MediaError::Processing(other.to_string()),
        }
    }
}

/// The files produced for one ingested image.
#[derive(Debug)]
pub struct MediaVariantSet {
    pub id: String,
    /// Where the upright original was persisted.
    pub original: PathBuf,
    /// Where the bounded variant was persisted, when one was produced.
    pub resized: Option<PathBuf>,
    /// Upright original dimensions.
    pub dimensions: (u32, u32),
    pub resized_dimensions: Option<(u32, u32)>,
    /// Markup to prepend to a post body; ends with a blank line.
    pub fragment: String,
    /// Writes that failed without sinking the ingest.
    pub failures: Vec<FilesystemError>,
}

type IdSource = Box<dyn Fn() -> String + Send + Sync>;

fn uuid_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Turns attachment bytes into persisted variants.
pub struct MediaPipeline<'a> {
    backend: &'a dyn ImageBackend,
    media_root: PathBuf,
    mirror_root: PathBuf,
    url_prefix: String,
    bounds: (u32, u32),
    quality: Quality,
    next_id: IdSource,
}

impl<'a> MediaPipeline<'a> {
    pub fn new(backend: &'a dyn ImageBackend, config: &SiteConfig, paths: &SitePaths) -> Self {
        Self {
            backend,
            media_root: paths.media.clone(),
            mirror_root: paths.media_mirror.clone(),
            url_prefix: config.paths.media_url_prefix(),
            bounds: (config.images.max_width, config.images.max_height),
            quality: Quality::from(&config.images),
            next_id: Box::new(uuid_id),
        }
    }

    /// Replace the identifier generator.
    pub fn with_id_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.next_id = Box::new(source);
        self
    }

    pub fn ingest(&self, bytes: &[u8]) -> Result<MediaVariantSet, MediaError> {
        let decoded = self.backend.decode(bytes)?;
        let rotation = Rotation::detect(bytes);
        let upright = self.backend.orient(decoded, rotation);
        let dimensions = (upright.width(), upright.height());

        let resized = calculate_bounded_dimensions(dimensions, self.bounds)
            .map(|(w, h)| self.backend.scale(&upright, w, h));
        let resized_dimensions = resized.as_ref().map(|img| (img.width(), img.height()));

        let original_jpeg = self.backend.encode_jpeg(&upright, self.quality)?;
        let resized_jpeg = resized
            .as_ref()
            .map(|img| self.backend.encode_jpeg(img, self.quality))
            .transpose()?;

        let id = self.allocate_id()?;
        let original_name = variant_file_name(&id, Variant::Master, "jpg");
        let resized_name = variant_file_name(&id, Variant::Resized, "jpg");

        let mut failures = Vec::new();
        let mirror = self.mirror_root.is_dir();

        let canonical_original = self.media_root.join(&original_name);
        let mut original = store(&canonical_original, &original_jpeg, &mut failures);
        let mut resized_path = resized_jpeg
            .as_ref()
            .and_then(|bytes| store(&self.media_root.join(&resized_name), bytes, &mut failures));

        if mirror {
            let mirrored = store(
                &self.mirror_root.join(&original_name),
                &original_jpeg,
                &mut failures,
            );
            original = original.or(mirrored);
            if let Some(bytes) = &resized_jpeg {
                let mirrored = store(&self.mirror_root.join(&resized_name), bytes, &mut failures);
                resized_path = resized_path.or(mirrored);
            }
        }

        let Some(original) = original else {
            return Err(match failures.into_iter().next() {
                Some(e) => MediaError::Filesystem(e),
                None => MediaError::Processing("original was not written".into()),
            });
        };

        let fragment = self.fragment(&id, resized_path.is_some());
        tracing::info!(id = %id, ?rotation, ?dimensions, ?resized_dimensions, "ingested image");

        Ok(MediaVariantSet {
            id,
            original,
            resized: resized_path,
            dimensions,
            resized_dimensions,
            fragment,
            failures,
        })
    }

    /// Draw identifiers until `<media>/<id>.jpg` does not exist.
    fn allocate_id(&self) -> Result<String, MediaError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.next_id)();
            let candidate = self
                .media_root
                .join(variant_file_name(&id, Variant::Master, "jpg"));
            if !candidate.exists() {
                return Ok(id);
            }
            tracing::debug!(id = %id, "media identifier taken, drawing again");
        }
        Err(MediaError::IdentifierExhausted(MAX_ID_ATTEMPTS))
    }

    fn fragment(&self, id: &str, has_resized: bool) -> String {
        let variant = if has_resized {
            Variant::Resized
        } else {
            Variant::Master
        };
        format!(
            "<p style=\"text-align:center;\"><a href=\"{prefix}/{original}\"><img class=\"scale-with-grid\" src=\"{prefix}/{shown}\" /></a></p>\n\n",
            prefix = self.url_prefix,
            original = variant_file_name(id, Variant::Master, "jpg"),
            shown = variant_file_name(id, variant, "jpg"),
        )
    }
}

/// Write one file, recording a failure instead of returning it.
fn store(path: &Path, bytes: &[u8], failures: &mut Vec<FilesystemError>) -> Option<PathBuf> {
    match artifact::write_artifact(path, bytes) {
        Ok(()) => Some(path.to_path_buf()),
        Err(e) => {
            tracing::warn!(error = %e, "media write failed");
            failures.push(e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Dimensions;
    use crate::imaging::backend::tests::{MockBackend, MockFailure, RecordedOp};
    use crate::test_helpers::SiteFixture;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn scripted_ids(ids: &[&str]) -> impl Fn() -> String + Send + Sync + 'static {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(ids.iter().map(|s| s.to_string()).collect());
        move || queue.lock().unwrap().pop_front().unwrap_or_else(|| "fallback".into())
    }

    #[test]
    fn small_image_has_no_resized_variant() {
        let site = SiteFixture::new();
        let backend = MockBackend::decoding(vec![dims(800, 600)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["abc"]));

        let set = pipeline.ingest(b"img").unwrap();
        assert_eq!(set.id, "abc");
        assert!(set.resized.is_none());
        assert_eq!(set.original, site.paths().media.join("abc.jpg"));
        assert!(set.original.is_file());
        assert!(set.fragment.contains("src=\"/images/posts/abc.jpg\""));
        assert!(
            !backend
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Scale { .. }))
        );
    }

    #[test]
    fn large_landscape_is_bounded() {
        let site = SiteFixture::new();
        let backend = MockBackend::decoding(vec![dims(4000, 3000)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["big"]));

        let set = pipeline.ingest(b"img").unwrap();
        assert_eq!(set.resized_dimensions, Some((940, 705)));
        assert!(site.paths().media.join("big_z.jpg").is_file());
        assert_eq!(
            set.fragment,
            "<p style=\"text-align:center;\"><a href=\"/images/posts/big.jpg\"><img class=\"scale-with-grid\" src=\"/images/posts/big_z.jpg\" /></a></p>\n\n"
        );
    }

    #[test]
    fn collision_draws_again() {
        let site = SiteFixture::new();
        let media = site.paths().media;
        fs::create_dir_all(&media).unwrap();
        fs::write(media.join("taken.jpg"), "x").unwrap();

        let backend = MockBackend::decoding(vec![dims(10, 10)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["taken", "free"]));

        let set = pipeline.ingest(b"img").unwrap();
        assert_eq!(set.id, "free");
        assert_eq!(fs::read_to_string(media.join("taken.jpg")).unwrap(), "x");
    }

    #[test]
    fn identifier_exhaustion() {
        let site = SiteFixture::new();
        let media = site.paths().media;
        fs::create_dir_all(&media).unwrap();
        fs::write(media.join("same.jpg"), "x").unwrap();

        let backend = MockBackend::decoding(vec![dims(10, 10)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(|| "same".to_string());

        assert!(matches!(
            pipeline.ingest(b"img"),
            Err(MediaError::IdentifierExhausted(MAX_ID_ATTEMPTS))
        ));
    }

    #[test]
    fn mirror_written_only_when_present() {
        let site = SiteFixture::new();
        let backend = MockBackend::decoding(vec![dims(2000, 1000), dims(10, 10)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["one", "two"]));

        pipeline.ingest(b"img").unwrap();
        assert!(!site.paths().media_mirror.join("one.jpg").exists());

        fs::create_dir_all(&site.paths().media_mirror).unwrap();
        pipeline.ingest(b"img").unwrap();
        assert!(site.paths().media_mirror.join("two.jpg").is_file());
        assert!(site.paths().media_mirror.join("two_z.jpg").is_file());
    }

    #[test]
    fn mirror_failure_is_recorded_not_fatal() {
        let site = SiteFixture::new();
        let mirror = site.paths().media_mirror;
        fs::create_dir_all(&mirror).unwrap();
        // A directory where the mirrored file should go makes that write fail.
        fs::create_dir_all(mirror.join("m.jpg")).unwrap();

        let backend = MockBackend::decoding(vec![dims(10, 10)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["m"]));

        let set = pipeline.ingest(b"img").unwrap();
        assert_eq!(set.failures.len(), 1);
        assert!(set.original.starts_with(site.paths().media));
    }

    #[test]
    fn nothing_persisted_is_filesystem_error() {
        let site = SiteFixture::new();
        // The media root is a file, so nothing can be written beneath it.
        let media = site.paths().media;
        fs::create_dir_all(media.parent().unwrap()).unwrap();
        fs::write(&media, "blocker").unwrap();

        let backend = MockBackend::decoding(vec![dims(10, 10)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["z"]));

        assert!(matches!(pipeline.ingest(b"img"), Err(MediaError::Filesystem(_))));
    }

    #[test]
    fn decode_errors_map_to_media_errors() {
        let site = SiteFixture::new();
        let unsupported = MockBackend::failing_decode(MockFailure::Unsupported);
        let corrupt = MockBackend::failing_decode(MockFailure::Corrupt);
        assert!(matches!(
            MediaPipeline::new(&unsupported, &site.config, &site.paths()).ingest(b"x"),
            Err(MediaError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            MediaPipeline::new(&corrupt, &site.config, &site.paths()).ingest(b"x"),
            Err(MediaError::DecodeFailure(_))
        ));
    }

    #[test]
    fn orientation_applied_before_bounding() {
        let site = SiteFixture::new();
        // Stored landscape, tagged "rotate 90": upright it is a tall portrait.
        let tagged = crate::imaging::exif::tests::jpeg_with_orientation(&[0xFF, 0xD8, 0xFF, 0xD9], 6);
        let backend = MockBackend::decoding(vec![dims(4000, 3000)]);
        let pipeline = MediaPipeline::new(&backend, &site.config, &site.paths())
            .with_id_source(scripted_ids(&["rot"]));

        let set = pipeline.ingest(&tagged).unwrap();
        assert_eq!(set.dimensions, (3000, 4000));
        assert_eq!(set.resized_dimensions, Some((705, 940)));
        let ops = backend.get_operations();
        assert_eq!(ops[1], RecordedOp::Orient(Rotation::Rotate90));
    }
}
