//! Photo galleries.
//!
//! ```text
//! galleries/                         build/galleries/
//! └── trip/                          ├── index.htm        (listing)
//!     ├── meta.md                    └── trip/
//!     ├── beach.jpg                      ├── index.htm    (thumbnail grid)
//!     ├── beach_z.jpg                    ├── beach.htm    (single image)
//!     └── dunes.png                      ├── beach.jpg, beach_z.jpg, beach_thm.jpg
//!                                        └── dunes.png, dunes_z.png, dunes_thm.png
//! ```
//!
//! `meta.<ext>` is a gallery document: title, date and a description body.
//! Every image file is copied. A master (no `_z` or `_thm` suffix) gets a
//! page of its own, and any variant the source folder lacks is derived with
//! the imaging backend: `_z` bounded like mailed-in media, `_thm` a square
//! centre crop of `galleries.thumbnail_size`. Variants keep the master's
//! extension.
//!
//! Each gallery succeeds or fails on its own; one broken gallery never stops
//! the others.

use crate::aggregate::BuildReport;
use crate::artifact::{self, FilesystemError};
use crate::config::{SiteConfig, SitePaths};
use crate::document::{Document, DocumentKind, DocumentReader};
use crate::imaging::{
    BackendError, ImageBackend, Quality, VariantJob, calculate_bounded_dimensions,
};
use crate::naming::{Variant, parse_variant, variant_file_name};
use crate::render::{GalleryImage, Renderer};
use crate::store::LoadError;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File stem of the gallery metadata document.
pub const META_STEM: &str = "meta";

/// Extensions treated as gallery images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("no {0} in gallery")]
    MissingMeta(String),
    #[error("gallery metadata: {0}")]
    Meta(#[from] LoadError),
    #[error("cannot derive {output}: {source}")]
    Imaging {
        output: PathBuf,
        source: BackendError,
    },
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// A gallery that was skipped, and why.
#[derive(Debug)]
pub struct GalleryFailure {
    pub gallery: String,
    pub error: GalleryError,
}

/// A built gallery, for the listing page.
struct Built {
    name: String,
    document: Document,
}

/// Builds galleries from `galleries/` into the build tree.
pub struct GalleryBuilder<'a> {
    paths: &'a SitePaths,
    extension: &'a str,
    reader: DocumentReader,
    renderer: &'a Renderer,
    backend: &'a dyn ImageBackend,
    bounds: (u32, u32),
    thumbnail_size: u32,
    quality: Quality,
}

impl<'a> GalleryBuilder<'a> {
    pub fn new(
        config: &'a SiteConfig,
        paths: &'a SitePaths,
        reader: &DocumentReader,
        renderer: &'a Renderer,
        backend: &'a dyn ImageBackend,
    ) -> Self {
        Self {
            paths,
            extension: &config.build.extension,
            reader: reader.without_aliases(),
            renderer,
            backend,
            bounds: (config.images.max_width, config.images.max_height),
            thumbnail_size: config.galleries.thumbnail_size,
            quality: Quality::from(&config.images),
        }
    }

    /// Gallery folder names, sorted. A missing galleries root has none.
    pub fn names(&self) -> Result<Vec<String>, FilesystemError> {
        let root = &self.paths.galleries;
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(root).map_err(|e| FilesystemError::new("list galleries", root, e))?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Build every gallery and the listing page.
    pub fn build_all(&self) -> Result<BuildReport, FilesystemError> {
        let mut report = BuildReport::default();
        let mut built = Vec::new();
        for name in self.names()? {
            match self.build_gallery(&name, &mut report) {
                Ok(document) => built.push(Built { name, document }),
                Err(error) => {
                    tracing::warn!(gallery = %name, %error, "skipping gallery");
                    report.gallery_failures.push(GalleryFailure {
                        gallery: name,
                        error,
                    });
                }
            }
        }

        built.sort_by(|a, b| b.document.timestamp.cmp(&a.document.timestamp));
        let listing: Vec<(&str, &Document)> = built
            .iter()
            .map(|b| (b.name.as_str(), &b.document))
            .collect();
        let html = self.renderer.gallery_listing(&listing).into_string();
        report.write(self.paths.galleries_output.join("index.htm"), html);
        Ok(report)
    }

    /// Build one gallery by folder name.
    pub fn build(&self, name: &str) -> Result<BuildReport, GalleryError> {
        let mut report = BuildReport::default();
        self.build_gallery(name, &mut report)?;
        Ok(report)
    }

    fn build_gallery(&self, name: &str, report: &mut BuildReport) -> Result<Document, GalleryError> {
        let source = self.paths.galleries.join(name);
        let output = self.paths.galleries_output.join(name);
        let document = self.load_meta(&source)?;
        artifact::ensure_dir(&output)?;

        let files = image_files(&source)?;
        for file in &files {
            artifact::copy_file(&source.join(file), &output.join(file))?;
        }

        let mut images = Vec::new();
        for file in &files {
            let Some((stem, ext)) = file.rsplit_once('.') else {
                continue;
            };
            if parse_variant(stem).1 != Variant::Master {
                continue;
            }
            let image = GalleryImage {
                name: stem.to_string(),
                master: file.clone(),
                resized: variant_file_name(stem, Variant::Resized, ext),
                thumbnail: variant_file_name(stem, Variant::Thumbnail, ext),
            };
            self.derive_missing(&output, &image)?;

            let page = self.renderer.gallery_image_page(&document.title, &image);
            report.write(output.join(image.page()), page.into_string());
            images.push(image);
        }

        let index = self.renderer.gallery_index(&document, &images);
        report.write(output.join("index.htm"), index.into_string());
        tracing::info!(gallery = name, images = images.len(), "built gallery");
        Ok(document)
    }

    fn load_meta(&self, source: &Path) -> Result<Document, GalleryError> {
        let file_name = format!("{META_STEM}.{}", self.extension);
        let path = source.join(&file_name);
        if !path.is_file() {
            return Err(GalleryError::MissingMeta(file_name));
        }
        let text = artifact::read_text(&path).map_err(LoadError::from)?;
        let document = self
            .reader
            .parse(DocumentKind::Gallery, &text, self.extension)
            .map_err(LoadError::from)?;
        Ok(document)
    }

    /// Derive `_z` and `_thm` in `output` unless they were copied in.
    fn derive_missing(&self, output: &Path, image: &GalleryImage) -> Result<(), GalleryError> {
        let master = output.join(&image.master);

        let resized = output.join(&image.resized);
        if !resized.exists() {
            let dims = self
                .backend
                .identify(&master)
                .map_err(|source| imaging_error(&resized, source))?;
            match calculate_bounded_dimensions(dims.into(), self.bounds) {
                Some(bounded) => self
                    .backend
                    .derive(&VariantJob::bounded(&master, &resized, bounded, self.quality))
                    .map_err(|source| imaging_error(&resized, source))?,
                None => artifact::copy_file(&master, &resized)?,
            }
        }

        let thumbnail = output.join(&image.thumbnail);
        if !thumbnail.exists() {
            self.backend
                .derive(&VariantJob::square(
                    &master,
                    &thumbnail,
                    self.thumbnail_size,
                    self.quality,
                ))
                .map_err(|source| imaging_error(&thumbnail, source))?;
        }
        Ok(())
    }
}

fn imaging_error(output: &Path, source: BackendError) -> GalleryError {
    GalleryError::Imaging {
        output: output.to_path_buf(),
        source,
    }
}

fn is_image(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Image file names in a gallery folder, sorted.
fn image_files(dir: &Path) -> Result<Vec<String>, FilesystemError> {
    let entries = fs::read_dir(dir).map_err(|e| FilesystemError::new("list gallery", dir, e))?;
    let mut files: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| is_image(name))
        .collect();
    files.sort();
    Ok(files)
}
