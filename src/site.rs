//! Whole-site builds: the build tree, post pages, static pages, error pages,
//! aggregates and galleries.
//!
//! [`Site`] owns the content store for one site root and hands out the
//! builders that write into `build/`. Every method returns a
//! [`BuildReport`]; per-document and per-artifact failures land there and
//! the pass goes on. Only a content store that cannot be listed stops a pass.
//!
//! Posts are published from the store. A source that lives elsewhere is
//! written into `posts/YYYY/MM/` first and read back from there.

use crate::aggregate::{AggregateBuilder, BuildError, BuildReport};
use crate::alias::AliasResolver;
use crate::artifact::{self, FilesystemError};
use crate::config::{SiteConfig, SitePaths};
use crate::document::{Document, DocumentKind, DocumentReader, ParseError};
use crate::gallery::GalleryBuilder;
use crate::imaging::ImageBackend;
use crate::ingest::{IngestError, IngestOutcome, Ingestor};
use crate::render::Renderer;
use crate::store::{ContentStore, DocumentFailure, LoadError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Status codes that get an error page.
pub const ERROR_CODES: [u16; 8] = [400, 401, 403, 404, 500, 502, 503, 509];

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("post does not parse: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
    #[error("stored post does not read back: {0}")]
    ReadBack(#[from] LoadError),
}

/// A post that is in the store and has been published.
#[derive(Debug)]
pub struct Published {
    pub document: Document,
    /// The stored source.
    pub path: PathBuf,
    pub report: BuildReport,
}

pub struct Site<'a> {
    config: &'a SiteConfig,
    paths: SitePaths,
    store: ContentStore,
    renderer: Renderer,
}

impl<'a> Site<'a> {
    pub fn new(config: &'a SiteConfig, root: &Path, aliases: Arc<AliasResolver>) -> Self {
        let paths = config.paths.resolve(root);
        let reader = DocumentReader::new(config.utc_offset(), &config.site.base_url, aliases);
        let store = ContentStore::new(paths.posts.clone(), &config.build.extension, reader);
        Self {
            config,
            paths,
            store,
            renderer: Renderer::new(config),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        self.config
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn aggregates(&self) -> AggregateBuilder<'_> {
        AggregateBuilder::new(self.config, &self.store, &self.paths.build)
    }

    /// Create `build/` from `public/` and the media store when it does not
    /// exist yet. Returns whether it was created.
    pub fn ensure_build_tree(&self) -> Result<bool, FilesystemError> {
        if self.paths.build.exists() {
            return Ok(false);
        }
        tracing::info!(build = %self.paths.build.display(), "creating build tree");
        artifact::copy_tree(&self.paths.public, &self.paths.build)?;
        artifact::copy_tree(&self.paths.media, &self.paths.media_mirror)?;
        artifact::ensure_dir(&self.paths.galleries_output)?;
        Ok(true)
    }

    /// `build/YYYY/MM/<slug>.htm`
    pub fn post_output_path(&self, doc: &Document) -> PathBuf {
        self.paths
            .build
            .join(doc.year())
            .join(doc.month())
            .join(format!("{}.htm", doc.slug))
    }

    /// Write one post page.
    pub fn build_post(&self, doc: &Document) -> BuildReport {
        let mut report = BuildReport::default();
        let html = self.renderer.post_page(doc).into_string();
        report.write(self.post_output_path(doc), html);
        report
    }

    /// Write a post page and every aggregate it affects.
    ///
    /// `doc` must have been read from the store; aggregates are recomputed
    /// from the store, so a document that is not in it appears nowhere but
    /// on its own page. Use [`Site::publish_file`] or
    /// [`Site::publish_source`] for anything else.
    pub fn publish(&self, doc: &Document) -> BuildReport {
        let mut report = self.build_post(doc);
        report.merge(self.aggregates().rebuild_for_document(doc));
        report
    }

    /// Publish a post file. A file already at its place in the store is
    /// published as is; any other file is stored first.
    pub fn publish_file(&self, path: &Path) -> Result<Published, PublishError> {
        let text = artifact::read_text(path)?;
        let parsed = self.locate(&text)?;
        if self.is_stored_at(path, &parsed) {
            let document = self.store.load_path(path)?;
            let report = self.publish(&document);
            return Ok(Published {
                document,
                path: path.to_path_buf(),
                report,
            });
        }
        self.publish_source(&text)
    }

    /// Write raw post text to `posts/YYYY/MM/<slug>.<ext>`, read it back and
    /// publish the stored copy.
    pub fn publish_source(&self, text: &str) -> Result<Published, PublishError> {
        let parsed = self.locate(text)?;
        let path = self
            .store
            .write_document(&parsed.year(), &parsed.month(), &parsed.slug, text)?;
        tracing::info!(path = %path.display(), "stored post");
        let document = self.store.load_path(&path)?;
        let report = self.publish(&document);
        Ok(Published {
            document,
            path,
            report,
        })
    }

    /// Ingest one message and publish the post it produced. The build tree
    /// is created only once the message has been accepted.
    pub fn ingest(
        &self,
        ingestor: &Ingestor<'_>,
        raw: &[u8],
    ) -> Result<(IngestOutcome, BuildReport), IngestError> {
        let outcome = ingestor.ingest(raw)?;
        self.ensure_build_tree()?;
        let report = self.publish(&outcome.document);
        Ok((outcome, report))
    }

    /// Parse just far enough to know where a post belongs. No alias lookup.
    fn locate(&self, text: &str) -> Result<Document, ParseError> {
        self.store
            .reader()
            .without_aliases()
            .parse(DocumentKind::Post, text, self.store.extension())
    }

    /// Whether `path` is a store entry the month listing will find.
    fn is_stored_at(&self, path: &Path, doc: &Document) -> bool {
        let month_dir = self.store.root().join(doc.year()).join(doc.month());
        let same_dir = match (path.parent().map(fs::canonicalize), fs::canonicalize(&month_dir)) {
            (Some(Ok(parent)), Ok(month_dir)) => parent == month_dir,
            _ => false,
        };
        same_dir && path.extension().is_some_and(|ext| ext == self.store.extension())
    }

    /// Write every post page in the store. A year or month that cannot be
    /// listed is reported and the rest are built.
    pub fn build_posts(&self) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        for year in self.store.years()? {
            let mut load = self.store.load_year(&year);
            for doc in load.months.iter().flat_map(|m| m.documents.iter()) {
                report.merge(self.build_post(doc));
            }
            for failure in load.take_failures() {
                report.add_failure(failure);
            }
        }
        Ok(report)
    }

    /// `pages/<name>.<ext>` to `build/<name>.htm`.
    pub fn build_pages(&self) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        let reader = self.store.reader().without_aliases();
        for path in self.page_sources()? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let loaded = artifact::read_text(&path)
                .map_err(LoadError::from)
                .and_then(|text| {
                    reader
                        .parse(DocumentKind::Page, &text, self.store.extension())
                        .map_err(LoadError::from)
                });
            match loaded {
                Ok(doc) => {
                    let url = format!("/{name}.htm");
                    let html = self.renderer.static_page(&doc, &url).into_string();
                    report.write(self.paths.build.join(format!("{name}.htm")), html);
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping page");
                    report.add_failure(DocumentFailure { path, error });
                }
            }
        }
        Ok(report)
    }

    fn page_sources(&self) -> Result<Vec<PathBuf>, FilesystemError> {
        let dir = &self.paths.pages;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let wanted = self.store.extension();
        let entries = fs::read_dir(dir).map_err(|e| FilesystemError::new("list pages", dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == wanted))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// `build/error/<code>.htm` for each of [`ERROR_CODES`].
    pub fn build_errors(&self) -> BuildReport {
        let mut report = BuildReport::default();
        for code in ERROR_CODES {
            let html = self.renderer.error_page(code).into_string();
            report.write(
                self.paths.build.join("error").join(format!("{code}.htm")),
                html,
            );
        }
        report
    }

    /// Every gallery plus the gallery listing.
    pub fn build_galleries(&self, backend: &dyn ImageBackend) -> Result<BuildReport, BuildError> {
        let galleries = GalleryBuilder::new(
            self.config,
            &self.paths,
            self.store.reader(),
            &self.renderer,
            backend,
        );
        Ok(galleries.build_all()?)
    }

    /// Everything: tree, error pages, static pages, posts, aggregates and
    /// galleries.
    pub fn build_all(&self, backend: &dyn ImageBackend) -> Result<BuildReport, BuildError> {
        self.ensure_build_tree().map_err(BuildError::Tree)?;
        let mut report = self.build_errors();
        report.merge(self.build_pages()?);
        report.merge(self.build_posts()?);
        report.merge(self.aggregates().rebuild_all()?);
        report.merge(self.build_galleries(backend)?);
        tracing::info!(
            written = report.written.len(),
            failures = report.failures.len(),
            "site built"
        );
        Ok(report)
    }

    /// Remove the build tree. Returns whether there was one.
    pub fn clean(&self) -> Result<bool, FilesystemError> {
        let build = &self.paths.build;
        if !build.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(build).map_err(|e| FilesystemError::new("remove", build, e))?;
        Ok(true)
    }
}
