//! Aggregate pages: home, feed, archive, year and month indexes.
//!
//! ## Dependency edges
//!
//! | Aggregate | Contains a document when |
//! |---|---|
//! | `MonthIndex(y, m)` | its year and month are `y`, `m` |
//! | `YearIndex(y)` | its year is `y` |
//! | `Home` | it is among the newest `home_count` documents |
//! | `Feed` | it is among the newest `feed_count` documents |
//! | `Archive` | always (titles only) |
//!
//! Memberships are recomputed from the store on every run.
//!
//! ## Full and incremental builds
//!
//! [`AggregateBuilder::rebuild_all`] writes everything. After a single
//! document lands, [`AggregateBuilder::rebuild_for_document`] writes only its
//! month and year indexes plus home and feed. Both paths load months through
//! the same store calls and render with the same functions, so an artifact
//! written by either is byte-identical.

use crate::artifact::{self, FilesystemError};
use crate::config::SiteConfig;
use crate::document::Document;
use crate::feed;
use crate::gallery::GalleryFailure;
use crate::render::{ArchiveMonth, ArchiveYear, Renderer};
use crate::store::{ContentStore, DocumentFailure, YearLoad};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A page whose content depends on many documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Home,
    Feed,
    MonthIndex { year: String, month: String },
    YearIndex { year: String },
    Archive,
}

impl Aggregate {
    /// Where the aggregate is written inside the build tree.
    pub fn output_path(&self, build_dir: &Path) -> PathBuf {
        match self {
            Aggregate::Home => build_dir.join("index.htm"),
            Aggregate::Feed => build_dir.join("index.xml"),
            Aggregate::Archive => build_dir.join("archives.htm"),
            Aggregate::YearIndex { year } => build_dir.join(year).join("index.htm"),
            Aggregate::MonthIndex { year, month } => {
                build_dir.join(year).join(month).join("index.htm")
            }
        }
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregate::Home => write!(f, "home"),
            Aggregate::Feed => write!(f, "feed"),
            Aggregate::Archive => write!(f, "archive"),
            Aggregate::YearIndex { year } => write!(f, "index {year}"),
            Aggregate::MonthIndex { year, month } => write!(f, "index {year}/{month}"),
        }
    }
}

/// A pass that could not run at all.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cannot read content store: {0}")]
    Store(#[from] FilesystemError),
    #[error("cannot prepare build tree: {0}")]
    Tree(FilesystemError),
}

/// Outcome of a build pass.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Artifacts written, in write order.
    pub written: Vec<PathBuf>,
    /// Documents skipped because they failed to load.
    pub failures: Vec<DocumentFailure>,
    /// Artifacts that could not be written.
    pub write_failures: Vec<FilesystemError>,
    /// Galleries skipped as a whole.
    pub gallery_failures: Vec<GalleryFailure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self.write_failures.is_empty()
            && self.gallery_failures.is_empty()
    }

    /// Record a load failure once per path.
    pub fn add_failure(&mut self, failure: DocumentFailure) {
        if !self.failures.iter().any(|f| f.path == failure.path) {
            self.failures.push(failure);
        }
    }

    pub fn merge(&mut self, other: BuildReport) {
        self.written.extend(other.written);
        for failure in other.failures {
            self.add_failure(failure);
        }
        self.write_failures.extend(other.write_failures);
        self.gallery_failures.extend(other.gallery_failures);
    }

    /// Write `contents` to `path`, recording the outcome instead of failing.
    pub fn write(&mut self, path: PathBuf, contents: impl AsRef<[u8]>) {
        match artifact::write_artifact(&path, contents) {
            Ok(()) => self.written.push(path),
            Err(e) => {
                tracing::warn!(error = %e, "artifact write failed");
                self.write_failures.push(e);
            }
        }
    }
}

/// Renders and writes aggregates from a content store.
pub struct AggregateBuilder<'a> {
    config: &'a SiteConfig,
    store: &'a ContentStore,
    renderer: Renderer,
    build_dir: PathBuf,
}

impl<'a> AggregateBuilder<'a> {
    pub fn new(config: &'a SiteConfig, store: &'a ContentStore, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            store,
            renderer: Renderer::new(config),
            build_dir: build_dir.into(),
        }
    }

    /// Aggregates that must be rewritten when `doc` is added or changed.
    ///
    /// Home and Feed are always included: a new document can push another
    /// one out even when it does not rank itself.
    pub fn affected_by(&self, doc: &Document) -> Vec<Aggregate> {
        let year = doc.year();
        vec![
            Aggregate::MonthIndex {
                year: year.clone(),
                month: doc.month(),
            },
            Aggregate::YearIndex { year },
            Aggregate::Home,
            Aggregate::Feed,
        ]
    }

    /// Write every aggregate.
    pub fn rebuild_all(&self) -> Result<BuildReport, BuildError> {
        let years = self.load_all()?;
        Ok(self.write_all(years))
    }

    fn write_all(&self, mut years: Vec<YearLoad>) -> BuildReport {
        let mut report = BuildReport::default();
        for year in &years {
            self.write_year(year, &mut report);
        }
        self.write_archive(&years, &mut report);

        // Enumeration order: years, then months, newest first; month-local order within.
        let ordered: Vec<&Document> = years
            .iter()
            .flat_map(|y| y.months.iter())
            .flat_map(|m| m.documents.iter())
            .collect();
        let take = |n: usize| -> Vec<Document> {
            ordered.iter().take(n).map(|d| (*d).clone()).collect()
        };
        self.write_home(&take(self.config.build.home_count), &mut report);
        self.write_feed(&take(self.config.build.feed_count), &mut report);

        take_failures(&mut years, &mut report);
        report
    }

    /// Write the aggregates affected by `doc`. The archive is left alone.
    ///
    /// An index whose directories could not all be listed is not rewritten,
    /// so a partial listing never replaces a complete one.
    pub fn rebuild_for_document(&self, doc: &Document) -> BuildReport {
        let mut report = BuildReport::default();
        let mut year = self.store.load_year(&doc.year());

        let month = doc.month();
        match year.months.iter().find(|m| m.month == month) {
            Some(load) => self.write_month(&year.year, &load.month, &load.documents, &mut report),
            None if year.is_complete() => self.write_month(&year.year, &month, &[], &mut report),
            None => {}
        }
        if year.is_complete() {
            self.write_year_index(&year, &mut report);
        }

        self.rebuild_recent(&mut report);
        take_failures(std::slice::from_mut(&mut year), &mut report);
        report
    }

    /// Rewrite only the home page.
    pub fn rebuild_home(&self) -> BuildReport {
        let mut report = BuildReport::default();
        let (docs, failures) = self.store.recent(self.config.build.home_count);
        failures.into_iter().for_each(|f| report.add_failure(f));
        self.write_home(&docs, &mut report);
        report
    }

    /// Rewrite only the feed.
    pub fn rebuild_feed(&self) -> BuildReport {
        let mut report = BuildReport::default();
        let (docs, failures) = self.store.recent(self.config.build.feed_count);
        failures.into_iter().for_each(|f| report.add_failure(f));
        self.write_feed(&docs, &mut report);
        report
    }

    /// Rewrite every year index, month index and the archive.
    pub fn rebuild_indexes(&self) -> Result<BuildReport, BuildError> {
        let mut years = self.load_all()?;
        let mut report = BuildReport::default();
        for year in &years {
            self.write_year(year, &mut report);
        }
        self.write_archive(&years, &mut report);
        take_failures(&mut years, &mut report);
        Ok(report)
    }

    fn rebuild_recent(&self, report: &mut BuildReport) {
        let home_count = self.config.build.home_count;
        let feed_count = self.config.build.feed_count;
        let (docs, failures) = self.store.recent(home_count.max(feed_count));
        failures.into_iter().for_each(|f| report.add_failure(f));
        self.write_home(&docs[..home_count.min(docs.len())], report);
        self.write_feed(&docs[..feed_count.min(docs.len())], report);
    }

    /// Every year of the store. Only an unlistable store root is an error.
    fn load_all(&self) -> Result<Vec<YearLoad>, BuildError> {
        Ok(self
            .store
            .years()?
            .iter()
            .map(|year| self.store.load_year(year))
            .collect())
    }

    fn write_year(&self, year: &YearLoad, report: &mut BuildReport) {
        for month in &year.months {
            self.write_month(&year.year, &month.month, &month.documents, report);
        }
        if year.is_complete() {
            self.write_year_index(year, report);
        } else {
            tracing::warn!(year = %year.year, "year index not rewritten: directories unreadable");
        }
    }

    fn write_month(&self, year: &str, month: &str, docs: &[Document], report: &mut BuildReport) {
        let aggregate = Aggregate::MonthIndex {
            year: year.to_string(),
            month: month.to_string(),
        };
        let html = self.renderer.month_page(year, month, docs).into_string();
        report.write(aggregate.output_path(&self.build_dir), html);
    }

    fn write_year_index(&self, year: &YearLoad, report: &mut BuildReport) {
        let aggregate = Aggregate::YearIndex {
            year: year.year.clone(),
        };
        let html = self.renderer.year_page(&year.year, &year.documents).into_string();
        report.write(aggregate.output_path(&self.build_dir), html);
    }

    fn write_archive(&self, years: &[YearLoad], report: &mut BuildReport) {
        let archive: Vec<ArchiveYear<'_>> = years
            .iter()
            .map(|y| ArchiveYear {
                year: &y.year,
                months: y
                    .months
                    .iter()
                    .map(|m| ArchiveMonth {
                        month: &m.month,
                        documents: &m.documents,
                    })
                    .collect(),
            })
            .collect();
        let html = self.renderer.archive_page(&archive).into_string();
        report.write(Aggregate::Archive.output_path(&self.build_dir), html);
    }

    fn write_home(&self, docs: &[Document], report: &mut BuildReport) {
        let html = self.renderer.home_page(docs).into_string();
        report.write(Aggregate::Home.output_path(&self.build_dir), html);
    }

    fn write_feed(&self, docs: &[Document], report: &mut BuildReport) {
        let xml = feed::render_feed(self.config, docs);
        report.write(Aggregate::Feed.output_path(&self.build_dir), xml);
    }
}

/// Move load failures out of the loaded years into the report.
fn take_failures(years: &mut [YearLoad], report: &mut BuildReport) {
    for failure in years.iter_mut().flat_map(YearLoad::take_failures) {
        report.add_failure(failure);
    }
}
