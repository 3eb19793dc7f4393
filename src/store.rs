//! Content store: the on-disk tree of post sources.
//!
//! ```text
//! posts/
//! ├── 2024/
//! │   ├── 03/
//! │   │   ├── hello-and-world.md
//! │   │   └── second-post.md
//! │   └── 01/
//! └── 2023/
//! ```
//!
//! Only directories named with exactly four ASCII digits (years) and exactly
//! two (months) are walked, and only files with the configured extension are
//! documents. Everything else in the tree is ignored.
//!
//! The store is read-only during a build pass. [`ContentStore::write_document`]
//! is the one mutation and runs before a pass starts.
//!
//! ## Ordering
//!
//! Within a month, files are read in file-name order and then stable-sorted
//! by timestamp, newest first, so documents with equal timestamps always
//! come out in the same order. [`ContentStore::enumerate`] walks years and
//! months newest first and parses a month only when it gets there.

use crate::artifact::{self, FilesystemError};
use crate::document::{Document, DocumentKind, DocumentReader, ParseError};
use rayon::prelude::*;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a single document could not be loaded.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Read(#[from] FilesystemError),
}

/// A document (or directory) that was skipped, and why.
#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: LoadError,
}

impl From<FilesystemError> for DocumentFailure {
    fn from(error: FilesystemError) -> Self {
        Self {
            path: error.path.clone(),
            error: error.into(),
        }
    }
}

/// Every document of one month, newest first.
#[derive(Debug)]
pub struct MonthLoad {
    pub year: String,
    pub month: String,
    pub documents: Vec<Document>,
    pub failures: Vec<DocumentFailure>,
}

/// Every readable document of one year.
#[derive(Debug)]
pub struct YearLoad {
    pub year: String,
    /// Newest month first. Months that could not be listed are absent.
    pub months: Vec<MonthLoad>,
    /// All documents of the year, newest first.
    pub documents: Vec<Document>,
    /// The year or month directories that could not be listed.
    pub unreadable: Vec<DocumentFailure>,
}

impl YearLoad {
    /// Assemble a year from per-month results. A month that failed is
    /// recorded in `unreadable` and its siblings are kept.
    pub fn from_months(year: &str, loads: Vec<Result<MonthLoad, FilesystemError>>) -> Self {
        let mut months = Vec::new();
        let mut unreadable = Vec::new();
        for load in loads {
            match load {
                Ok(month) => months.push(month),
                Err(error) => {
                    tracing::warn!(%year, %error, "skipping unreadable directory");
                    unreadable.push(DocumentFailure::from(error));
                }
            }
        }
        let mut documents: Vec<Document> = months
            .iter()
            .flat_map(|m| m.documents.iter().cloned())
            .collect();
        sort_newest_first(&mut documents);

        Self {
            year: year.to_string(),
            months,
            documents,
            unreadable,
        }
    }

    /// True when every directory of the year could be listed.
    pub fn is_complete(&self) -> bool {
        self.unreadable.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentFailure> {
        self.unreadable
            .iter()
            .chain(self.months.iter().flat_map(|m| m.failures.iter()))
    }

    /// Move every failure out, leaving the documents in place.
    pub fn take_failures(&mut self) -> Vec<DocumentFailure> {
        let mut failures: Vec<DocumentFailure> = self.unreadable.drain(..).collect();
        for month in &mut self.months {
            failures.append(&mut month.failures);
        }
        failures
    }
}

/// Stable sort, newest first. Equal timestamps keep their input order.
pub fn sort_newest_first(docs: &mut [Document]) {
    docs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn is_digits(name: &str, len: usize) -> bool {
    name.len() == len && name.bytes().all(|b| b.is_ascii_digit())
}

/// Read-only view over `<root>/<YYYY>/<MM>/<slug>.<ext>`.
pub struct ContentStore {
    root: PathBuf,
    extension: String,
    reader: DocumentReader,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>, extension: &str, reader: DocumentReader) -> Self {
        Self {
            root: root.into(),
            extension: extension.to_string(),
            reader,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn reader(&self) -> &DocumentReader {
        &self.reader
    }

    /// Sorted names of subdirectories of `dir` matching `len` digits.
    fn digit_dirs(&self, dir: &Path, len: usize) -> Result<Vec<String>, FilesystemError> {
        let entries =
            fs::read_dir(dir).map_err(|e| FilesystemError::new("read directory", dir, e))?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| is_digits(name, len))
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Year folders, newest first. A missing root is an empty store.
    pub fn years(&self) -> Result<Vec<String>, FilesystemError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        self.digit_dirs(&self.root, 4)
    }

    /// Month folders of a year, newest first.
    pub fn months(&self, year: &str) -> Result<Vec<String>, FilesystemError> {
        self.digit_dirs(&self.root.join(year), 2)
    }

    /// Document files of a month, in file-name order.
    pub fn entries(&self, year: &str, month: &str) -> Result<Vec<PathBuf>, FilesystemError> {
        let dir = self.root.join(year).join(month);
        let suffix = format!(".{}", self.extension);
        let entries =
            fs::read_dir(&dir).map_err(|e| FilesystemError::new("read directory", &dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter(|e| e.file_name().to_string_lossy().ends_with(&suffix))
            .map(|e| e.path())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Read and parse a single document file.
    pub fn load_path(&self, path: &Path) -> Result<Document, LoadError> {
        let raw = artifact::read_text(path)?;
        Ok(self.reader.parse(DocumentKind::Post, &raw, &self.extension)?)
    }

    /// Parse every document of a month.
    ///
    /// Files are parsed in parallel; results are collected in file-name order
    /// before the stable sort, so the outcome matches a sequential pass.
    pub fn load_month(&self, year: &str, month: &str) -> Result<MonthLoad, FilesystemError> {
        let paths = self.entries(year, month)?;
        let results: Vec<(PathBuf, Result<Document, LoadError>)> = paths
            .into_par_iter()
            .map(|path| {
                let result = self.load_path(&path);
                (path, result)
            })
            .collect();

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for (path, result) in results {
            match result {
                Ok(doc) => documents.push(doc),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping document");
                    failures.push(DocumentFailure { path, error });
                }
            }
        }
        sort_newest_first(&mut documents);

        Ok(MonthLoad {
            year: year.to_string(),
            month: month.to_string(),
            documents,
            failures,
        })
    }

    /// Parse every month of a year. Directories that cannot be listed are
    /// recorded in the result rather than ending the load.
    pub fn load_year(&self, year: &str) -> YearLoad {
        let loads = match self.months(year) {
            Ok(months) => months
                .iter()
                .map(|month| self.load_month(year, month))
                .collect(),
            Err(error) => vec![Err(error)],
        };
        YearLoad::from_months(year, loads)
    }

    /// Lazily walk the newest `limit` documents.
    pub fn enumerate(&self, limit: usize) -> Enumeration<'_> {
        let mut failures = Vec::new();
        let years = match self.years() {
            Ok(years) => years.into(),
            Err(error) => {
                failures.push(error.into());
                VecDeque::new()
            }
        };
        Enumeration {
            store: self,
            years,
            current_year: None,
            months: VecDeque::new(),
            pending: VecDeque::new(),
            remaining: limit,
            failures,
            months_parsed: 0,
        }
    }

    /// The newest `limit` documents and anything skipped on the way.
    pub fn recent(&self, limit: usize) -> (Vec<Document>, Vec<DocumentFailure>) {
        let mut walk = self.enumerate(limit);
        let documents: Vec<Document> = walk.by_ref().collect();
        (documents, walk.into_failures())
    }

    /// Where a document with this year, month and slug lives.
    pub fn path_for(&self, year: &str, month: &str, slug: &str) -> PathBuf {
        self.root
            .join(year)
            .join(month)
            .join(format!("{slug}.{}", self.extension))
    }

    /// Write raw document text, creating the year and month folders.
    pub fn write_document(
        &self,
        year: &str,
        month: &str,
        slug: &str,
        text: &str,
    ) -> Result<PathBuf, FilesystemError> {
        let path = self.path_for(year, month, slug);
        artifact::write_artifact(&path, text)?;
        Ok(path)
    }
}

/// Iterator over the store, newest month first.
///
/// Parse failures are skipped and kept for [`Enumeration::failures`].
pub struct Enumeration<'s> {
    store: &'s ContentStore,
    years: VecDeque<String>,
    current_year: Option<String>,
    months: VecDeque<String>,
    pending: VecDeque<Document>,
    remaining: usize,
    failures: Vec<DocumentFailure>,
    months_parsed: usize,
}

impl Enumeration<'_> {
    pub fn failures(&self) -> &[DocumentFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<DocumentFailure> {
        self.failures
    }

    /// How many months have been parsed so far.
    pub fn months_parsed(&self) -> usize {
        self.months_parsed
    }

    fn record(&mut self, error: FilesystemError) {
        self.failures.push(error.into());
    }
}

impl Iterator for Enumeration<'_> {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            if let Some(doc) = self.pending.pop_front() {
                self.remaining -= 1;
                return Some(doc);
            }
            if let Some(month) = self.months.pop_front() {
                let Some(year) = self.current_year.clone() else {
                    continue;
                };
                match self.store.load_month(&year, &month) {
                    Ok(load) => {
                        self.months_parsed += 1;
                        self.failures.extend(load.failures);
                        self.pending.extend(load.documents);
                    }
                    Err(error) => self.record(error),
                }
                continue;
            }
            let year = self.years.pop_front()?;
            match self.store.months(&year) {
                Ok(months) => self.months = months.into(),
                Err(error) => self.record(error),
            }
            self.current_year = Some(year);
        }
    }
}
