//! Shared test utilities for the crunch test suite.
//!
//! Provides a throwaway site root with the stock layout, plus writers for
//! posts, pages and gallery files, and snapshot helpers for comparing build
//! trees.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new();
//! site.post("2024/03/hello.md", "Hello", 1_709_300_000);
//! let store = site.store();
//! assert_eq!(store.recent(1).0[0].title, "Hello");
//! ```

use crate::alias::AliasResolver;
use crate::config::{SitePaths, SiteConfig};
use crate::document::DocumentReader;
use crate::store::ContentStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// A site root in a temp directory with default config.
pub struct SiteFixture {
    pub tmp: TempDir,
    pub config: SiteConfig,
}

impl SiteFixture {
    pub fn new() -> Self {
        let mut config = SiteConfig::default();
        config.site.title = "Test Site".into();
        config.site.base_url = "http://example.com/".into();
        Self {
            tmp: TempDir::new().unwrap(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn paths(&self) -> SitePaths {
        self.config.paths.resolve(self.root())
    }

    pub fn build_dir(&self) -> PathBuf {
        self.paths().build
    }

    pub fn reader(&self) -> DocumentReader {
        DocumentReader::new(
            self.config.utc_offset(),
            &self.config.site.base_url,
            Arc::new(AliasResolver::disabled()),
        )
    }

    pub fn store(&self) -> ContentStore {
        ContentStore::new(self.paths().posts, &self.config.build.extension, self.reader())
    }

    /// Write a post with a title and epoch date under the posts folder.
    pub fn post(&self, rel: &str, title: &str, epoch: i64) {
        self.raw(rel, &format!("title: {title}\ndate: {epoch}\n\nBody of {title}."));
    }

    /// Write raw text under the posts folder.
    pub fn raw(&self, rel: &str, text: &str) {
        write(&self.paths().posts.join(rel), text.as_bytes());
    }

    /// Write a static page source.
    pub fn page(&self, file_name: &str, text: &str) {
        write(&self.paths().pages.join(file_name), text.as_bytes());
    }

    /// Write a file inside a gallery folder.
    pub fn gallery_file(&self, gallery: &str, file_name: &str, bytes: &[u8]) {
        write(&self.paths().galleries.join(gallery).join(file_name), bytes);
    }

    /// Write a file under `public/`.
    pub fn public_file(&self, rel: &str, text: &str) {
        write(&self.paths().public.join(rel), text.as_bytes());
    }

    /// Read an artifact from the build tree. Panics with the path on miss.
    pub fn read_build(&self, rel: &str) -> String {
        let path = self.build_dir().join(rel);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }
}

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

// =========================================================================
// Images and snapshots
// =========================================================================

/// Encode a small gradient JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    use image::ImageEncoder;
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Every file under `dir`, keyed by relative path.
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}
