//! Filesystem writes shared by every builder.
//!
//! Directory creation is idempotent so two writers racing to create the same
//! `YYYY/MM` folder both succeed. Every failure carries the path it was about.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// A filesystem operation failed on `path`.
#[derive(Error, Debug)]
#[error("{action} {}: {source}", path.display())]
pub struct FilesystemError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FilesystemError {
    pub fn new(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Create a directory and its parents. Existing directories are fine.
pub fn ensure_dir(path: &Path) -> Result<(), FilesystemError> {
    fs::create_dir_all(path).map_err(|e| FilesystemError::new("create directory", path, e))
}

/// Write `contents` to `path`, creating parent directories first.
pub fn write_artifact(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).map_err(|e| FilesystemError::new("write", path, e))?;
    tracing::debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

/// Read a file to a string, tagging failures with the path.
pub fn read_text(path: &Path) -> Result<String, FilesystemError> {
    fs::read_to_string(path).map_err(|e| FilesystemError::new("read", path, e))
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(from, to).map_err(|e| FilesystemError::new("copy to", to, e))?;
    Ok(())
}

/// Copy a directory tree into `to`. A missing `from` only creates `to`.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    ensure_dir(to)?;
    if !from.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            FilesystemError::new("walk", path, io::Error::from(e))
        })?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2024/03/post.htm");
        write_artifact(&path, "hi").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hi");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b");
        ensure_dir(&dir).unwrap();
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn write_failure_names_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = write_artifact(&blocker.join("child.htm"), "y").unwrap_err();
        assert!(err.path.starts_with(&blocker));
        assert!(err.to_string().contains("file"));
    }

    #[test]
    fn copy_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.txt");
        fs::write(&src, "data").unwrap();
        let dst = tmp.path().join("out/deep/dst.txt");
        copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst).unwrap(), "data");
    }

    #[test]
    fn copy_tree_mirrors_nested_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("public");
        fs::create_dir_all(src.join("css")).unwrap();
        fs::write(src.join("css/app.css"), "body{}").unwrap();
        fs::write(src.join("robots.txt"), "ok").unwrap();
        let dst = tmp.path().join("build");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("css/app.css")).unwrap(), "body{}");
        assert_eq!(fs::read_to_string(dst.join("robots.txt")).unwrap(), "ok");
    }

    #[test]
    fn copy_tree_without_source_creates_target() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("build");
        copy_tree(&tmp.path().join("missing"), &dst).unwrap();
        assert!(dst.is_dir());
    }
}
