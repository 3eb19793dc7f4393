//! Site configuration module.
//!
//! Handles loading, validating, and merging `crunch.toml`. The stock defaults
//! are serialized to a TOML table and the user's file is merged on top of
//! them, so a config file only needs the keys it wants to change.
//!
//! The resulting [`SiteConfig`] is immutable. It is built once in `main` and
//! handed to each component at construction; nothing reads configuration
//! from ambient state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "crunch"
//! tagline = ""
//! author = ""
//! description = ""
//! base_url = "http://localhost/"
//! utc_offset = "+00:00"       # Zone used for dates, URLs and year/month folders
//!
//! [paths]                     # Relative to the site root
//! posts = "posts"
//! pages = "pages"
//! galleries = "galleries"
//! media = "images/posts"      # Also mirrored under <build>/images/posts
//! public = "public"           # Copied into a fresh build tree
//! build = "build"
//!
//! [build]
//! home_count = 10
//! feed_count = 20
//! extension = "md"
//!
//! [images]
//! max_width = 940             # Larger attachments get an <id>_z.jpg variant
//! max_height = 940
//! quality = 90
//!
//! [galleries]
//! thumbnail_size = 150
//!
//! [ingest]
//! sender = ""                 # Regex matched against From; empty rejects all mail
//!
//! [alias]
//! # endpoint = "http://amd.im/api-create/"
//! public_prefix = ""
//! timeout_secs = 5
//!
//! [processing]
//! max_processes = 4           # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use chrono::{FixedOffset, Offset, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file at the site root.
pub const CONFIG_FILE: &str = "crunch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `crunch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Identity of the site, used by every layout and the feed channel.
    pub site: SiteInfo,
    /// Directory layout, relative to the site root.
    pub paths: PathsConfig,
    /// Aggregate sizes and the document extension.
    pub build: BuildConfig,
    /// Bounds for ingested attachments.
    pub images: ImagesConfig,
    pub galleries: GalleriesConfig,
    /// Mail-in posting.
    pub ingest: IngestConfig,
    /// External short-alias service.
    pub alias: AliasConfig,
    /// Parallel parsing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.home_count == 0 || self.build.feed_count == 0 {
            return Err(ConfigError::Validation(
                "build.home_count and build.feed_count must be non-zero".into(),
            ));
        }
        if self.build.extension.is_empty() || self.build.extension.contains('.') {
            return Err(ConfigError::Validation(
                "build.extension must be a bare extension such as \"md\"".into(),
            ));
        }
        if self.images.max_width == 0 || self.images.max_height == 0 {
            return Err(ConfigError::Validation(
                "images.max_width and images.max_height must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.galleries.thumbnail_size == 0 {
            return Err(ConfigError::Validation(
                "galleries.thumbnail_size must be non-zero".into(),
            ));
        }
        if parse_utc_offset(&self.site.utc_offset).is_none() {
            return Err(ConfigError::Validation(format!(
                "site.utc_offset must look like +HH:MM, got {:?}",
                self.site.utc_offset
            )));
        }
        self.ingest.sender_pattern()?;
        Ok(())
    }

    /// The fixed offset all timestamps are displayed and partitioned in.
    pub fn utc_offset(&self) -> FixedOffset {
        parse_utc_offset(&self.site.utc_offset).unwrap_or_else(|| Utc.fix())
    }
}

/// Site identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteInfo {
    pub title: String,
    pub tagline: String,
    pub author: String,
    pub description: String,
    /// Absolute URL of the site root; feed links and aliases are built from it.
    pub base_url: String,
    /// Offset such as `"+00:00"` or `"-08:00"`.
    pub utc_offset: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "crunch".to_string(),
            tagline: String::new(),
            author: String::new(),
            description: String::new(),
            base_url: "http://localhost/".to_string(),
            utc_offset: "+00:00".to_string(),
        }
    }
}

/// Directory layout relative to the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub posts: String,
    pub pages: String,
    pub galleries: String,
    /// Media store, also used as the mirrored path under `build`.
    pub media: String,
    pub public: String,
    pub build: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            posts: "posts".to_string(),
            pages: "pages".to_string(),
            galleries: "galleries".to_string(),
            media: "images/posts".to_string(),
            public: "public".to_string(),
            build: "build".to_string(),
        }
    }
}

impl PathsConfig {
    /// Resolve every directory against the site root.
    pub fn resolve(&self, root: &Path) -> SitePaths {
        let build = root.join(&self.build);
        SitePaths {
            root: root.to_path_buf(),
            posts: root.join(&self.posts),
            pages: root.join(&self.pages),
            galleries: root.join(&self.galleries),
            media: root.join(&self.media),
            public: root.join(&self.public),
            media_mirror: build.join(&self.media),
            galleries_output: build.join(&self.galleries),
            build,
        }
    }

    /// URL prefix of the media store inside the build tree (`/images/posts`).
    pub fn media_url_prefix(&self) -> String {
        format!("/{}", self.media.trim_matches('/'))
    }

    /// URL prefix of the galleries inside the build tree (`/galleries`).
    pub fn galleries_url_prefix(&self) -> String {
        format!("/{}", self.galleries.trim_matches('/'))
    }
}

/// Absolute directories of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub root: PathBuf,
    pub posts: PathBuf,
    pub pages: PathBuf,
    pub galleries: PathBuf,
    pub media: PathBuf,
    pub public: PathBuf,
    pub build: PathBuf,
    pub media_mirror: PathBuf,
    pub galleries_output: PathBuf,
}

/// Aggregate sizes and document extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Documents on the home page.
    pub home_count: usize,
    /// Items in `index.xml`.
    pub feed_count: usize,
    /// Extension of document files, without the dot.
    pub extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            home_count: 10,
            feed_count: 20,
            extension: "md".to_string(),
        }
    }
}

/// Bounds for ingested images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_width: 940,
            max_height: 940,
            quality: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleriesConfig {
    /// Edge of the square `_thm` crop.
    pub thumbnail_size: u32,
}

impl Default for GalleriesConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: 150,
        }
    }
}

/// Mail-in posting settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Regex searched (case-insensitively) in the `From` header.
    /// Empty means every message is rejected.
    pub sender: String,
}

impl IngestConfig {
    /// Compile the sender pattern. `None` when no sender is configured.
    pub fn sender_pattern(&self) -> Result<Option<Regex>, ConfigError> {
        if self.sender.trim().is_empty() {
            return Ok(None);
        }
        RegexBuilder::new(&self.sender)
            .case_insensitive(true)
            .build()
            .map(Some)
            .map_err(|e| ConfigError::Validation(format!("ingest.sender is not a valid regex: {e}")))
    }
}

/// Short-alias service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AliasConfig {
    /// Creation endpoint; the canonical URL is appended to it.
    /// When absent, no lookups are made and aliases stay empty.
    pub endpoint: Option<String>,
    /// Prefix stripped from the service's reply, and prepended when linking.
    pub public_prefix: String,
    pub timeout_secs: u64,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            public_prefix: String::new(),
            timeout_secs: 5,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel parse workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse `+HH:MM` / `-HH:MM` (also `Z`) into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `crunch.toml` from the site root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `crunch.toml` in the site root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `crunch.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# crunch configuration
# ====================
#
# Every key is optional; the values below are the defaults.

[site]
title = "crunch"
tagline = ""
author = ""
description = ""
# Absolute URL of the site root. Feed links and short aliases use it.
base_url = "http://localhost/"
# Zone for post dates, permalinks and the YYYY/MM folders.
utc_offset = "+00:00"

[paths]
# All relative to the directory holding this file.
posts = "posts"
pages = "pages"
galleries = "galleries"
# Ingested attachments. Mirrored to <build>/<media> when the build tree exists.
media = "images/posts"
# Copied into a fresh build tree.
public = "public"
build = "build"

[build]
home_count = 10
feed_count = 20
# Extension of post and page sources. "md" bodies are rendered as Markdown,
# anything else is used verbatim.
extension = "md"

[images]
# Attachments larger than this get an additional <id>_z.jpg variant.
max_width = 940
max_height = 940
quality = 90

[galleries]
# Square thumbnails generated when a gallery image has no _thm variant.
thumbnail_size = 150

[ingest]
# Regex searched case-insensitively in the From header of incoming mail.
# Empty rejects every message.
sender = ""

[alias]
# Short-alias creation endpoint. The canonical post URL is appended.
# Leave unset to build without network access.
# endpoint = "http://amd.im/api-create/"
# Stripped from the service's reply and used when linking to the alias.
public_prefix = ""
timeout_secs = 5

[processing]
# Maximum parallel parse workers (omit for auto = CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn default_counts_and_bounds() {
        let config = SiteConfig::default();
        assert_eq!(config.build.home_count, 10);
        assert_eq!(config.build.feed_count, 20);
        assert_eq!(config.images.max_width, 940);
        assert_eq!(config.images.max_height, 940);
        assert_eq!(config.alias.endpoint, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[build]
home_count = 5
"#;
        let config = resolve_config(stock_defaults_value(), Some(toml::from_str(toml).unwrap()))
            .unwrap();
        assert_eq!(config.build.home_count, 5);
        assert_eq!(config.build.feed_count, 20);
        assert_eq!(config.paths.posts, "posts");
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site.title, "crunch");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[site]
title = "amdavidson"
base_url = "https://amdavidson.com/"

[ingest]
sender = "me@example\\.com"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site.title, "amdavidson");
        assert_eq!(config.site.base_url, "https://amdavidson.com/");
        assert!(config.ingest.sender_pattern().unwrap().is_some());
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let toml = r#"
[build]
home_cuont = 5
"#;
        let result = resolve_config(stock_defaults_value(), Some(toml::from_str(toml).unwrap()));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml = r#"
[theme]
color = "red"
"#;
        let result = resolve_config(stock_defaults_value(), Some(toml::from_str(toml).unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn validate_zero_home_count() {
        let mut config = SiteConfig::default();
        config.build.home_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_dotted_extension() {
        let mut config = SiteConfig::default();
        config.build.extension = ".md".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = SiteConfig::default();
        config.images.quality = 100;
        assert!(config.validate().is_ok());
        config.images.quality = 0;
        assert!(config.validate().is_err());
        config.images.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bad_sender_regex() {
        let mut config = SiteConfig::default();
        config.ingest.sender = "(unclosed".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_bad_offset() {
        let mut config = SiteConfig::default();
        config.site.utc_offset = "PST".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_sender_has_no_pattern() {
        assert!(IngestConfig::default().sender_pattern().unwrap().is_none());
    }

    #[test]
    fn sender_pattern_is_case_insensitive() {
        let ingest = IngestConfig {
            sender: "me@example\\.com".into(),
        };
        let re = ingest.sender_pattern().unwrap().unwrap();
        assert!(re.is_match("Me <ME@Example.com>"));
    }

    #[test]
    fn parse_offsets() {
        assert_eq!(parse_utc_offset("+00:00").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("-08:00").unwrap().local_minus_utc(), -8 * 3600);
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("0800").is_none());
        assert!(parse_utc_offset("+24:00").is_none());
    }

    #[test]
    fn resolve_paths_against_root() {
        let paths = PathsConfig::default().resolve(Path::new("/site"));
        assert_eq!(paths.posts, PathBuf::from("/site/posts"));
        assert_eq!(paths.media, PathBuf::from("/site/images/posts"));
        assert_eq!(paths.media_mirror, PathBuf::from("/site/build/images/posts"));
        assert_eq!(paths.galleries_output, PathBuf::from("/site/build/galleries"));
    }

    #[test]
    fn media_url_prefix_is_rooted() {
        assert_eq!(PathsConfig::default().media_url_prefix(), "/images/posts");
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value(), Some(value)).unwrap();
        assert_eq!(config.build.home_count, SiteConfig::default().build.home_count);
        assert_eq!(config.site.base_url, SiteConfig::default().site.base_url);
    }
}
