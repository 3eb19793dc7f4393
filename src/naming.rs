//! Centralized naming rules: post slugs and image variant file names.
//!
//! ## Slugs
//!
//! A slug is derived from a title and nothing else, so the same title always
//! lands at the same path:
//! - `"Hello & World"` → `hello-and-world`
//! - `"  Rust  2024! "` → `-rust-2024-`
//! - `"¿Qué?"` → `qu`
//!
//! ## Variants
//!
//! Every image may exist in three forms that share a stem:
//! - `abc.jpg` the master (upright, full resolution)
//! - `abc_z.jpg` bounded to the configured maximum size
//! - `abc_thm.jpg` square gallery thumbnail

/// Slug used when a title has no slug-safe characters at all.
pub const FALLBACK_SLUG: &str = "untitled";

/// Derive the URL slug for a title.
///
/// Lowercase, `&` becomes `and`, whitespace becomes `-`, anything outside
/// `[a-z0-9-]` is dropped and runs of `-` collapse to one.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        match c {
            '&' => slug.push_str("and"),
            c if c == '-' || c.is_whitespace() => {
                if !slug.ends_with('-') {
                    slug.push('-');
                }
            }
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => slug.push(c),
            _ => {}
        }
    }
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Which form of an image a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Master,
    Resized,
    Thumbnail,
}

impl Variant {
    /// File-stem suffix for this variant.
    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Master => "",
            Variant::Resized => "_z",
            Variant::Thumbnail => "_thm",
        }
    }
}

/// File name of a variant: `variant_file_name("abc", Variant::Resized, "jpg")` → `abc_z.jpg`.
pub fn variant_file_name(stem: &str, variant: Variant, extension: &str) -> String {
    format!("{stem}{}.{extension}", variant.suffix())
}

/// Split a file stem into its master stem and variant.
///
/// - `"abc_z"` → `("abc", Resized)`
/// - `"abc_thm"` → `("abc", Thumbnail)`
/// - `"abc"` → `("abc", Master)`
pub fn parse_variant(stem: &str) -> (&str, Variant) {
    if let Some(master) = stem.strip_suffix("_thm") {
        (master, Variant::Thumbnail)
    } else if let Some(master) = stem.strip_suffix("_z") {
        (master, Variant::Resized)
    } else {
        (stem, Variant::Master)
    }
}

/// Display title for a file or folder name: dashes and underscores become spaces.
///
/// - `"about-me"` → `"about me"`
/// - `"summer_2019"` → `"summer 2019"`
pub fn display_title(name: &str) -> String {
    name.replace(['-', '_'], " ")
}
