//! Document model: raw text with a `key: value` header into a typed [`Document`].
//!
//! ## Raw format
//!
//! ```text
//! title: Hello & World
//! date: 1700000000
//! author: Andrew
//! short: x1y
//!
//! Body text in Markdown...
//! ```
//!
//! The header ends at the first blank line. A file with no blank line is all
//! header and has an empty body. `date` accepts epoch seconds (integer or
//! fractional, fraction dropped), RFC 3339 or RFC 2822.
//!
//! The same contract covers posts, static pages and gallery descriptions;
//! [`DocumentKind`] only changes where a document is published.

use crate::alias::AliasResolver;
use crate::naming::slugify;
use chrono::{DateTime, FixedOffset, Timelike};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed header at line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid date {0:?}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Post,
    Page,
    Gallery,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Post => "post",
            DocumentKind::Page => "page",
            DocumentKind::Gallery => "gallery",
        }
    }
}

/// A parsed document. Immutable for the rest of a build pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocumentKind,
    pub title: String,
    /// Second precision, in the site's offset.
    pub timestamp: DateTime<FixedOffset>,
    /// Derived from `title`; never read from the header.
    pub slug: String,
    /// Short alias, empty when unavailable.
    pub short: String,
    pub author: Option<String>,
    pub raw_body: String,
    pub rendered_body: String,
    pub source_extension: String,
    /// Header keys with no meaning to the builder, kept verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Document {
    /// Four-digit year, `"2024"`.
    pub fn year(&self) -> String {
        self.timestamp.format("%Y").to_string()
    }

    /// Two-digit month, `"03"`.
    pub fn month(&self) -> String {
        self.timestamp.format("%m").to_string()
    }

    /// Site-relative permalink, `/YYYY/MM/slug`.
    pub fn url(&self) -> String {
        post_url(&self.timestamp, &self.slug)
    }

    /// Permalink joined onto the site's base URL.
    pub fn absolute_url(&self, base_url: &str) -> String {
        join_url(base_url, &self.url())
    }

    /// `posted on 2024-03-01`, with ` at 09:05 PM` unless exactly midnight.
    pub fn date_pretty(&self) -> String {
        let ts = &self.timestamp;
        if ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 {
            ts.format("posted on %Y-%m-%d").to_string()
        } else {
            ts.format("posted on %Y-%m-%d at %I:%M %p").to_string()
        }
    }

    pub fn date_rfc2822(&self) -> String {
        self.timestamp.to_rfc2822()
    }

    /// `2024-03-01T21:05:00`, no offset.
    pub fn date_iso(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    /// Public alias link, or `None` when the document has no alias.
    pub fn short_url(&self, public_prefix: &str) -> Option<String> {
        (!self.short.is_empty()).then(|| format!("{public_prefix}{}", self.short))
    }
}

/// `/YYYY/MM/slug` for a timestamp and slug.
pub fn post_url(timestamp: &DateTime<FixedOffset>, slug: &str) -> String {
    format!("{}/{slug}", timestamp.format("/%Y/%m"))
}

/// Join a site-relative path onto a base URL with exactly one slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Parses raw text into documents, with the site's offset and alias source.
#[derive(Clone)]
pub struct DocumentReader {
    offset: FixedOffset,
    base_url: String,
    aliases: Arc<AliasResolver>,
}

impl DocumentReader {
    pub fn new(offset: FixedOffset, base_url: &str, aliases: Arc<AliasResolver>) -> Self {
        Self {
            offset,
            base_url: base_url.to_string(),
            aliases,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    /// Same reader with alias lookups turned off.
    pub fn without_aliases(&self) -> Self {
        Self {
            offset: self.offset,
            base_url: self.base_url.clone(),
            aliases: Arc::new(AliasResolver::disabled()),
        }
    }

    /// Parse one document. `extension` selects the body transform.
    pub fn parse(
        &self,
        kind: DocumentKind,
        raw: &str,
        extension: &str,
    ) -> Result<Document, ParseError> {
        let normalized = raw.replace("\r\n", "\n");
        let (header_text, body) = match normalized.split_once("\n\n") {
            Some((header, body)) => (header, body),
            None => (normalized.as_str(), ""),
        };

        let mut fields = parse_header(header_text)?;
        let title = take_required(&mut fields, "title")?;
        let date = take_required(&mut fields, "date")?;
        let timestamp = parse_date(&date)?.with_timezone(&self.offset);
        let slug = slugify(&title);
        let author = fields.remove("author").filter(|a| !a.is_empty());
        // The header slug is informational; the derived one is authoritative.
        fields.remove("slug");

        let short = match fields.remove("short") {
            Some(short) if !short.is_empty() => short,
            _ if kind == DocumentKind::Post => self
                .aliases
                .resolve(&join_url(&self.base_url, &post_url(&timestamp, &slug))),
            _ => String::new(),
        };

        let rendered_body = render_body(body, extension);

        Ok(Document {
            kind,
            title,
            timestamp,
            slug,
            short,
            author,
            raw_body: body.to_string(),
            rendered_body,
            source_extension: extension.to_string(),
            extra: fields,
        })
    }
}

fn take_required(
    fields: &mut BTreeMap<String, String>,
    name: &'static str,
) -> Result<String, ParseError> {
    fields
        .remove(name)
        .filter(|v| !v.is_empty())
        .ok_or(ParseError::MissingField(name))
}

/// Split header lines into a key/value map.
///
/// Lines starting with `#` are comments. Matching surrounding quotes are removed.
pub fn parse_header(text: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut fields = BTreeMap::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(ParseError::MalformedHeader {
                line: line_no,
                reason: "expected `key: value`".into(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::MalformedHeader {
                line: line_no,
                reason: "empty key".into(),
            });
        }
        let value = unquote(value.trim()).to_string();
        if fields.insert(key.to_string(), value).is_some() {
            return Err(ParseError::MalformedHeader {
                line: line_no,
                reason: format!("duplicate key `{key}`"),
            });
        }
    }
    Ok(fields)
}

pub(crate) fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse a header date: epoch seconds, RFC 3339 or RFC 2822.
pub fn parse_date(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let invalid = || ParseError::InvalidDate(value.to_string());
    let value = value.trim();

    if let Ok(secs) = value.parse::<i64>() {
        return epoch(secs).ok_or_else(invalid);
    }
    if let Ok(secs) = value.parse::<f64>() {
        if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
            return Err(invalid());
        }
        return epoch(secs.trunc() as i64).ok_or_else(invalid);
    }
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.with_nanosecond(0).unwrap_or(dt))
        .map_err(|_| invalid())
}

fn epoch(secs: i64) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.fixed_offset())
}

/// Markdown for `md`/`markdown`, verbatim for anything else.
pub fn render_body(body: &str, extension: &str) -> String {
    if is_markdown(extension) {
        render_markdown(body)
    } else {
        tracing::warn!(extension, "no markup processor, using raw body");
        body.to_string()
    }
}

fn is_markdown(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("md") || extension.eq_ignore_ascii_case("markdown")
}

pub fn render_markdown(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    let parser = Parser::new_ext(body, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}
