//! Mail-in posting: one message in, one stored post out.
//!
//! The `From` header is checked before anything touches the disk. Image
//! attachments go through the [`MediaPipeline`](crate::media::MediaPipeline)
//! and their fragments lead the body. The composed post is written into the
//! content store and read back through the normal document parser, so what
//! the caller gets is exactly what a later build will see.

use crate::artifact::{self, FilesystemError};
use crate::config::{ConfigError, SiteConfig};
use crate::document::{Document, DocumentKind, ParseError, join_url, post_url, unquote};
use crate::mail::{MailError, Message};
use crate::media::{MediaError, MediaPipeline, MediaVariantSet};
use crate::naming::slugify;
use crate::store::ContentStore;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("sender not allowed: {0:?}")]
    SenderRejected(String),
    #[error("message has no {0} header")]
    MissingHeader(&'static str),
    #[error("unparseable message date: {0:?}")]
    InvalidDate(String),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("stored post does not parse: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// An attachment that could not be turned into media.
#[derive(Debug)]
pub struct SkippedAttachment {
    pub name: String,
    pub error: MediaError,
}

/// What one accepted message produced.
#[derive(Debug)]
pub struct IngestOutcome {
    /// The stored post, as parsed back from disk.
    pub document: Document,
    pub path: PathBuf,
    /// True when a post with the same date and slug was overwritten.
    pub replaced: bool,
    pub media: Vec<MediaVariantSet>,
    pub skipped: Vec<SkippedAttachment>,
}

pub struct Ingestor<'a> {
    config: &'a SiteConfig,
    store: &'a ContentStore,
    media: MediaPipeline<'a>,
    sender: Option<Regex>,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        config: &'a SiteConfig,
        store: &'a ContentStore,
        media: MediaPipeline<'a>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            store,
            media,
            sender: config.ingest.sender_pattern()?,
        })
    }

    pub fn ingest(&self, raw: &[u8]) -> Result<IngestOutcome, IngestError> {
        let message = Message::parse(raw)?;

        let from = message.header("from").unwrap_or_default();
        if !self.sender.as_ref().is_some_and(|re| re.is_match(from)) {
            return Err(IngestError::SenderRejected(from.to_string()));
        }

        let date = message
            .header("date")
            .ok_or(IngestError::MissingHeader("Date"))?;
        let timestamp = parse_mail_date(date)?.with_timezone(&self.config.utc_offset());
        let title = message
            .header("subject")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(IngestError::MissingHeader("Subject"))?
            .to_string();
        let slug = slugify(&title);
        tracing::info!(%title, %slug, date = %timestamp, "accepted message");

        let mut fragments = String::new();
        let mut media = Vec::new();
        let mut skipped = Vec::new();
        for (index, part) in message.images().into_iter().enumerate() {
            let name = part
                .filename()
                .unwrap_or_else(|| format!("attachment {}", index + 1));
            match self.media.ingest(part.body()) {
                Ok(set) => {
                    fragments.push_str(&set.fragment);
                    media.push(set);
                }
                Err(error) => {
                    tracing::warn!(attachment = %name, %error, "skipping attachment");
                    skipped.push(SkippedAttachment { name, error });
                }
            }
        }
        let body = format!("{fragments}{}", message.text_body().unwrap_or_default());

        let reader = self.store.reader();
        let short = reader
            .aliases()
            .resolve(&join_url(reader.base_url(), &post_url(&timestamp, &slug)));

        let text = compose(&title, &timestamp, &self.config.site.author, &slug, &short, &body);
        let year = timestamp.format("%Y").to_string();
        let month = timestamp.format("%m").to_string();
        let replaced = self.store.path_for(&year, &month, &slug).exists();
        if replaced {
            tracing::warn!(%year, %month, %slug, "overwriting existing post");
        }
        let path = self.store.write_document(&year, &month, &slug, &text)?;

        // The alias was looked up above; reading back must not ask again.
        let stored = artifact::read_text(&path)?;
        let document =
            reader
                .without_aliases()
                .parse(DocumentKind::Post, &stored, self.store.extension())?;

        Ok(IngestOutcome {
            document,
            path,
            replaced,
            media,
            skipped,
        })
    }
}

/// RFC 2822 date, tolerating a trailing `(comment)` such as `(UTC)`.
pub fn parse_mail_date(value: &str) -> Result<DateTime<FixedOffset>, IngestError> {
    let trimmed = value.trim();
    let without_comment = match trimmed.rfind('(') {
        Some(open) if trimmed.ends_with(')') => trimmed[..open].trim_end(),
        _ => trimmed,
    };
    DateTime::parse_from_rfc2822(without_comment)
        .map_err(|_| IngestError::InvalidDate(value.to_string()))
}

fn compose(
    title: &str,
    timestamp: &DateTime<FixedOffset>,
    author: &str,
    slug: &str,
    short: &str,
    body: &str,
) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "title: {}", header_value(title));
    let _ = writeln!(text, "date: {}", timestamp.timestamp());
    if !author.is_empty() {
        let _ = writeln!(text, "author: {}", header_value(author));
    }
    let _ = writeln!(text, "slug: {slug}");
    if !short.is_empty() {
        let _ = writeln!(text, "short: {short}");
    }
    text.push('\n');
    text.push_str(body);
    text
}

/// A value that reads back unchanged. Only values wrapped in a matching
/// pair of quotes need quoting themselves.
fn header_value(value: &str) -> Cow<'_, str> {
    if unquote(value) == value {
        return Cow::Borrowed(value);
    }
    let quote = if value.starts_with('"') { '\'' } else { '"' };
    Cow::Owned(format!("{quote}{value}{quote}"))
}
