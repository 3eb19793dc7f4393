//! # Crunch
//!
//! An incremental static blog builder. Posts are plain-text files with a small
//! header block; the output is a static HTML tree with a home page, an RSS
//! feed, year and month indexes, an archive, static pages, error pages and
//! photo galleries. Posts can also arrive by email, images included.
//!
//! # Architecture: One Store, Many Views
//!
//! The content store (`posts/YYYY/MM/<slug>.md`) is the only source of truth.
//! Everything under `build/` is a view of it and can be thrown away:
//!
//! ```text
//! posts/ ──► DocumentReader ──► Document ──┬─► post page      build/YYYY/MM/<slug>.htm
//!                                          ├─► month index    build/YYYY/MM/index.htm
//!                                          ├─► year index     build/YYYY/index.htm
//!                                          ├─► home           build/index.htm
//!                                          ├─► feed           build/index.xml
//!                                          └─► archive        build/archives.htm
//!
//! email ──► mail::Message ──► Ingestor ──► posts/…  (then published like any post)
//!              └─ image/* ──► MediaPipeline ──► images/posts/<uuid>[_z].jpg
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `crunch.toml` loading, stock defaults, merging and validation |
//! | [`naming`] | Slugs and `_z` / `_thm` variant file names |
//! | [`document`] | Raw text → [`document::Document`]: header, date, slug, alias, markup |
//! | [`alias`] | Short-alias service behind a fail-open resolver |
//! | [`store`] | The `posts/YYYY/MM` tree: listing, ordered lazy enumeration, writes |
//! | [`render`] | Page layouts with Maud |
//! | [`feed`] | RSS 2.0 channel |
//! | [`aggregate`] | Home, feed, indexes and archive; full and incremental rebuilds |
//! | [`site`] | Build tree, post/static/error pages, publish, clean |
//! | [`gallery`] | Gallery folders → pages plus derived image variants |
//! | [`imaging`] | Pure-Rust decode, orientation, scaling and encoding |
//! | [`media`] | Mailed-in image → upright, bounded JPEG variants plus markup |
//! | [`mail`] | Just enough MIME to read a mailed-in post |
//! | [`ingest`] | Sender check, attachments, store write and read-back |
//! | [`artifact`] | Filesystem writes that name the path on failure |
//! | [`output`] | CLI summaries of build reports and ingests |
//!
//! # Design Decisions
//!
//! ## Incremental Rebuilds Are Recomputations
//!
//! Publishing one post rewrites its page, its month and year indexes, the home
//! page and the feed. Memberships are never diffed: each affected aggregate is
//! rendered again from the store with the same code a full build uses. An
//! incremental build is therefore byte-identical to a full one for every
//! artifact it writes, and nothing rendered depends on the clock.
//!
//! ## Partial Failure Is the Normal Case
//!
//! A post that does not parse, an attachment that does not decode or a file
//! that cannot be written is recorded in a
//! [`aggregate::BuildReport`] or [`ingest::IngestOutcome`], and the pass goes
//! on. Only an unreadable content store stops a build, and only a rejected
//! sender or unusable headers stop an ingest.
//!
//! ## Lazy, Newest-First Enumeration
//!
//! The home page and feed need the newest few posts, not all of them.
//! [`store::ContentStore::enumerate`] walks years and months newest first and
//! parses a month only when the consumer reaches it.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), a compile-time
//! HTML macro system. Titles and other values are escaped at interpolation;
//! rendered post bodies are inserted as-is.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, JPEG
//! encoding) and reads EXIF orientation itself. No ImageMagick, no system
//! libraries.

pub mod aggregate;
pub mod alias;
pub mod artifact;
pub mod config;
pub mod document;
pub mod feed;
pub mod gallery;
pub mod imaging;
pub mod ingest;
pub mod mail;
pub mod media;
pub mod naming;
pub mod output;
pub mod render;
pub mod site;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
