//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Summaries lead with what was built or ingested; paths are secondary
//! context on indented lines and are shown relative to the site root.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Wrote 14 artifacts
//!     index.htm
//!     2024/03/index.htm
//! Skipped 1 document
//!     posts/2024/03/bad.md: missing required field `date`
//! Failed 1 write
//!     write build/2024/index.htm: Permission denied (os error 13)
//! ```
//!
//! ## Ingest
//!
//! ```text
//! Created "Hello & World" → posts/2023/11/hello-and-world.md
//!     posted on 2023-11-14 at 10:13 PM
//!     Short: x1y
//!     001 6f1c… → images/posts/6f1c….jpg (4000x3000, resized 940x705)
//!     Skipped pic.png: image could not be decoded: …
//! ```
//!
//! ## Check
//!
//! ```text
//! Content
//! 2024 (3 posts)
//!     03 (2 posts)
//!     01 (1 post)
//! Problems
//!     posts/2024/03/bad.md: missing required field `date`
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::aggregate::BuildReport;
use crate::ingest::IngestOutcome;
use crate::site::Published;
use crate::store::{DocumentFailure, YearLoad};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 post`, `3 posts`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Path relative to `root` when it lies beneath it.
fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn failure_line(failure: &DocumentFailure, root: &Path) -> String {
    format!("{}{}: {}", indent(1), relative(&failure.path, root), failure.error)
}

// ============================================================================
// Build
// ============================================================================

/// Summarise a build pass. `list_written` adds one line per artifact.
pub fn format_build_report(report: &BuildReport, build_root: &Path, root: &Path, list_written: bool) -> Vec<String> {
    let mut lines = vec![format!("Wrote {}", plural(report.written.len(), "artifact"))];
    if list_written {
        lines.extend(
            report
                .written
                .iter()
                .map(|p| format!("{}{}", indent(1), relative(p, build_root))),
        );
    }
    if !report.failures.is_empty() {
        lines.push(format!("Skipped {}", plural(report.failures.len(), "document")));
        lines.extend(report.failures.iter().map(|f| failure_line(f, root)));
    }
    if !report.write_failures.is_empty() {
        lines.push(format!("Failed {}", plural(report.write_failures.len(), "write")));
        lines.extend(
            report
                .write_failures
                .iter()
                .map(|e| format!("{}{} {}: {}", indent(1), e.action, relative(&e.path, root), e.source)),
        );
    }
    if !report.gallery_failures.is_empty() {
        lines.push(format!("Skipped {}", plural(report.gallery_failures.len(), "gallery")));
        lines.extend(
            report
                .gallery_failures
                .iter()
                .map(|f| format!("{}{}: {}", indent(1), f.gallery, f.error)),
        );
    }
    lines
}

pub fn print_build_report(report: &BuildReport, build_root: &Path, root: &Path, list_written: bool) {
    for line in format_build_report(report, build_root, root, list_written) {
        println!("{}", line);
    }
}

// ============================================================================
// Ingest
// ============================================================================

pub fn format_ingest_outcome(outcome: &IngestOutcome, root: &Path) -> Vec<String> {
    let doc = &outcome.document;
    let verb = if outcome.replaced { "Replaced" } else { "Created" };
    let mut lines = vec![
        format!("{verb} \"{}\" → {}", doc.title, relative(&outcome.path, root)),
        format!("{}{}", indent(1), doc.date_pretty()),
    ];
    if !doc.short.is_empty() {
        lines.push(format!("{}Short: {}", indent(1), doc.short));
    }
    for (pos, set) in outcome.media.iter().enumerate() {
        let (w, h) = set.dimensions;
        let size = match set.resized_dimensions {
            Some((rw, rh)) => format!("{w}x{h}, resized {rw}x{rh}"),
            None => format!("{w}x{h}"),
        };
        lines.push(format!(
            "{}{} {} → {} ({size})",
            indent(1),
            format_index(pos + 1),
            set.id,
            relative(&set.original, root)
        ));
        for failure in &set.failures {
            lines.push(format!("{}Not written: {}", indent(2), failure));
        }
    }
    for skipped in &outcome.skipped {
        lines.push(format!("{}Skipped {}: {}", indent(1), skipped.name, skipped.error));
    }
    lines
}

pub fn print_ingest_outcome(outcome: &IngestOutcome, root: &Path) {
    for line in format_ingest_outcome(outcome, root) {
        println!("{}", line);
    }
}

/// One line naming the published post and the stored source it came from.
pub fn format_published(published: &Published, root: &Path) -> String {
    let doc = &published.document;
    format!(
        "Published \"{}\" from {} → {}",
        doc.title,
        relative(&published.path, root),
        doc.url()
    )
}

pub fn print_published(published: &Published, root: &Path) {
    println!("==> {}", format_published(published, root));
}

// ============================================================================
// Check
// ============================================================================

/// Content inventory: posts per year and month, then anything unparseable.
pub fn format_check(years: &[YearLoad], root: &Path) -> Vec<String> {
    let mut lines = vec!["Content".to_string()];
    if years.is_empty() {
        lines.push(format!("{}(no posts)", indent(1)));
    }
    for year in years {
        lines.push(format!("{} ({})", year.year, plural(year.documents.len(), "post")));
        for month in &year.months {
            lines.push(format!(
                "{}{} ({})",
                indent(1),
                month.month,
                plural(month.documents.len(), "post")
            ));
        }
    }
    let failures: Vec<&DocumentFailure> = years.iter().flat_map(|y| y.failures()).collect();
    if !failures.is_empty() {
        lines.push("Problems".to_string());
        lines.extend(failures.iter().map(|f| failure_line(f, root)));
    }
    lines
}

pub fn print_check(years: &[YearLoad], root: &Path) {
    for line in format_check(years, root) {
        println!("{}", line);
    }
}
