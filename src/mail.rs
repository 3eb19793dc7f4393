//! Minimal RFC 5322 / MIME reader for mailed-in posts.
//!
//! Enough of the format to pull a post out of a message: header unfolding,
//! `multipart/*` bodies split on their boundary (recursively), and the
//! `base64`, `quoted-printable`, `7bit`, `8bit` and `binary` transfer
//! encodings. Encoded-word header syntax (RFC 2047) is left as-is.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MailError {
    #[error("multipart part has no boundary parameter")]
    MissingBoundary,
    #[error("invalid {encoding} payload: {reason}")]
    Encoding { encoding: String, reason: String },
}

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    /// Lowercased `type/subtype`.
    pub mime: String,
    /// Parameters with lowercased names and unquoted values.
    pub params: BTreeMap<String, String>,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let mut pieces = value.split(';');
        let mime = pieces.next().unwrap_or("").trim().to_ascii_lowercase();
        let params = pieces
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| {
                (
                    k.trim().to_ascii_lowercase(),
                    v.trim().trim_matches('"').to_string(),
                )
            })
            .collect();
        Self {
            mime: if mime.is_empty() { "text/plain".into() } else { mime },
            params,
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.mime.starts_with("multipart/")
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::parse("text/plain")
    }
}

/// One MIME entity: headers plus either a decoded body or child parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    headers: Vec<(String, String)>,
    content_type: ContentType,
    body: Vec<u8>,
    children: Vec<Part>,
}

impl Part {
    fn parse(raw: &[u8]) -> Result<Self, MailError> {
        let (head, body) = split_head(raw);
        let headers = parse_headers(&String::from_utf8_lossy(head));
        let content_type = lookup(&headers, "content-type")
            .map(ContentType::parse)
            .unwrap_or_default();

        if content_type.is_multipart() {
            let boundary = content_type
                .param("boundary")
                .ok_or(MailError::MissingBoundary)?;
            let children = split_multipart(body, boundary)
                .into_iter()
                .map(|segment| Part::parse(&segment))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self {
                headers,
                content_type,
                body: Vec::new(),
                children,
            });
        }

        let encoding = lookup(&headers, "content-transfer-encoding")
            .unwrap_or("7bit")
            .trim()
            .to_ascii_lowercase();
        let body = decode_transfer(&encoding, body)?;
        Ok(Self {
            headers,
            content_type,
            body,
            children: Vec::new(),
        })
    }

    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn mime(&self) -> &str {
        &self.content_type.mime
    }

    /// Decoded body bytes. Empty for multipart containers.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn children(&self) -> &[Part] {
        &self.children
    }

    /// File name from `Content-Disposition`, falling back to the
    /// `Content-Type` `name` parameter.
    pub fn filename(&self) -> Option<String> {
        self.header("content-disposition")
            .map(ContentType::parse)
            .and_then(|d| d.param("filename").map(str::to_string))
            .or_else(|| self.content_type.param("name").map(str::to_string))
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Part>) {
        if self.children.is_empty() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }
}

/// A whole message. The top-level part carries the message headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    root: Part,
}

impl Message {
    pub fn parse(raw: &[u8]) -> Result<Self, MailError> {
        Ok(Self {
            root: Part::parse(raw)?,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.root.header(name)
    }

    /// Non-container parts in document order.
    pub fn leaves(&self) -> Vec<&Part> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    /// Decoded text of the first `text/plain` part.
    pub fn text_body(&self) -> Option<String> {
        self.leaves()
            .into_iter()
            .find(|p| p.mime() == "text/plain")
            .map(Part::body_text)
    }

    /// Every `image/*` part in document order.
    pub fn images(&self) -> Vec<&Part> {
        self.leaves()
            .into_iter()
            .filter(|p| p.mime().starts_with("image/"))
            .collect()
    }
}

fn lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Split at the first empty line. No empty line means all headers.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut line_start = 0;
    for (i, &b) in raw.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        let line = &raw[line_start..i];
        if line.is_empty() || line == b"\r" {
            return (&raw[..line_start], &raw[i + 1..]);
        }
        line_start = i + 1;
    }
    (raw, &[])
}

/// Unfold continuation lines and split `Name: value` pairs.
fn parse_headers(head: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        match line.split_once(':') {
            Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
            None if line.trim().is_empty() => {}
            None => tracing::debug!(line, "ignoring header line without a colon"),
        }
    }
    headers
}

/// Body segments between `--boundary` delimiter lines.
fn split_multipart(body: &[u8], boundary: &str) -> Vec<Vec<u8>> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");
    let mut segments = Vec::new();
    let mut current: Option<Vec<&[u8]>> = None;

    for line in body.split(|&b| b == b'\n') {
        let trimmed = line.strip_suffix(b"\r").unwrap_or(line);
        let trimmed_end = trim_ascii_end(trimmed);
        if trimmed_end == close.as_bytes() {
            if let Some(lines) = current.take() {
                segments.push(lines.join(&b'\n'));
            }
            break;
        }
        if trimmed_end == open.as_bytes() {
            if let Some(lines) = current.take() {
                segments.push(lines.join(&b'\n'));
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(trimmed);
        }
    }
    if let Some(lines) = current {
        segments.push(lines.join(&b'\n'));
    }
    segments
}

fn trim_ascii_end(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

fn decode_transfer(encoding: &str, body: &[u8]) -> Result<Vec<u8>, MailError> {
    match encoding {
        "base64" => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            STANDARD.decode(compact).map_err(|e| MailError::Encoding {
                encoding: encoding.into(),
                reason: e.to_string(),
            })
        }
        "quoted-printable" => Ok(decode_quoted_printable(body)),
        _ => Ok(body.to_vec()),
    }
}

/// Soft breaks (`=` at end of line) join lines; `=XX` is a hex byte; a
/// malformed escape is kept literally.
fn decode_quoted_printable(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        match &body[i + 1..] {
            [b'\r', b'\n', ..] => i += 3,
            [b'\n', ..] => i += 2,
            [h, l, ..] if h.is_ascii_hexdigit() && l.is_ascii_hexdigit() => {
                out.push(hex_value(*h) << 4 | hex_value(*l));
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit.to_ascii_uppercase() - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: Author <me@example.com>\r\n\
Subject: Trip\r\n\
\treport\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
preamble\r\n\
--XYZ\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Caf=C3=A9 is nice, =\r\n\
really.\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html</p>\r\n\
--inner--\r\n\
--XYZ\r\n\
Content-Type: image/jpeg; name=\"a.jpg\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVs\r\n\
bG8=\r\n\
--XYZ--\r\n\
epilogue\r\n";

    #[test]
    fn simple_message() {
        let msg = Message::parse(b"From: a@b.c\nSubject: Hi\n\nBody line\n").unwrap();
        assert_eq!(msg.header("subject"), Some("Hi"));
        assert_eq!(msg.header("FROM"), Some("a@b.c"));
        assert_eq!(msg.text_body().as_deref(), Some("Body line\n"));
        assert!(msg.images().is_empty());
    }

    #[test]
    fn folded_headers_are_unfolded() {
        let msg = Message::parse(MULTIPART.as_bytes()).unwrap();
        assert_eq!(msg.header("Subject"), Some("Trip report"));
    }

    #[test]
    fn nested_multipart_text_and_image() {
        let msg = Message::parse(MULTIPART.as_bytes()).unwrap();
        let mimes: Vec<&str> = msg.leaves().iter().map(|p| p.mime()).collect();
        assert_eq!(mimes, vec!["text/plain", "text/html", "image/jpeg"]);
        assert_eq!(msg.text_body().as_deref(), Some("Café is nice, really."));

        let images = msg.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].body(), b"hello");
        assert_eq!(images[0].filename().as_deref(), Some("a.jpg"));
    }

    #[test]
    fn missing_content_type_defaults_to_text() {
        let msg = Message::parse(b"Subject: x\n\nplain").unwrap();
        assert_eq!(msg.leaves()[0].mime(), "text/plain");
    }

    #[test]
    fn multipart_without_boundary_is_an_error() {
        let err = Message::parse(b"Content-Type: multipart/mixed\n\nx").unwrap_err();
        assert_eq!(err, MailError::MissingBoundary);
    }

    #[test]
    fn bad_base64_is_an_error() {
        let raw = b"Content-Type: image/png\nContent-Transfer-Encoding: base64\n\n!!!!";
        assert!(matches!(
            Message::parse(raw),
            Err(MailError::Encoding { .. })
        ));
    }

    #[test]
    fn disposition_filename_wins() {
        let raw = b"Content-Type: image/png; name=ct.png\nContent-Disposition: attachment; filename=\"cd.png\"\n\n";
        let msg = Message::parse(raw).unwrap();
        assert_eq!(msg.leaves()[0].filename().as_deref(), Some("cd.png"));
    }

    #[test]
    fn quoted_printable_keeps_malformed_escapes() {
        assert_eq!(decode_quoted_printable(b"a=ZZb=3D"), b"a=ZZb=");
    }

    #[test]
    fn headers_only_message() {
        let msg = Message::parse(b"Subject: only").unwrap();
        assert_eq!(msg.header("subject"), Some("only"));
        assert_eq!(msg.text_body().as_deref(), Some(""));
    }
}
