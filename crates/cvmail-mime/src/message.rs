//! MIME tree parsing.
//!
//! A message is parsed into a tree of [`Part`]s. Leaf parts keep their raw
//! (still transfer-encoded) body; multipart containers additionally carry
//! their children. Parsing never fails: structure that cannot be understood
//! is kept as an opaque single-part body.

use std::fmt;

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable};
use crate::error::Result;
use crate::header::Headers;

/// Multipart nesting deeper than this is kept as an opaque body.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a Content-Transfer-Encoding value. Unknown values are
    /// treated as 7bit, i.e. passed through untouched.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        })
    }
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Raw body bytes, still transfer-encoded.
    pub body: Vec<u8>,
    /// Sub-parts of a multipart container, in document order.
    pub children: Vec<Part>,
}

impl Part {
    /// Parses a part (headers, blank line, body).
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_nested(raw, 0)
    }

    fn parse_nested(raw: &[u8], depth: usize) -> Self {
        let (header_block, body) = split_header_body(raw);
        let mut part = Self {
            headers: Headers::parse(header_block),
            body: body.to_vec(),
            children: Vec::new(),
        };

        if depth >= MAX_DEPTH {
            return part;
        }

        let content_type = part.content_type();
        if let Some(boundary) = content_type.boundary().filter(|_| content_type.is_multipart())
            && let Some(sections) = split_multipart(body, boundary)
        {
            part.children = sections
                .into_iter()
                .map(|section| Self::parse_nested(section, depth + 1))
                .collect();
        }

        part
    }

    /// Content type; missing or unparseable values mean `text/plain`.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Parsed Content-Disposition, if present.
    #[must_use]
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// True when the Content-Disposition header mentions `attachment`,
    /// ignoring case.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("content-disposition")
            .is_some_and(|value| value.to_ascii_lowercase().contains("attachment"))
    }

    /// Filename from Content-Disposition (`filename`, then `filename*`),
    /// falling back to the Content-Type `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.content_disposition()
            .and_then(|cd| cd.filename())
            .or_else(|| self.content_type().name())
    }

    /// True for a multipart container whose children were found.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.children.is_empty()
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a base64 body contains invalid characters.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
                Ok(self.body.clone())
            }
        }
    }

    /// Decodes the body to text using the declared charset.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer encoding cannot be undone.
    pub fn decode_text(&self) -> Result<String> {
        let bytes = self.decode_body()?;
        Ok(decode_charset(&bytes, self.content_type().charset()))
    }

    /// Depth-first, document-order traversal starting with this part.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`Part::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}

/// A whole message: the root of the MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses raw message bytes.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: Part::parse(raw),
        }
    }

    /// Top-level part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Raw Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.root.headers.get("subject")
    }

    /// Raw From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.root.headers.get("from")
    }

    /// Raw To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.root.headers.get("to")
    }

    /// Raw Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.root.headers.get("date")
    }

    /// Raw Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.root.headers.get("message-id")
    }

    /// True when the top-level part is a multipart container with parts.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.root.is_multipart()
    }

    /// Every part, root first, depth-first in document order.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        self.root.walk()
    }
}

/// Splits at the first empty line. Without one, everything is header.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return (&[], body);
    }

    for (idx, _) in raw.iter().enumerate().filter(|(_, b)| **b == b'\n') {
        let rest = &raw[idx + 1..];
        if let Some(body) = rest.strip_prefix(b"\r\n").or_else(|| rest.strip_prefix(b"\n")) {
            return (&raw[..=idx], body);
        }
    }

    (raw, &[])
}

/// Splits a multipart body on `--boundary` lines.
///
/// The line break before a delimiter belongs to the delimiter. Preamble
/// and epilogue are dropped. A missing close delimiter ends the last part
/// at the end of input. Returns `None` when no delimiter line exists.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut sections = Vec::new();
    let mut current: Option<usize> = None;
    let mut found = false;
    let mut line_start = 0;

    while line_start < body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |pos| line_start + pos);
        let next_line = (line_end + 1).min(body.len());

        if let Some(close) = delimiter_kind(&body[line_start..line_end], delimiter) {
            if let Some(start) = current.take() {
                sections.push(&body[start..content_end(body, start, line_start)]);
            }
            found = true;
            if close {
                return Some(sections);
            }
            current = Some(next_line);
        }

        line_start = next_line;
    }

    if let Some(start) = current {
        sections.push(&body[start..]);
    }
    found.then_some(sections)
}

/// `Some(false)` for a delimiter line, `Some(true)` for the close delimiter.
fn delimiter_kind(line: &[u8], delimiter: &[u8]) -> Option<bool> {
    let rest = line.strip_prefix(delimiter)?;
    let (close, padding) = match rest.strip_prefix(b"--") {
        Some(after) => (true, after),
        None => (false, rest),
    };
    padding
        .iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\r'))
        .then_some(close)
}

/// End of a section that is followed by a delimiter line at `delimiter_start`.
fn content_end(body: &[u8], start: usize, delimiter_start: usize) -> usize {
    let mut end = delimiter_start;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    const NESTED: &str = concat!(
        "From: hr@example.com\r\n",
        "Subject: Process Engineer\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is a multi-part message in MIME format.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Plain body\r\n",
        "--inner\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<p>HTML body</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf; name=\"cv.pdf\"\r\n",
        "Content-Disposition: attachment; filename=\"cv.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERi0x\r\n",
        "LjQK\r\n",
        "--outer--\r\n",
        "epilogue\r\n"
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_split_header_body() {
        let (h, b) = split_header_body(b"A: 1\r\nB: 2\r\n\r\nbody\r\n");
        assert_eq!(h, b"A: 1\r\nB: 2\r\n");
        assert_eq!(b, b"body\r\n");

        let (h, b) = split_header_body(b"A: 1\n\nbody");
        assert_eq!(h, b"A: 1\n");
        assert_eq!(b, b"body");

        let (h, b) = split_header_body(b"\r\nonly body");
        assert!(h.is_empty());
        assert_eq!(b, b"only body");

        let (h, b) = split_header_body(b"A: 1\r\n");
        assert_eq!(h, b"A: 1\r\n");
        assert!(b.is_empty());
    }

    #[test]
    fn test_single_part() {
        let message = Message::parse(b"Subject: Hello\r\n\r\nJust text\r\n");
        assert!(!message.is_multipart());
        assert_eq!(message.subject(), Some("Hello"));
        assert_eq!(message.root().decode_text().unwrap(), "Just text\r\n");
        assert_eq!(message.walk().count(), 1);
    }

    #[test]
    fn test_nested_multipart_walk_order() {
        let message = Message::parse(NESTED.as_bytes());
        assert!(message.is_multipart());

        let types: Vec<String> = message
            .walk()
            .map(|part| part.content_type().mime_type())
            .collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "application/pdf",
            ]
        );
    }

    #[test]
    fn test_part_bodies_exclude_delimiter_line_breaks() {
        let message = Message::parse(NESTED.as_bytes());
        let parts: Vec<&Part> = message.walk().collect();
        assert_eq!(parts[2].body, b"Plain body");
        assert_eq!(parts[3].body, b"<p>HTML body</p>");
        assert_eq!(parts[4].decode_body().unwrap(), b"%PDF-1.4\n");
    }

    #[test]
    fn test_attachment_detection() {
        let message = Message::parse(NESTED.as_bytes());
        let attachments: Vec<&Part> = message.walk().filter(|p| p.is_attachment()).collect();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("cv.pdf"));
    }

    #[test]
    fn test_filename_falls_back_to_content_type_name() {
        let part = Part::parse(
            b"Content-Type: application/pdf; name=\"offer.pdf\"\r\nContent-Disposition: ATTACHMENT\r\n\r\nx",
        );
        assert!(part.is_attachment());
        assert_eq!(part.filename().as_deref(), Some("offer.pdf"));
    }

    #[test]
    fn test_multipart_without_boundary_degrades() {
        let message = Message::parse(b"Content-Type: multipart/mixed\r\n\r\n--x\r\nhello\r\n");
        assert!(!message.is_multipart());
        assert_eq!(message.root().body, b"--x\r\nhello\r\n");
    }

    #[test]
    fn test_multipart_boundary_never_seen_degrades() {
        let message =
            Message::parse(b"Content-Type: multipart/mixed; boundary=zzz\r\n\r\nno parts here\r\n");
        assert!(!message.is_multipart());
    }

    #[test]
    fn test_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\nfirst\r\n--b\r\n\r\nsecond";
        let message = Message::parse(raw);
        let bodies: Vec<&[u8]> = message
            .root()
            .children
            .iter()
            .map(|p| p.body.as_slice())
            .collect();
        assert_eq!(bodies, vec![&b"first"[..], &b"second"[..]]);
    }

    #[test]
    fn test_boundary_prefix_is_not_delimiter() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\n--bx not a delimiter\r\n--b--\r\n";
        let message = Message::parse(raw);
        assert_eq!(message.root().children.len(), 1);
        assert_eq!(message.root().children[0].body, b"--bx not a delimiter");
    }

    #[test]
    fn test_depth_limit() {
        let mut raw = String::new();
        for depth in 0..40 {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=b{depth}\r\n\r\n--b{depth}\r\n"
            ));
        }
        raw.push_str("Content-Type: text/plain\r\n\r\nleaf\r\n");
        let message = Message::parse(raw.as_bytes());
        assert_eq!(message.walk().count(), MAX_DEPTH + 1);
    }

    #[test]
    fn test_decode_text_charset() {
        let part = Part::parse(
            b"Content-Type: text/plain; charset=iso-8859-1\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9",
        );
        assert_eq!(part.decode_text().unwrap(), "café");
    }

    #[test]
    fn test_invalid_base64_body_is_error() {
        let part = Part::parse(b"Content-Transfer-Encoding: base64\r\n\r\n***");
        assert!(part.decode_body().is_err());
    }
}
