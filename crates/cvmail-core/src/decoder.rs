//! Turns raw message bytes into a [`ParsedMessage`].

use chrono::DateTime;
use cvmail_mime::encoding::decode_header;
use cvmail_mime::{Message, Part};
use serde::Serialize;

use crate::attachment::{self, Attachment};

/// Characters of body text kept in the excerpt.
pub const EXCERPT_CHARS: usize = 200;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Normalized view of one message. Missing data is an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    /// Decoded Subject.
    pub subject: String,
    /// Decoded From.
    pub sender: String,
    /// Decoded To.
    pub recipient: String,
    /// `YYYY-MM-DD HH:MM:SS`, or the raw Date header when unparseable.
    pub date: String,
    /// Body excerpt.
    pub body: String,
    /// Raw Message-ID header.
    pub message_id: String,
    /// Whether any part is marked as an attachment.
    pub has_attachments: bool,
    /// Extracted attachments.
    pub attachments: Vec<Attachment>,
}

/// Decodes a raw message. Never fails; broken structure degrades.
#[must_use]
pub fn parse(raw: &[u8]) -> ParsedMessage {
    let message = Message::parse(raw);
    let header = |value: Option<&str>| value.map(decode_header).unwrap_or_default();

    ParsedMessage {
        subject: header(message.subject()),
        sender: header(message.from()),
        recipient: header(message.to()),
        date: message.date().map(format_date).unwrap_or_default(),
        body: excerpt(&body_text(&message)),
        message_id: message.message_id().unwrap_or_default().trim().to_string(),
        has_attachments: attachment::has_attachments(&message),
        attachments: attachment::extract(&message),
    }
}

/// Formats an RFC 2822 date in its own offset, or returns it unchanged.
#[must_use]
pub fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc2822(strip_trailing_comment(trimmed)))
        .map_or_else(|_| raw.to_string(), |date| date.format(DATE_FORMAT).to_string())
}

/// Drops a trailing `(zone name)` comment such as `(UTC)`.
fn strip_trailing_comment(date: &str) -> &str {
    match date.strip_suffix(')').and_then(|d| d.rfind('(').map(|i| &d[..i])) {
        Some(stripped) => stripped.trim_end(),
        None => date,
    }
}

/// First `limit` characters of `text`, with `...` appended when cut.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn excerpt(body: &str) -> String {
    truncate(body, EXCERPT_CHARS)
}

/// Body text: the first plain part, else the first HTML part.
fn body_text(message: &Message) -> String {
    if !message.is_multipart() {
        let root = message.root();
        let text = root.decode_text().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "body decode failed, using raw bytes");
            String::from_utf8_lossy(&root.body).into_owned()
        });
        return text.trim().to_string();
    }

    first_text_part(message, "plain")
        .or_else(|| first_text_part(message, "html"))
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn first_text_part(message: &Message, sub_type: &str) -> Option<String> {
    message
        .walk()
        .filter(|part| part.content_type().is("text", sub_type) && !part.is_attachment())
        .find_map(|part: &Part| match part.decode_text() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(sub_type, error = %e, "skipping undecodable text part");
                None
            }
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_plain_message() {
        let raw = concat!(
            "From: =?UTF-8?Q?Ren=C3=A9e_Recruiter?= <renee@example.com>\r\n",
            "To: me@gmail.com\r\n",
            "Subject: =?UTF-8?B?U29mdHdhcmUgRW5naW5lZXIg4oCTIENW?=\r\n",
            "Date: Tue, 14 May 2024 09:30:00 +0200\r\n",
            "Message-ID:  <abc@mail.example.com> \r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "\r\n  Hello there.  \r\n"
        );

        let parsed = parse(raw.as_bytes());
        assert_eq!(parsed.subject, "Software Engineer – CV");
        assert_eq!(parsed.sender, "Renée Recruiter <renee@example.com>");
        assert_eq!(parsed.recipient, "me@gmail.com");
        assert_eq!(parsed.date, "2024-05-14 09:30:00");
        assert_eq!(parsed.body, "Hello there.");
        assert_eq!(parsed.message_id, "<abc@mail.example.com>");
        assert!(!parsed.has_attachments);
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let parsed = parse(b"\r\nbody only");
        assert_eq!(parsed.subject, "");
        assert_eq!(parsed.sender, "");
        assert_eq!(parsed.date, "");
        assert_eq!(parsed.message_id, "");
        assert_eq!(parsed.body, "body only");
    }

    #[test]
    fn test_prefers_plain_over_html() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html</p>\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "plain =\r\ntext\r\n",
            "--b--\r\n"
        );
        assert_eq!(parse(raw.as_bytes()).body, "plain text");
    }

    #[test]
    fn test_html_fallback_and_attached_text_ignored() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=notes.txt\r\n",
            "\r\n",
            "attached notes\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html body</p>\r\n",
            "--b--\r\n"
        );
        let parsed = parse(raw.as_bytes());
        assert_eq!(parsed.body, "<p>html body</p>");
        assert!(parsed.has_attachments);
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "notes.txt");
    }

    #[test]
    fn test_multipart_without_boundary_degrades() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nraw content\r\n";
        let parsed = parse(raw);
        assert_eq!(parsed.body, "raw content");
        assert!(!parsed.has_attachments);
    }

    #[test]
    fn test_undecodable_single_part_uses_raw_bytes() {
        let parsed = parse(b"Content-Transfer-Encoding: base64\r\n\r\n%%%\r\n");
        assert_eq!(parsed.body, "%%%");
    }

    #[test]
    fn test_long_body_excerpt() {
        let body = "x".repeat(250);
        let raw = format!("Subject: long\r\n\r\n{body}");
        let parsed = parse(raw.as_bytes());
        assert_eq!(parsed.body.chars().count(), 203);
        assert!(parsed.body.starts_with(&body[..200]));
        assert!(parsed.body.ends_with("..."));
    }

    #[test]
    fn test_format_date() {
        assert_eq!(
            format_date("Mon, 1 Jan 2024 23:05:09 -0500"),
            "2024-01-01 23:05:09"
        );
        assert_eq!(
            format_date("Mon, 1 Jan 2024 23:05:09 +0000 (UTC)"),
            "2024-01-01 23:05:09"
        );
        assert_eq!(format_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_truncate_boundaries() {
        assert_eq!(truncate("", 200), "");
        assert_eq!(truncate(&"a".repeat(200), 200), "a".repeat(200));
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }

    proptest! {
        #[test]
        fn truncate_keeps_prefix(text in "\\PC{0,300}") {
            let out = truncate(&text, 200);
            let chars = text.chars().count();
            if chars > 200 {
                prop_assert_eq!(out.chars().count(), 203);
                let prefix: String = text.chars().take(200).collect();
                prop_assert!(out.starts_with(&prefix));
            } else {
                prop_assert_eq!(out, text);
            }
        }
    }
}
