//! Header block parsing.

/// Header fields of a message or part, in wire order.
///
/// Names are matched case-insensitively. Values are unfolded but otherwise
/// raw; RFC 2047 words are left for the caller to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let mut name = name.into();
        name.make_ascii_lowercase();
        self.fields.push((name, value.into()));
    }

    /// First value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses a header block.
    ///
    /// Folded lines are joined with a single space. Lines without a colon
    /// (an mbox `From ` line, stray garbage) are skipped. Parsing stops at
    /// the first empty line.
    #[must_use]
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = current.as_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(char::is_whitespace) {
                    current = Some((name.to_string(), value.trim().to_string()));
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        headers
    }
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

    #[test]
    fn test_add_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.get("subject").is_none());
    }

    #[test]
    fn test_parse_with_folding() {
        let block = concat!(
            "From: recruiter@example.com\r\n",
            "To: me@example.com\r\n",
            "Subject: Senior Software\r\n",
            "\tEngineer Opening\r\n",
            "Content-Type: multipart/mixed;\r\n",
            " boundary=\"abc\"\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(block.as_bytes());
        assert_eq!(headers.get("to"), Some("me@example.com"));
        assert_eq!(headers.get("Subject"), Some("Senior Software Engineer Opening"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("multipart/mixed; boundary=\"abc\"")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_parse_bare_lf_and_repeated_fields() {
        let headers = Headers::parse(b"Received: a\nReceived: b\nX-Empty:\n");
        assert_eq!(headers.get("received"), Some("a"));
        assert_eq!(headers.get("x-empty"), Some(""));
    }

    #[test]
    fn test_parse_skips_lines_without_colon() {
        let headers = Headers::parse(b"From sender Mon Jan  1 00:00:00 2024\nSubject: Hi\n");
        assert_eq!(headers, {
            let mut expected = Headers::new();
            expected.add("Subject", "Hi");
            expected
        });
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let headers = Headers::parse(b"Subject: caf\xe9\r\n");
        assert_eq!(headers.get("subject"), Some("caf\u{fffd}"));
    }
}
