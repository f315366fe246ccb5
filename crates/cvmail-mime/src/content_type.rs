//! Content-Type and Content-Disposition values.

use std::collections::HashMap;

use crate::encoding::{decode_header, decode_rfc2231};
use crate::error::{Error, Result};

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart"), lowercase.
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "pdf"), lowercase.
    pub sub_type: String,
    /// Parameters keyed by lowercase name.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// `text/plain`, the RFC 2045 default.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Returns `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// True for `type/subtype` equality, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type)
            && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Returns a parameter value by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present and non-empty.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary").filter(|b| !b.is_empty())
    }

    /// Legacy `name` parameter, decoded.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        extended_parameter(&self.parameters, "name")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the `type/subtype` pair is missing or empty.
    pub fn parse(s: &str) -> Result<Self> {
        let mut segments = split_parameters(s).into_iter();
        let type_str = segments.next().unwrap_or_default().trim();

        let (main_type, sub_type) = type_str
            .split_once('/')
            .map(|(main, sub)| (main.trim(), sub.trim()))
            .filter(|(main, sub)| !main.is_empty() && !sub.is_empty())
            .ok_or_else(|| Error::InvalidContentType(s.to_string()))?;

        let mut content_type = Self::new(
            main_type.to_ascii_lowercase(),
            sub_type.to_ascii_lowercase(),
        );
        content_type.parameters = parse_parameters(segments);
        Ok(content_type)
    }
}

/// Content-Disposition value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentDisposition {
    /// Disposition type (`inline`, `attachment`, ...), lowercase.
    pub disposition: String,
    /// Parameters keyed by lowercase name.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a disposition value. Never fails; unknown shapes yield an
    /// empty disposition type.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut segments = split_parameters(s).into_iter();
        let disposition = segments
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        Self {
            disposition,
            parameters: parse_parameters(segments),
        }
    }

    /// The `filename` parameter, falling back to RFC 2231 `filename*`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        extended_parameter(&self.parameters, "filename")
    }
}

/// Looks up `name`, then `name*`; the plain form may carry RFC 2047 words.
fn extended_parameter(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params
        .get(name)
        .map(|v| decode_header(v))
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            params
                .get(&format!("{name}*"))
                .map(|v| decode_rfc2231(v))
                .filter(|v| !v.trim().is_empty())
        })
}

/// Splits on `;` outside quoted strings.
fn split_parameters(s: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (idx, ch) in s.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&s[start..]);
    segments
}

fn parse_parameters<'a>(segments: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    segments
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return None;
            }
            Some((key, unquote(value.trim())))
        })
        .collect()
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}
