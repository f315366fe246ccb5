//! Transfer encodings and encoded header text.
//!
//! Everything here is lenient: received mail is frequently slightly broken
//! and a best-effort decode beats dropping the message.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::Result;

/// Base64 engine that tolerates missing padding and trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Largest number of UTF-8 bytes put into one encoded word.
const ENCODED_WORD_CHUNK: usize = 45;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input contains characters outside the Base64
/// alphabet.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable (RFC 2045).
///
/// Soft line breaks are removed. An `=` not followed by two hex digits is
/// kept as-is.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while let Some(&b) = data.get(i) {
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }

        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(&hi), Some(&lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decodes `bytes` from `charset`, falling back to lossy UTF-8 when the
/// charset is unknown or the bytes are invalid for it.
///
/// An RFC 2231 language suffix (`utf-8*en`) is ignored.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .map(|c| c.split('*').next().unwrap_or(c).trim())
        .filter(|label| !label.is_empty())
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()));

    if let Some(encoding) = encoding {
        let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Encodes header text as RFC 2047 `B` encoded words in UTF-8.
///
/// Plain ASCII without `=?` is returned unchanged. Longer text is split
/// into several space-separated words on character boundaries.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.is_ascii() && !text.contains("=?") {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk_start = 0;
    for (idx, ch) in text.char_indices() {
        if idx + ch.len_utf8() - chunk_start > ENCODED_WORD_CHUNK && idx > chunk_start {
            words.push(&text[chunk_start..idx]);
            chunk_start = idx;
        }
    }
    words.push(&text[chunk_start..]);

    words
        .iter()
        .map(|chunk| format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes a header value that may contain RFC 2047 encoded words.
///
/// Each word is decoded with its declared charset. Whitespace between two
/// adjacent encoded words is dropped. Words whose payload is malformed are
/// kept verbatim. Never fails.
#[must_use]
pub fn decode_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = String::new();
    let mut prev_encoded = false;
    let mut rest = raw;

    while !rest.is_empty() {
        if let Some(word) = EncodedWord::parse(rest) {
            let verbatim = &rest[..word.len];
            rest = &rest[word.len..];

            if let Some(decoded) = word.decode() {
                if !prev_encoded {
                    out.push_str(&pending_space);
                }
                out.push_str(&decoded);
                prev_encoded = true;
            } else {
                out.push_str(&pending_space);
                out.push_str(verbatim);
                prev_encoded = false;
            }
            pending_space.clear();
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        rest = &rest[ch.len_utf8()..];

        if ch.is_whitespace() {
            pending_space.push(ch);
        } else {
            out.push_str(&pending_space);
            pending_space.clear();
            out.push(ch);
            prev_encoded = false;
        }
    }

    out.push_str(&pending_space);
    out
}

/// Decodes an RFC 2231 extended parameter value (`charset'lang'%XX...`).
#[must_use]
pub fn decode_rfc2231(value: &str) -> String {
    let mut parts = value.splitn(3, '\'');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_language), Some(encoded)) => {
            decode_charset(&percent_decode(encoded), Some(charset))
        }
        _ => decode_charset(&percent_decode(value), None),
    }
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        if b == b'%'
            && let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|&h| hex_value(h)),
                bytes.get(i + 2).and_then(|&l| hex_value(l)),
            )
        {
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(b);
            i += 1;
        }
    }
    out
}

/// A syntactically valid `=?charset?enc?payload?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: u8,
    payload: &'a str,
    len: usize,
}

impl<'a> EncodedWord<'a> {
    fn parse(s: &'a str) -> Option<Self> {
        let rest = s.strip_prefix("=?")?;
        let charset_end = rest.find('?')?;
        let charset = &rest[..charset_end];
        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }

        let after_charset = &rest[charset_end + 1..];
        let encoding = match after_charset.as_bytes() {
            [enc, b'?', ..] if enc.is_ascii_alphabetic() => *enc,
            _ => return None,
        };

        let payload_area = &after_charset[2..];
        let payload_end = payload_area.find("?=")?;
        let payload = &payload_area[..payload_end];
        if payload.contains(char::is_whitespace) {
            return None;
        }

        Some(Self {
            charset,
            encoding,
            payload,
            len: 2 + charset_end + 1 + 2 + payload_end + 2,
        })
    }

    fn decode(&self) -> Option<String> {
        let bytes = match self.encoding.to_ascii_uppercase() {
            b'B' => decode_base64(self.payload.as_bytes()).ok()?,
            b'Q' => decode_q(self.payload)?,
            _ => return None,
        };
        Some(decode_charset(&bytes, Some(self.charset)))
    }
}

/// Strict `Q` decoding: `_` is a space, `=XX` a byte; anything else malformed.
fn decode_q(payload: &str) -> Option<Vec<u8>> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
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
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_base64_lenient() {
        assert_eq!(decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64(b"SGk").unwrap(), b"Hi");
        assert!(decode_base64(b"not*base64").is_err());
    }

    #[test]
    fn test_quoted_printable() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"soft=\nbreak"), b"softbreak");
        assert_eq!(decode_quoted_printable(b"a=ZZb="), b"a=ZZb=");
        assert_eq!(decode_quoted_printable(b"=3d"), b"=");
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(b"caf\xe9", Some("iso-8859-1")), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("utf-8")), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("x-unknown")), "café");
        assert_eq!(decode_charset(b"caf\xe9", Some("utf-8")), "caf\u{fffd}");
        assert_eq!(decode_charset(b"plain", None), "plain");
    }

    #[test]
    fn test_decode_header_plain() {
        assert_eq!(decode_header(""), "");
        assert_eq!(decode_header("Software Engineer Opening"), "Software Engineer Opening");
    }

    #[test]
    fn test_decode_header_b_and_q() {
        assert_eq!(decode_header("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_header("=?UTF-8?q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_header("=?iso-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_header_mixed() {
        assert_eq!(
            decode_header("Re: =?utf-8?B?Q1Y=?= for review"),
            "Re: CV for review"
        );
    }

    #[test]
    fn test_adjacent_words_drop_whitespace() {
        assert_eq!(
            decode_header("=?utf-8?Q?Process_?=\r\n =?utf-8?Q?Engineer?="),
            "Process Engineer"
        );
        assert_eq!(decode_header("=?utf-8?Q?a?= =?utf-8?Q?b?="), "ab");
    }

    #[test]
    fn test_malformed_words_kept() {
        assert_eq!(decode_header("=?utf-8?Q?bad=ZZ?="), "=?utf-8?Q?bad=ZZ?=");
        assert_eq!(decode_header("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_header("50% =? off"), "50% =? off");
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        assert_eq!(decode_header("=?x-martian?B?SGk=?="), "Hi");
    }

    #[test]
    fn test_encode_rfc2047() {
        assert_eq!(encode_rfc2047("Hello"), "Hello");
        let encoded = encode_rfc2047("Héllo");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_encode_long_text_splits() {
        let text = "é".repeat(60);
        let encoded = encode_rfc2047(&text);
        assert!(encoded.split(' ').count() > 1);
        assert_eq!(decode_header(&encoded), text);
    }

    #[test]
    fn test_rfc2231() {
        assert_eq!(decode_rfc2231("utf-8''r%C3%A9sum%C3%A9.pdf"), "résumé.pdf");
        assert_eq!(decode_rfc2231("iso-8859-1'en'caf%E9.txt"), "café.txt");
        assert_eq!(decode_rfc2231("plain%20name.txt"), "plain name.txt");
    }

    proptest! {
        #[test]
        fn rfc2047_round_trip(text in "\\PC{0,120}") {
            prop_assert_eq!(decode_header(&encode_rfc2047(&text)), text);
        }

        #[test]
        fn base64_round_trip(data in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(decode_base64(encode_base64(&data).as_bytes()).unwrap(), data);
        }
    }
}
