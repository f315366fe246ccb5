//! Wire encoding helpers for command arguments.

use super::{FetchItems, SearchCriteria};
use crate::{Error, Result};

/// Writes an astring: bare atom when possible, quoted string otherwise.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `s` cannot be quoted.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        write_quoted(buf, s)
    } else {
        buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Writes a quoted string, escaping `"` and `\`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `s` holds NUL, CR, LF or a
/// non-ASCII byte; a quoted string cannot carry them.
pub fn write_quoted(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if let Some(pos) = s.bytes().position(|b| !is_quotable(b)) {
        return Err(Error::InvalidArgument(format!(
            "byte 0x{:02X} at offset {pos} cannot be sent in a quoted string",
            s.as_bytes()[pos]
        )));
    }

    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
    Ok(())
}

const fn is_quotable(b: u8) -> bool {
    b.is_ascii() && !matches!(b, b'\0' | b'\r' | b'\n')
}

const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']')
        || b < 0x20
        || b >= 0x7F
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut Vec<u8>, criteria: &SearchCriteria) -> Result<()> {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Unseen => buf.extend_from_slice(b"UNSEEN"),
        SearchCriteria::Header { name, value } => {
            buf.extend_from_slice(b"HEADER ");
            write_astring(buf, name)?;
            buf.push(b' ');
            // Header values are always quoted; Message-IDs carry `<` `>` `@`.
            write_quoted(buf, value)?;
        }
    }
    Ok(())
}

/// Writes the FETCH data item.
pub fn write_fetch_items(buf: &mut Vec<u8>, items: FetchItems) {
    match items {
        FetchItems::BodyPeek => buf.extend_from_slice(b"BODY.PEEK[]"),
    }
}
