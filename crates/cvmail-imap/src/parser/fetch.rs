//! FETCH response data.

use super::lexer::Lexer;
use crate::Result;

/// Data items of one FETCH response that this client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchData {
    /// Full message source from `RFC822` or `BODY[]`.
    pub body: Option<Vec<u8>>,
}

/// Parses the parenthesized item list after `FETCH `.
///
/// Unknown items are skipped whatever their shape.
pub fn parse_fetch_data(lexer: &mut Lexer<'_>) -> Result<FetchData> {
    let mut data = FetchData::default();
    lexer.expect(b'(')?;

    loop {
        lexer.skip_spaces();
        if lexer.peek() == Some(b')') {
            lexer.advance();
            break;
        }

        let name = lexer.read_atom()?.to_ascii_uppercase();
        lexer.expect_space()?;

        if is_full_body(&name) {
            data.body = lexer.read_nstring()?;
        } else {
            lexer.skip_value()?;
        }
    }

    Ok(data)
}

/// `RFC822`, `BODY[]` and partial `BODY[]<origin>` all carry the whole message.
fn is_full_body(name: &str) -> bool {
    name == "RFC822" || name == "BODY[]" || name.starts_with("BODY[]<")
}
