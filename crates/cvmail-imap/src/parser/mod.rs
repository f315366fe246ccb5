//! Sans-I/O parser for server responses.
//!
//! The parser understands the responses the client acts on (status lines,
//! `SEARCH`, `STATUS`, `EXISTS` and `FETCH`); everything else is reported as
//! [`UntaggedResponse::Other`].
//!
//! ```
//! use cvmail_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* SEARCH 2 4 9\r\n").unwrap();
//! match response {
//!     Response::Untagged(UntaggedResponse::Search(ids)) => assert_eq!(ids.len(), 3),
//!     _ => panic!("expected SEARCH"),
//! }
//! ```

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod lexer;

pub use fetch::FetchData;
pub use lexer::Lexer;

use crate::types::{SeqNum, Status, Tag};
use crate::{Error, Result};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Human-readable text, including any bracketed response code.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE text`.
    Status {
        /// Condition keyword.
        status: Status,
        /// Text after the keyword.
        text: String,
    },
    /// `* SEARCH n...`.
    Search(Vec<SeqNum>),
    /// `* STATUS mailbox (MESSAGES n ...)`.
    MailboxStatus {
        /// Mailbox the counters belong to.
        mailbox: String,
        /// Value of `MESSAGES`, when reported.
        messages: Option<u32>,
    },
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n FETCH (...)`.
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Items of interest.
        data: FetchData,
    },
    /// Anything else (CAPABILITY, FLAGS, RECENT, EXPUNGE, ...).
    Other(String),
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one framed response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.peek() {
            Some(b'*') => {
                lexer.advance();
                lexer.expect_space()?;
                Self::parse_untagged(&mut lexer).map(Response::Untagged)
            }
            Some(_) => Self::parse_tagged(&mut lexer),
            None => Err(Error::Parse {
                position: 0,
                message: "empty response".to_string(),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        let tag = lexer.read_atom()?.to_string();
        lexer.expect_space()?;
        let keyword = lexer.read_atom()?;
        let status = Status::parse(keyword)
            .ok_or_else(|| lexer.error(format!("unknown completion status {keyword}")))?;
        lexer.skip_spaces();

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            text: lexer.read_text(),
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        if lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
            return Self::parse_numbered(lexer);
        }

        let keyword = lexer.read_atom()?.to_ascii_uppercase();
        if let Some(status) = Status::parse(&keyword) {
            lexer.skip_spaces();
            return Ok(UntaggedResponse::Status {
                status,
                text: lexer.read_text(),
            });
        }

        match keyword.as_str() {
            "SEARCH" => Self::parse_search(lexer),
            "STATUS" => Self::parse_mailbox_status(lexer),
            _ => {
                let rest = lexer.read_text();
                Ok(UntaggedResponse::Other(
                    format!("{keyword} {rest}").trim_end().to_string(),
                ))
            }
        }
    }

    /// `* n EXISTS`, `* n FETCH (...)`, `* n RECENT`, `* n EXPUNGE`.
    fn parse_numbered(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        let n = lexer.read_number()?;
        lexer.expect_space()?;
        let keyword = lexer.read_atom()?.to_ascii_uppercase();

        match keyword.as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "FETCH" => {
                let seq =
                    SeqNum::new(n).ok_or_else(|| lexer.error("FETCH for sequence number 0"))?;
                lexer.expect_space()?;
                let data = fetch::parse_fetch_data(lexer)?;
                Ok(UntaggedResponse::Fetch { seq, data })
            }
            _ => Ok(UntaggedResponse::Other(format!("{n} {keyword}"))),
        }
    }

    fn parse_search(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        let mut ids = Vec::new();
        loop {
            lexer.skip_spaces();
            if lexer.at_line_end() || !lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
                break;
            }
            let n = lexer.read_number()?;
            ids.extend(SeqNum::new(n));
        }
        Ok(UntaggedResponse::Search(ids))
    }

    fn parse_mailbox_status(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let mailbox = lexer.read_astring()?;
        lexer.skip_spaces();
        lexer.expect(b'(')?;

        let mut messages = None;
        loop {
            lexer.skip_spaces();
            if lexer.peek() == Some(b')') {
                lexer.advance();
                break;
            }
            let item = lexer.read_atom()?.to_ascii_uppercase();
            lexer.expect_space()?;
            let value = lexer.read_number()?;
            if item == "MESSAGES" {
                messages = Some(value);
            }
        }

        Ok(UntaggedResponse::MailboxStatus { mailbox, messages })
    }
}
