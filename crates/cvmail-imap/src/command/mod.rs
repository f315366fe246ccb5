//! IMAP commands understood by this client.

mod serialize;
mod tag_generator;

pub use serialize::{write_astring, write_quoted};
pub use tag_generator::TagGenerator;

use crate::Result;
use crate::types::{Mailbox, SeqNum};

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// Every message in the mailbox.
    All,
    /// Messages without the `\Seen` flag.
    Unseen,
    /// Messages whose header field contains a value.
    Header {
        /// Header field name.
        name: String,
        /// Substring to match.
        value: String,
    },
}

/// What to retrieve for a fetched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchItems {
    /// `BODY.PEEK[]`: the whole message without touching flags.
    #[default]
    BodyPeek,
}

/// A client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN with username and password.
    Login {
        /// Account name.
        username: String,
        /// Account password or app password.
        password: String,
    },
    /// SELECT a mailbox.
    Select {
        /// Mailbox to open.
        mailbox: Mailbox,
    },
    /// STATUS (MESSAGES) for a mailbox.
    Status {
        /// Mailbox to query.
        mailbox: Mailbox,
    },
    /// SEARCH the selected mailbox.
    Search {
        /// Criteria to match.
        criteria: SearchCriteria,
    },
    /// FETCH one message.
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Data item to fetch.
        items: FetchItems,
    },
    /// CLOSE the selected mailbox.
    Close,
    /// LOGOUT.
    Logout,
}

impl Command {
    /// Serializes the command with its tag and trailing CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// an argument holds bytes a quoted string cannot carry.
    pub fn serialize(&self, tag: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username)?;
                buf.push(b' ');
                write_astring(&mut buf, password)?;
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox.as_str())?;
            }
            Self::Status { mailbox } => {
                buf.extend_from_slice(b"STATUS ");
                write_astring(&mut buf, mailbox.as_str())?;
                buf.extend_from_slice(b" (MESSAGES)");
            }
            Self::Search { criteria } => {
                buf.extend_from_slice(b"SEARCH ");
                serialize::write_search_criteria(&mut buf, criteria)?;
            }
            Self::Fetch { seq, items } => {
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(seq.to_string().as_bytes());
                buf.push(b' ');
                serialize::write_fetch_items(&mut buf, *items);
            }
            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
        }

        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }

    /// Command name for logging; never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Status { .. } => "STATUS",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Close => "CLOSE",
            Self::Logout => "LOGOUT",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wire(cmd: &Command, tag: &str) -> String {
        String::from_utf8(cmd.serialize(tag).unwrap()).unwrap()
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "recruiter@gmail.com".into(),
            password: "abcd efgh".into(),
        };
        assert_eq!(
            wire(&cmd, "A0000"),
            "A0000 LOGIN recruiter@gmail.com \"abcd efgh\"\r\n"
        );
    }

    #[test]
    fn test_select_and_status() {
        let select = Command::Select {
            mailbox: Mailbox::inbox(),
        };
        assert_eq!(wire(&select, "A0001"), "A0001 SELECT INBOX\r\n");

        let status = Command::Status {
            mailbox: Mailbox::new("Job Offers"),
        };
        assert_eq!(
            wire(&status, "A0002"),
            "A0002 STATUS \"Job Offers\" (MESSAGES)\r\n"
        );
    }

    #[test]
    fn test_search_commands() {
        let all = Command::Search {
            criteria: SearchCriteria::All,
        };
        assert_eq!(wire(&all, "A0003"), "A0003 SEARCH ALL\r\n");

        let unseen = Command::Search {
            criteria: SearchCriteria::Unseen,
        };
        assert_eq!(wire(&unseen, "A0004"), "A0004 SEARCH UNSEEN\r\n");
    }

    #[test]
    fn test_fetch_command() {
        let peek = Command::Fetch {
            seq: SeqNum::new(12).unwrap(),
            items: FetchItems::BodyPeek,
        };
        assert_eq!(wire(&peek, "A0005"), "A0005 FETCH 12 BODY.PEEK[]\r\n");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(wire(&Command::Close, "A0007"), "A0007 CLOSE\r\n");
        assert_eq!(wire(&Command::Logout, "A0009"), "A0009 LOGOUT\r\n");
    }

    #[test]
    fn test_header_search_with_line_break_is_rejected() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Header {
                name: "Message-ID".into(),
                value: "<a@b>\r\nA9 EXPUNGE".into(),
            },
        };
        assert!(matches!(
            cmd.serialize("A0003"),
            Err(crate::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_name_hides_credentials() {
        let cmd = Command::Login {
            username: "u".into(),
            password: "secret".into(),
        };
        assert_eq!(cmd.name(), "LOGIN");
    }
}
