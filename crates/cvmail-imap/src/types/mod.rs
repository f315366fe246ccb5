//! Core IMAP types shared by the command, parser and client layers.

mod identifiers;
mod mailbox;
mod status;

pub use identifiers::{SeqNum, Tag};
pub use mailbox::Mailbox;
pub use status::Status;
