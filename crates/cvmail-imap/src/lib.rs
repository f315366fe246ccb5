//! # cvmail-imap
//!
//! A small async IMAP4rev1 client covering what a read-only mail fetcher
//! needs: LOGIN, SELECT, STATUS, SEARCH, FETCH of whole messages, CLOSE and
//! LOGOUT over implicit TLS.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cvmail_imap::{Client, Config, FetchItems, SearchCriteria};
//!
//! #[tokio::main]
//! async fn main() -> cvmail_imap::Result<()> {
//!     let config = Config::new("imap.gmail.com");
//!     let stream = cvmail_imap::connection::connect(&config).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client.login("user@gmail.com", "app-password").await?;
//!     let mut inbox = client.select("INBOX").await?;
//!
//!     for seq in inbox.search(SearchCriteria::All).await? {
//!         let raw = inbox.fetch(seq, FetchItems::BodyPeek).await?;
//!         println!("{seq}: {} bytes", raw.len());
//!     }
//!
//!     inbox.close().await?.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//!                                       ↑                          │
//!                                       └──────── close() ─────────┘
//! ```

#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchItems, SearchCriteria, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FramedStream, ImapStream, NotAuthenticated,
    Security, Selected,
};
pub use error::{Error, Result};
pub use parser::{FetchData, Response, ResponseParser, UntaggedResponse};
pub use types::{Mailbox, SeqNum, Status, Tag};
