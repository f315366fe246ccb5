//! # cvmail-core
//!
//! Mailbox retrieval and message decomposition for recruiting inboxes.
//!
//! This crate provides:
//! - A session manager over `cvmail-imap` with classified errors
//! - A message decoder producing [`ParsedMessage`] records
//! - Attachment extraction with size and icon metadata
//! - A subject [`Categorizer`] for job-title buckets
//! - [`MailService`], which ties these together per operation
//!
//! ## Example
//!
//! ```ignore
//! use cvmail_core::{Categorizer, MailConfig, MailService};
//!
//! let config = MailConfig::gmail("me@gmail.com", "app-password");
//! let service = MailService::new(config, Categorizer::with_defaults()?);
//!
//! let messages = service.fetch_all(50).await?;
//! let mailbox = service.categorize_all(messages);
//! println!("{}", serde_json::to_string_pretty(&mailbox)?);
//! ```

#![forbid(unsafe_code)]

pub mod attachment;
pub mod categorize;
mod config;
pub mod decoder;
mod error;
pub mod service;
pub mod session;

pub use attachment::Attachment;
pub use categorize::{CategorizedMailbox, Categorizer, JobCategory, UNCATEGORIZED};
pub use config::{
    DEFAULT_MAILBOX, ENV_ACCEPT_INVALID_CERTS, ENV_EMAIL, ENV_IMAP_HOST, ENV_IMAP_PORT,
    ENV_MAILBOX, ENV_PASSWORD, GMAIL_IMAP_HOST, MailConfig,
};
pub use decoder::ParsedMessage;
pub use error::{ConfigError, MailError, Result};
pub use service::MailService;
pub use session::{Connector, MailSession, RawMessage, SessionState, TlsConnector};
