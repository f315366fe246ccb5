//! # cvmail-mime
//!
//! Lenient MIME parsing for received mail.
//!
//! ## Features
//!
//! - **Message parsing**: headers plus a tree of nested multipart parts
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 words, RFC 2231 parameters
//! - **Charsets**: declared charsets via `encoding_rs`, lossy UTF-8 otherwise
//!
//! Parsing never fails. Malformed structure degrades to an opaque single-part
//! body, and malformed encoded words are kept verbatim.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cvmail_mime::{Message, encoding::decode_header};
//!
//! let message = Message::parse(raw_bytes);
//! let subject = decode_header(message.subject().unwrap_or(""));
//!
//! for part in message.walk().filter(|p| p.is_attachment()) {
//!     println!("{:?}: {} bytes", part.filename(), part.decode_body()?.len());
//! }
//! ```

#![forbid(unsafe_code)]

mod content_type;
pub mod encoding;
mod error;
mod header;
mod message;

pub use content_type::{ContentDisposition, ContentType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding, Walk};
