//! Error types for MIME decoding.
//!
//! Structural problems never surface here; the parser degrades instead.
//! Only explicit decode requests on a part can fail.

use thiserror::Error;

/// Errors from decoding a value or a part body.
#[derive(Debug, Error)]
pub enum Error {
    /// Content-Type value lacking a usable `type/subtype`.
    #[error("Content-Type has no type/subtype: {0:?}")]
    InvalidContentType(String),

    /// Base64 payload with characters outside the alphabet.
    #[error("Bad base64 payload: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

/// Result alias for fallible decoding.
pub type Result<T> = std::result::Result<T, Error>;
