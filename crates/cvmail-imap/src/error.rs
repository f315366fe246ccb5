//! Error types for the IMAP client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an IMAP server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The configured host is not a valid TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A server response could not be parsed.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte offset into the response line.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Server completed the command with NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server rejected the command with BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE and is closing the connection.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Connecting, or waiting for a server response, exceeded its timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A command argument cannot be sent as a quoted string.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unexpected data from the server.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns the server-provided text for NO/BAD/BYE completions.
    #[must_use]
    pub fn server_text(&self) -> Option<&str> {
        match self {
            Self::No(text) | Self::Bad(text) | Self::Bye(text) => Some(text),
            _ => None,
        }
    }

    /// True when the connection can no longer carry commands.
    ///
    /// Completed commands that failed (NO, BAD, missing response data) leave
    /// the connection in sync; transport failures and BYE do not.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::InvalidDnsName(_) | Self::Bye(_) | Self::Timeout(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
