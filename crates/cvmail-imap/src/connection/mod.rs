//! IMAP connection management.
//!
//! - Configuration (host, port, security, timeouts)
//! - TLS/plaintext stream abstraction
//! - Response framing with literal support
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect, create_tls_connector};
