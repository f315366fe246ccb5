//! Type-state IMAP client.
//!
//! - `NotAuthenticated`: greeting read
//! - `Authenticated`: after LOGIN
//! - `Selected`: after SELECT
//!
//! Each state exposes only the commands valid in it. Every method takes the
//! client by `&mut self` or by value, so commands on one connection are
//! strictly sequential.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser};
use crate::types::Status;
use crate::{Error, Result};

/// IMAP client connection in state `State`.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            state,
        }
    }

    /// Bounds how long any single server response may take.
    pub const fn set_io_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.stream.set_io_timeout(timeout);
    }

    /// Ends the session with LOGOUT.
    ///
    /// The server may close the connection right after `* BYE`; that is
    /// treated as success.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        tracing::debug!(tag, "LOGOUT");
        self.stream
            .write_command(&Command::Logout.serialize(&tag)?)
            .await?;

        match self.stream.read_until_tagged(&tag).await {
            Ok(responses) => Self::check_tagged_ok(&responses, &tag)?,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(e),
        }

        let _ = self.stream.shutdown().await;
        Ok(())
    }

    /// Sends a command and reads through its completion.
    ///
    /// Fails with NO/BAD/BYE when the completion is not OK. A command
    /// whose arguments cannot be encoded is never written.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Bytes>> {
        let tag = self.tag_gen.next();
        let data = command.serialize(&tag)?;
        tracing::debug!(tag, command = command.name(), "sending command");
        self.stream.write_command(&data).await?;

        let responses = self.stream.read_until_tagged(&tag).await?;
        Self::check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Checks that the tagged completion is OK.
    pub(crate) fn check_tagged_ok(responses: &[Bytes], tag: &str) -> Result<()> {
        for bytes in responses.iter().rev() {
            if let Ok(Response::Tagged {
                tag: resp_tag,
                status,
                text,
            }) = ResponseParser::parse(bytes)
                && resp_tag.as_str() == tag
            {
                return match status {
                    Status::Ok | Status::PreAuth => Ok(()),
                    Status::No => Err(Error::No(text)),
                    Status::Bad => Err(Error::Bad(text)),
                    Status::Bye => Err(Error::Bye(text)),
                };
            }
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }
}
