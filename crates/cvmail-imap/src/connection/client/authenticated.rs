//! Implementation for the authenticated state.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::Mailbox;
use crate::{Error, Result};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens a mailbox read-write.
    pub async fn select(mut self, mailbox: &str) -> Result<Client<S, Selected>> {
        let responses = self
            .execute(&Command::Select {
                mailbox: Mailbox::new(mailbox),
            })
            .await?;
        tracing::debug!(mailbox, exists = exists_count(&responses), "mailbox selected");

        Ok(self.transition(Selected::new(mailbox)))
    }

    /// Like [`select`](Self::select) but hands the connection back whenever
    /// it is still usable, so it can be logged out.
    pub async fn try_select(
        mut self,
        mailbox: &str,
    ) -> std::result::Result<Client<S, Selected>, (Error, Option<Self>)> {
        let command = Command::Select {
            mailbox: Mailbox::new(mailbox),
        };
        match self.execute(&command).await {
            Ok(responses) => {
                tracing::debug!(mailbox, exists = exists_count(&responses), "mailbox selected");
                Ok(self.transition(Selected::new(mailbox)))
            }
            Err(e) if e.is_connection_lost() => Err((e, None)),
            Err(e) => Err((e, Some(self))),
        }
    }
}

/// Last EXISTS count reported during a SELECT exchange.
fn exists_count(responses: &[Bytes]) -> u32 {
    responses
        .iter()
        .rev()
        .find_map(|bytes| match ResponseParser::parse(bytes) {
            Ok(Response::Untagged(UntaggedResponse::Exists(n))) => Some(n),
            _ => None,
        })
        .unwrap_or(0)
}
