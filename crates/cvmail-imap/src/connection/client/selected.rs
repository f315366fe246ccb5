//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::{Command, FetchItems, SearchCriteria};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Mailbox, SeqNum};
use crate::{Error, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the open mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Returns matching sequence numbers in ascending order.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<SeqNum>> {
        let responses = self.execute(&Command::Search { criteria }).await?;

        let mut ids: Vec<SeqNum> = responses
            .iter()
            .filter_map(|bytes| match ResponseParser::parse(bytes) {
                Ok(Response::Untagged(UntaggedResponse::Search(ids))) => Some(ids),
                _ => None,
            })
            .flatten()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Fetches the full source of one message.
    pub async fn fetch(&mut self, seq: SeqNum, items: FetchItems) -> Result<Vec<u8>> {
        let responses = self.execute(&Command::Fetch { seq, items }).await?;

        responses
            .iter()
            .find_map(|bytes| match ResponseParser::parse(bytes) {
                Ok(Response::Untagged(UntaggedResponse::Fetch { seq: got, data }))
                    if got == seq =>
                {
                    data.body
                }
                _ => None,
            })
            .ok_or_else(|| Error::Protocol(format!("no message body returned for {seq}")))
    }

    /// Number of messages in `mailbox`, from STATUS (MESSAGES).
    pub async fn status(&mut self, mailbox: &str) -> Result<u32> {
        let responses = self
            .execute(&Command::Status {
                mailbox: Mailbox::new(mailbox),
            })
            .await?;

        responses
            .iter()
            .find_map(|bytes| match ResponseParser::parse(bytes) {
                Ok(Response::Untagged(UntaggedResponse::MailboxStatus { messages, .. })) => {
                    messages
                }
                _ => None,
            })
            .ok_or_else(|| Error::Protocol("STATUS response without MESSAGES".to_string()))
    }

    /// Closes the mailbox and returns to the authenticated state.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.execute(&Command::Close).await?;
        Ok(self.transition(Authenticated))
    }

    /// Like [`close`](Self::close) but hands the connection back whenever
    /// it is still usable, so it can be logged out.
    pub async fn try_close(
        mut self,
    ) -> std::result::Result<Client<S, Authenticated>, (Error, Option<Self>)> {
        match self.execute(&Command::Close).await {
            Ok(_) => Ok(self.transition(Authenticated)),
            Err(e) if e.is_connection_lost() => Err((e, None)),
            Err(e) => Err((e, Some(self))),
        }
    }
}
