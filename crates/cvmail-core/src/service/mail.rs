//! Mail service for mailbox retrieval.

use cvmail_imap::SearchCriteria;
use cvmail_mime::Message;

use crate::attachment::{self, Attachment};
use crate::categorize::{CategorizedMailbox, Categorizer};
use crate::config::MailConfig;
use crate::decoder::{self, ParsedMessage};
use crate::error::Result;
use crate::session::{Connector, MailSession, TlsConnector};

/// High-level access to one configured mailbox.
#[derive(Debug)]
pub struct MailService<C = TlsConnector> {
    config: MailConfig,
    categorizer: Categorizer,
    connector: C,
}

impl MailService<TlsConnector> {
    /// Service that connects over TLS.
    #[must_use]
    pub const fn new(config: MailConfig, categorizer: Categorizer) -> Self {
        Self::with_connector(config, categorizer, TlsConnector)
    }
}

impl<C: Connector> MailService<C> {
    /// Service that opens its streams through `connector`.
    #[must_use]
    pub const fn with_connector(config: MailConfig, categorizer: Categorizer, connector: C) -> Self {
        Self {
            config,
            categorizer,
            connector,
        }
    }

    /// Account configuration.
    #[must_use]
    pub const fn config(&self) -> &MailConfig {
        &self.config
    }

    /// Categorizer used by [`categorize_all`](Self::categorize_all).
    #[must_use]
    pub const fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    /// Opens a ready session. The caller must hand it to
    /// [`disconnect`](Self::disconnect).
    ///
    /// # Errors
    ///
    /// Returns a classified [`MailError`](crate::MailError) when the session cannot be set up.
    pub async fn connect(&self) -> Result<MailSession<C::Stream>> {
        MailSession::open(&self.connector, &self.config).await
    }

    /// Releases a session with CLOSE and LOGOUT.
    pub async fn disconnect(&self, mut session: MailSession<C::Stream>) {
        session.disconnect().await;
    }

    /// Connects, checks STATUS and runs a trivial search.
    ///
    /// Any failure yields `false`; the session is always released.
    pub async fn test_connection(&self) -> bool {
        let mut session = match self.connect().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "connection test failed");
                return false;
            }
        };

        let result = check_mailbox(&mut session).await;
        self.disconnect(session).await;

        match result {
            Ok(count) => {
                tracing::info!(messages = count, "connection test passed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection test failed");
                false
            }
        }
    }

    /// Up to `limit` most recent messages, newest first.
    ///
    /// Messages that fail to fetch are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or the initial search fails.
    pub async fn fetch_all(&self, limit: usize) -> Result<Vec<ParsedMessage>> {
        self.retrieve(SearchCriteria::All, limit).await
    }

    /// Up to `limit` most recent unread messages, newest first.
    ///
    /// Retrieval does not mark them read.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_all`](Self::fetch_all).
    pub async fn fetch_unread(&self, limit: usize) -> Result<Vec<ParsedMessage>> {
        self.retrieve(SearchCriteria::Unseen, limit).await
    }

    /// Buckets messages with the configured categorizer.
    #[must_use]
    pub fn categorize_all(&self, messages: Vec<ParsedMessage>) -> CategorizedMailbox {
        self.categorizer.categorize_all(messages)
    }

    /// Finds the message with `message_id` and returns its attachment
    /// named `filename`, data included.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or the search fails. A message or
    /// attachment that cannot be found is `Ok(None)`.
    pub async fn find_attachment(
        &self,
        message_id: &str,
        filename: &str,
    ) -> Result<Option<Attachment>> {
        let mut session = self.connect().await?;
        let result = locate_attachment(&mut session, message_id, filename).await;
        self.disconnect(session).await;
        result
    }

    async fn retrieve(&self, criteria: SearchCriteria, limit: usize) -> Result<Vec<ParsedMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut session = self.connect().await?;
        let result = collect_recent(&mut session, criteria, limit).await;
        self.disconnect(session).await;
        result
    }
}

async fn check_mailbox<S>(session: &mut MailSession<S>) -> Result<u32>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let count = session.message_count().await?;
    session.search(SearchCriteria::All).await?;
    Ok(count)
}

async fn collect_recent<S>(
    session: &mut MailSession<S>,
    criteria: SearchCriteria,
    limit: usize,
) -> Result<Vec<ParsedMessage>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let ids = session.search(criteria).await?;
    tracing::info!(found = ids.len(), limit, "retrieving messages");

    let mut messages = Vec::with_capacity(limit.min(ids.len()));
    for id in ids.into_iter().rev().take(limit) {
        if !session.is_ready() {
            tracing::warn!(%id, "session lost, stopping retrieval");
            break;
        }
        match session.fetch(id).await {
            Ok(raw) => messages.push(decoder::parse(&raw.bytes)),
            Err(e) => tracing::warn!(error = %e, "skipping message"),
        }
    }
    Ok(messages)
}

async fn locate_attachment<S>(
    session: &mut MailSession<S>,
    message_id: &str,
    filename: &str,
) -> Result<Option<Attachment>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let criteria = SearchCriteria::Header {
        name: "Message-ID".to_string(),
        value: message_id.trim().to_string(),
    };
    let ids = session.search(criteria).await?;
    if ids.is_empty() {
        tracing::debug!(message_id, "no message with this Message-ID");
    }

    for id in ids.into_iter().rev() {
        let raw = match session.fetch(id).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "skipping message");
                continue;
            }
        };

        let found = attachment::extract(&Message::parse(&raw.bytes))
            .into_iter()
            .find(|a| a.filename == filename);
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}
