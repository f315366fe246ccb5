//! One authenticated mailbox session.
//!
//! A [`MailSession`] walks `Disconnected → Connecting → Authenticated →
//! MailboxSelected → Ready` while connecting. Once `Ready` it can search and
//! fetch any number of times. Failures during connect release the
//! connection on a best-effort basis and leave the session `Disconnected`.

use std::fmt;
use std::future::Future;

use cvmail_imap::connection::connect;
use cvmail_imap::{
    Client, Config, Error as ImapError, FetchItems, ImapStream, NotAuthenticated, SearchCriteria,
    Selected, SeqNum,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::MailConfig;
use crate::error::{MailError, Result};

/// Lifecycle of a [`MailSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Transport is being established.
    Connecting,
    /// LOGIN succeeded.
    Authenticated,
    /// SELECT succeeded.
    MailboxSelected,
    /// Mailbox verified; search and fetch are allowed.
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::MailboxSelected => "mailbox-selected",
            Self::Ready => "ready",
        })
    }
}

/// Opens the byte stream a session runs over.
pub trait Connector {
    /// Stream type produced by this connector.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connects to the server described by `config`.
    fn connect(
        &self,
        config: &Config,
    ) -> impl Future<Output = cvmail_imap::Result<Self::Stream>> + Send;
}

/// Connects over TCP with TLS as configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector;

impl Connector for TlsConnector {
    type Stream = ImapStream;

    async fn connect(&self, config: &Config) -> cvmail_imap::Result<ImapStream> {
        connect(config).await
    }
}

/// A fetched message: server sequence number plus raw RFC 5322 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Sequence number the message was fetched by.
    pub id: SeqNum,
    /// Message source.
    pub bytes: Vec<u8>,
}

/// An exclusively owned connection to one selected mailbox.
pub struct MailSession<S> {
    state: SessionState,
    client: Option<Client<S, Selected>>,
}

impl<S> MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Connects, logs in, selects the configured mailbox and verifies it
    /// with STATUS.
    ///
    /// # Errors
    ///
    /// Returns a classified [`MailError`]. On LOGIN or SELECT rejection the
    /// connection is logged out before returning.
    pub async fn open<C>(connector: &C, config: &MailConfig) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        let mut session = Self {
            state: SessionState::Disconnected,
            client: None,
        };
        session.set_state(SessionState::Connecting);

        let stream = connector
            .connect(&config.imap)
            .await
            .map_err(|e| session.fail("connect", e))?;
        let io_timeout = config.imap.io_timeout;
        let greeting =
            tokio::time::timeout(io_timeout, Client::<S, NotAuthenticated>::from_stream(stream))
                .await
                .map_err(|_| session.fail("greeting", ImapError::Timeout(io_timeout)))?;
        let mut client = greeting.map_err(|e| session.fail("greeting", e))?;
        client.set_io_timeout(Some(io_timeout));

        let client = match client.try_login(&config.username, &config.password).await {
            Ok(client) => client,
            Err((e, conn)) => {
                if let Some(conn) = conn
                    && let Err(logout) = conn.logout().await
                {
                    tracing::debug!(error = %logout, "logout after rejected login failed");
                }
                return Err(session.fail("login", e));
            }
        };
        session.set_state(SessionState::Authenticated);

        let mut client = match client.try_select(&config.mailbox).await {
            Ok(client) => client,
            Err((e, conn)) => {
                if let Some(conn) = conn
                    && let Err(logout) = conn.logout().await
                {
                    tracing::debug!(error = %logout, "logout after rejected select failed");
                }
                return Err(session.fail("select", e));
            }
        };
        session.set_state(SessionState::MailboxSelected);

        match client.status(&config.mailbox).await {
            Ok(count) => {
                tracing::info!(mailbox = %config.mailbox, messages = count, "mailbox ready");
            }
            Err(e) => {
                session.client = Some(client);
                session.disconnect().await;
                return Err(session.fail("status", e));
            }
        }

        session.client = Some(client);
        session.set_state(SessionState::Ready);
        Ok(session)
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True when search and fetch are allowed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready)
    }

    /// Selected mailbox, while connected.
    #[must_use]
    pub fn mailbox(&self) -> Option<&str> {
        self.client.as_ref().map(Client::mailbox)
    }

    /// Sequence numbers matching `criteria`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::SearchFailure`] if the session is not ready or
    /// the server rejects the search.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<SeqNum>> {
        let client = self
            .ready_client()
            .ok_or_else(|| MailError::SearchFailure("session is not ready".to_string()))?;

        let result = client.search(criteria).await;
        match result {
            Ok(ids) => {
                tracing::debug!(count = ids.len(), "search complete");
                Ok(ids)
            }
            Err(e) => {
                self.drop_if_broken(&e);
                Err(MailError::SearchFailure(e.to_string()))
            }
        }
    }

    /// Fetches the full source of one message without setting `\Seen`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::FetchFailure`]. A rejected or empty fetch leaves
    /// the session usable; a broken connection does not.
    pub async fn fetch(&mut self, id: SeqNum) -> Result<RawMessage> {
        let client = self.ready_client().ok_or_else(|| MailError::FetchFailure {
            id: id.get(),
            message: "session is not ready".to_string(),
        })?;

        let result = client.fetch(id, FetchItems::BodyPeek).await;
        match result {
            Ok(bytes) => {
                tracing::trace!(%id, size = bytes.len(), "fetched message");
                Ok(RawMessage { id, bytes })
            }
            Err(e) => {
                self.drop_if_broken(&e);
                Err(MailError::FetchFailure {
                    id: id.get(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Message count of the selected mailbox as reported by STATUS.
    ///
    /// # Errors
    ///
    /// Returns a classified error if the session is not ready or the
    /// server rejects the query.
    pub async fn message_count(&mut self) -> Result<u32> {
        let client = self
            .ready_client()
            .ok_or_else(|| MailError::ConnectionFailure("session is not ready".to_string()))?;
        let mailbox = client.mailbox().to_string();

        let result = client.status(&mailbox).await;
        result.map_err(|e| {
            self.drop_if_broken(&e);
            MailError::from(e)
        })
    }

    /// CLOSE then LOGOUT. LOGOUT is sent even when CLOSE is rejected.
    /// Errors are logged and swallowed.
    pub async fn disconnect(&mut self) {
        let Some(client) = self.client.take() else {
            self.set_state(SessionState::Disconnected);
            return;
        };

        let logout = match client.try_close().await {
            Ok(client) => client.logout().await,
            Err((e, Some(client))) => {
                tracing::debug!(error = %e, "close failed");
                client.logout().await
            }
            Err((e, None)) => Err(e),
        };
        if let Err(e) = logout {
            tracing::debug!(error = %e, "disconnect failed");
        }
        self.set_state(SessionState::Disconnected);
    }

    fn ready_client(&mut self) -> Option<&mut Client<S, Selected>> {
        if self.is_ready() {
            self.client.as_mut()
        } else {
            None
        }
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(from = %self.state, to = %state, "session state");
        self.state = state;
    }

    fn fail(&mut self, step: &'static str, err: ImapError) -> MailError {
        tracing::warn!(step, error = %err, "session setup failed");
        self.client = None;
        self.set_state(SessionState::Disconnected);
        MailError::from(err)
    }

    /// Forgets the connection after errors that leave it unusable.
    ///
    /// A command that completed, even without the data asked for, leaves
    /// the connection in sync and the session ready.
    fn drop_if_broken(&mut self, err: &ImapError) {
        if err.is_connection_lost() {
            tracing::warn!(error = %err, "connection lost");
            self.client = None;
            self.set_state(SessionState::Disconnected);
        }
    }
}

impl<S> fmt::Debug for MailSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSession")
            .field("state", &self.state)
            .field("connected", &self.client.is_some())
            .finish()
    }
}
