//! Implementation for the not-authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::Status;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok | Status::PreAuth,
                text,
            }) => tracing::debug!(greeting = %text, "server ready"),
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// On failure the client is dropped; the caller decides whether to
    /// reconnect.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.execute(&Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

        tracing::info!(username, "logged in");
        Ok(self.transition(Authenticated))
    }

    /// Like [`login`](Self::login) but hands the connection back whenever
    /// it is still usable, so it can be logged out.
    pub async fn try_login(
        mut self,
        username: &str,
        password: &str,
    ) -> std::result::Result<Client<S, Authenticated>, (Error, Option<Self>)> {
        match self
            .execute(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
        {
            Ok(_) => {
                tracing::info!(username, "logged in");
                Ok(self.transition(Authenticated))
            }
            Err(e) if e.is_connection_lost() => Err((e, None)),
            Err(e) => Err((e, Some(self))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_greeting_ok() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n").build();
        assert!(Client::from_stream(mock).await.is_ok());
    }

    #[tokio::test]
    async fn test_greeting_bye() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(t) if t == "too many connections"));
    }

    #[tokio::test]
    async fn test_login_success() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user@example.com secret\r\n")
            .read(b"* CAPABILITY IMAP4rev1 UNSELECT\r\n")
            .read(b"A0000 OK user@example.com authenticated (Success)\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        assert!(client.login("user@example.com", "secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user@example.com wrong\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::No(t) if t.contains("Invalid credentials")));
    }

    #[tokio::test]
    async fn test_try_login_returns_connection_for_logout() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user@example.com wrong\r\n")
            .read(b"A0000 NO [ALERT] Application-specific password required\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0001 OK bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let (err, client) = client
            .try_login("user@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Application-specific password"));
        client.unwrap().logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_unencodable_password_is_not_sent() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"A0001 OK bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let (err, client) = client
            .try_login("user@example.com", "pw\r\nA9 LOGOUT")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        client.unwrap().logout().await.unwrap();
    }
}
