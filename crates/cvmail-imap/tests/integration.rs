//! Integration tests for the IMAP client.
//!
//! A mock stream replays a canned server transcript and records what the
//! client sends, so whole sessions can be checked without a server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use cvmail_imap::{Client, Error, FetchItems, SearchCriteria};

/// Mock stream that returns predefined responses.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap();
        let data = self.responses.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let to_read = (data.len() - pos).min(buf.remaining());
        buf.put_slice(&data[pos..pos + to_read]);
        self.responses.set_position((pos + to_read) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn fetch_response(seq: u32, message: &str) -> String {
    format!("* {seq} FETCH (BODY[] {{{}}}\r\n{message})\r\n", message.len())
}

#[tokio::test]
async fn test_full_session() {
    let first = "From: a@example.com\r\nSubject: Prompt Engineer role\r\n\r\nHello\r\n";
    let second = "From: b@example.com\r\nSubject: Lunch\r\n\r\nHi\r\n";
    let server = [
        "* OK Gimap ready\r\n".to_string(),
        "A0000 OK authenticated (Success)\r\n".to_string(),
        "* 2 EXISTS\r\n* 0 RECENT\r\nA0001 OK [READ-WRITE] INBOX selected\r\n".to_string(),
        "* SEARCH 1 2\r\nA0002 OK SEARCH completed\r\n".to_string(),
        fetch_response(2, second),
        "A0003 OK Success\r\n".to_string(),
        fetch_response(1, first),
        "A0004 OK Success\r\n".to_string(),
        "A0005 OK Returned to authenticated state\r\n".to_string(),
        "* BYE LOGOUT Requested\r\nA0006 OK bye\r\n".to_string(),
    ]
    .concat();
    let (stream, sent) = MockStream::new(server.as_bytes());

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("user@gmail.com", "app password").await.unwrap();
    let mut inbox = client.select("INBOX").await.unwrap();
    assert_eq!(inbox.mailbox(), "INBOX");

    let ids = inbox.search(SearchCriteria::All).await.unwrap();
    assert_eq!(ids.len(), 2);

    let mut bodies = Vec::new();
    for seq in ids.into_iter().rev() {
        bodies.push(inbox.fetch(seq, FetchItems::BodyPeek).await.unwrap());
    }
    assert_eq!(bodies[0], second.as_bytes());
    assert_eq!(bodies[1], first.as_bytes());

    inbox.close().await.unwrap().logout().await.unwrap();

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(
        sent,
        "A0000 LOGIN user@gmail.com \"app password\"\r\n\
         A0001 SELECT INBOX\r\n\
         A0002 SEARCH ALL\r\n\
         A0003 FETCH 2 BODY.PEEK[]\r\n\
         A0004 FETCH 1 BODY.PEEK[]\r\n\
         A0005 CLOSE\r\n\
         A0006 LOGOUT\r\n"
    );
}

#[tokio::test]
async fn test_rejected_login_surfaces_server_text() {
    let server = b"* OK ready\r\nA0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n";
    let (stream, _sent) = MockStream::new(server);

    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("user@gmail.com", "nope").await.unwrap_err();
    assert_eq!(
        err.server_text(),
        Some("[AUTHENTICATIONFAILED] Invalid credentials (Failure)")
    );
}

#[tokio::test]
async fn test_fetch_failure_keeps_session_usable() {
    let server = [
        "* OK ready\r\n",
        "A0000 OK ok\r\n",
        "* 1 EXISTS\r\nA0001 OK ok\r\n",
        "A0002 NO [UNAVAILABLE] Temporary failure\r\n",
        "* 1 FETCH (BODY[] {3}\r\nabc)\r\nA0003 OK ok\r\n",
    ]
    .concat();
    let (stream, _sent) = MockStream::new(server.as_bytes());

    let client = Client::from_stream(stream).await.unwrap();
    let mut inbox = client
        .login("u", "p")
        .await
        .unwrap()
        .select("INBOX")
        .await
        .unwrap();

    let seq = cvmail_imap::SeqNum::new(1).unwrap();
    let err = inbox.fetch(seq, FetchItems::BodyPeek).await.unwrap_err();
    assert!(matches!(err, Error::No(_)));

    let body = inbox.fetch(seq, FetchItems::BodyPeek).await.unwrap();
    assert_eq!(body, b"abc");
}

#[tokio::test]
async fn test_connection_drop_mid_command() {
    let (stream, _sent) = MockStream::new(b"* OK ready\r\n");

    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("u", "p").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
