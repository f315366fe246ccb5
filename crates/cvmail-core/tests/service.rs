//! End-to-end tests for `MailService` against a scripted server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use cvmail_core::{
    Categorizer, Connector, MailConfig, MailError, MailService, UNCATEGORIZED,
};
use cvmail_imap::Config;

/// Replays a server transcript and records what the client sends.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
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

/// Hands out a single scripted stream.
struct ScriptedConnector {
    stream: Mutex<Option<MockStream>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedConnector {
    fn new(transcript: &str) -> Self {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = MockStream {
            responses: Cursor::new(transcript.as_bytes().to_vec()),
            sent: Arc::clone(&sent),
        };
        Self {
            stream: Mutex::new(Some(stream)),
            sent,
        }
    }

    fn unreachable() -> Self {
        Self {
            stream: Mutex::new(None),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sent(&self) -> String {
        String::from_utf8(self.sent.lock().unwrap().clone()).unwrap()
    }
}

impl Connector for &ScriptedConnector {
    type Stream = MockStream;

    async fn connect(&self, _config: &Config) -> cvmail_imap::Result<MockStream> {
        self.stream.lock().unwrap().take().ok_or_else(|| {
            cvmail_imap::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}

fn service(connector: &ScriptedConnector) -> MailService<&ScriptedConnector> {
    MailService::with_connector(
        MailConfig::gmail("me@gmail.com", "app password"),
        Categorizer::with_defaults().unwrap(),
        connector,
    )
}

const CV_MESSAGE: &str = concat!(
    "From: =?UTF-8?Q?Ren=C3=A9e?= <renee@example.com>\r\n",
    "To: me@gmail.com\r\n",
    "Subject: =?UTF-8?Q?Process_Engineer_=E2=80=93_CV?=\r\n",
    "Date: Tue, 14 May 2024 09:30:00 +0200\r\n",
    "Message-ID: <cv-1@example.com>\r\n",
    "MIME-Version: 1.0\r\n",
    "Content-Type: multipart/mixed; boundary=\"sep\"\r\n",
    "\r\n",
    "--sep\r\n",
    "Content-Type: text/plain; charset=utf-8\r\n",
    "\r\n",
    "Please find my CV attached.\r\n",
    "--sep\r\n",
    "Content-Type: application/pdf; name=\"cv.pdf\"\r\n",
    "Content-Disposition: attachment; filename=\"cv.pdf\"\r\n",
    "Content-Transfer-Encoding: base64\r\n",
    "\r\n",
    "JVBERi0xLjQK\r\n",
    "--sep--\r\n"
);

const HELLO_MESSAGE: &str = concat!(
    "From: friend@example.com\r\n",
    "To: me@gmail.com\r\n",
    "Subject: Hello\r\n",
    "Message-ID: <hello-2@example.com>\r\n",
    "\r\n",
    "Hi!\r\n"
);

const READY: &str = concat!(
    "* OK Gimap ready\r\n",
    "A0000 OK me@gmail.com authenticated (Success)\r\n",
    "* 2 EXISTS\r\n",
    "* 0 RECENT\r\n",
    "A0001 OK [READ-WRITE] INBOX selected. (Success)\r\n",
    "* STATUS \"INBOX\" (MESSAGES 2)\r\n",
    "A0002 OK Success\r\n",
);

fn fetch_response(seq: u32, message: &str) -> String {
    format!("* {seq} FETCH (BODY[] {{{}}}\r\n{message})\r\n", message.len())
}

#[tokio::test]
async fn test_fetch_and_categorize() {
    let transcript = [
        READY.to_string(),
        "* SEARCH 1 2\r\nA0003 OK SEARCH completed\r\n".to_string(),
        fetch_response(2, HELLO_MESSAGE),
        "A0004 OK Success\r\n".to_string(),
        fetch_response(1, CV_MESSAGE),
        "A0005 OK Success\r\n".to_string(),
        "A0006 OK Returned to authenticated state.\r\n".to_string(),
        "* BYE LOGOUT Requested\r\nA0007 OK 73 good day\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);
    let service = service(&connector);

    let messages = service.fetch_all(10).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].subject, "Hello");
    assert_eq!(messages[1].subject, "Process Engineer – CV");
    assert_eq!(messages[1].sender, "Renée <renee@example.com>");
    assert_eq!(messages[1].date, "2024-05-14 09:30:00");
    assert_eq!(messages[1].body, "Please find my CV attached.");
    assert!(messages[1].has_attachments);
    assert_eq!(messages[1].attachments[0].filename, "cv.pdf");
    assert_eq!(messages[1].attachments[0].size_display, "9 B");

    let mailbox = service.categorize_all(messages);
    let json = serde_json::to_value(&mailbox).unwrap();
    assert_eq!(json["Process Engineer"][0]["message_id"], "<cv-1@example.com>");
    assert_eq!(json[UNCATEGORIZED][0]["subject"], "Hello");
    assert_eq!(json["Prompt Engineer"], serde_json::json!([]));
    assert_eq!(json["Software Engineer"], serde_json::json!([]));
    assert!(json["Process Engineer"][0]["attachments"][0].get("data").is_none());

    assert_eq!(
        connector.sent(),
        concat!(
            "A0000 LOGIN me@gmail.com \"app password\"\r\n",
            "A0001 SELECT INBOX\r\n",
            "A0002 STATUS INBOX (MESSAGES)\r\n",
            "A0003 SEARCH ALL\r\n",
            "A0004 FETCH 2 BODY.PEEK[]\r\n",
            "A0005 FETCH 1 BODY.PEEK[]\r\n",
            "A0006 CLOSE\r\n",
            "A0007 LOGOUT\r\n",
        )
    );
}

#[tokio::test]
async fn test_limit_takes_newest() {
    let transcript = [
        READY.to_string(),
        "* SEARCH 1 2\r\nA0003 OK SEARCH completed\r\n".to_string(),
        fetch_response(2, HELLO_MESSAGE),
        "A0004 OK Success\r\n".to_string(),
        "A0005 OK closed\r\nA0006 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);

    let messages = service(&connector).fetch_unread(1).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_id, "<hello-2@example.com>");
    assert!(connector.sent().contains("A0003 SEARCH UNSEEN\r\n"));
}

#[tokio::test]
async fn test_failed_fetch_is_skipped() {
    let transcript = [
        READY.to_string(),
        "* SEARCH 1 2\r\nA0003 OK SEARCH completed\r\n".to_string(),
        "A0004 NO Some messages could not be FETCHed (Failure)\r\n".to_string(),
        fetch_response(1, CV_MESSAGE),
        "A0005 OK Success\r\n".to_string(),
        "A0006 OK closed\r\nA0007 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);

    let messages = service(&connector).fetch_all(50).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_id, "<cv-1@example.com>");
}

#[tokio::test]
async fn test_search_failure_aborts_and_disconnects() {
    let transcript = [
        READY.to_string(),
        "A0003 BAD Could not parse command\r\n".to_string(),
        "A0004 OK closed\r\nA0005 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);

    let err = service(&connector).fetch_all(5).await.unwrap_err();
    assert!(matches!(err, MailError::SearchFailure(_)));
    assert!(connector.sent().ends_with("A0004 CLOSE\r\nA0005 LOGOUT\r\n"));
}

#[tokio::test]
async fn test_rejected_credentials_log_out() {
    let transcript = concat!(
        "* OK Gimap ready\r\n",
        "A0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n",
        "* BYE bye\r\nA0001 OK done\r\n",
    );
    let connector = ScriptedConnector::new(transcript);

    let err = service(&connector).fetch_all(10).await.unwrap_err();
    assert_eq!(err, MailError::InvalidCredentials);
    assert!(connector.sent().ends_with("A0001 LOGOUT\r\n"));
}

#[tokio::test]
async fn test_zero_limit_does_not_connect() {
    let connector = ScriptedConnector::unreachable();
    let messages = service(&connector).fetch_all(0).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_unreachable_server() {
    let connector = ScriptedConnector::unreachable();
    let err = service(&connector).fetch_all(3).await.unwrap_err();
    assert!(matches!(err, MailError::ConnectionFailure(t) if t.contains("connection refused")));
}

#[tokio::test]
async fn test_connection_check() {
    let transcript = [
        READY.to_string(),
        "* STATUS \"INBOX\" (MESSAGES 2)\r\nA0003 OK Success\r\n".to_string(),
        "* SEARCH 1 2\r\nA0004 OK SEARCH completed\r\n".to_string(),
        "A0005 OK closed\r\nA0006 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);
    assert!(service(&connector).test_connection().await);
    assert!(connector.sent().ends_with("A0005 CLOSE\r\nA0006 LOGOUT\r\n"));

    assert!(!service(&ScriptedConnector::unreachable()).test_connection().await);
}

#[tokio::test]
async fn test_find_attachment() {
    let transcript = [
        READY.to_string(),
        "* SEARCH 1\r\nA0003 OK SEARCH completed\r\n".to_string(),
        fetch_response(1, CV_MESSAGE),
        "A0004 OK Success\r\n".to_string(),
        "A0005 OK closed\r\nA0006 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);

    let attachment = service(&connector)
        .find_attachment("<cv-1@example.com>", "cv.pdf")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attachment.data, b"%PDF-1.4\n");
    assert_eq!(attachment.content_type, "application/pdf");
    assert!(
        connector
            .sent()
            .contains("A0003 SEARCH HEADER Message-ID \"<cv-1@example.com>\"\r\n")
    );
}

#[tokio::test]
async fn test_find_attachment_missing() {
    let transcript = [
        READY.to_string(),
        "* SEARCH\r\nA0003 OK SEARCH completed\r\n".to_string(),
        "A0004 OK closed\r\nA0005 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);

    let found = service(&connector)
        .find_attachment("<nope@example.com>", "cv.pdf")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_fetch_without_body_keeps_session() {
    let transcript = [
        READY.to_string(),
        "* SEARCH 1 2\r\nA0003 OK SEARCH completed\r\n".to_string(),
        "A0004 OK Success\r\n".to_string(),
        fetch_response(1, CV_MESSAGE),
        "A0005 OK Success\r\n".to_string(),
        "A0006 OK closed\r\nA0007 OK bye\r\n".to_string(),
    ]
    .concat();
    let connector = ScriptedConnector::new(&transcript);

    let messages = service(&connector).fetch_all(10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_id, "<cv-1@example.com>");
    assert!(connector.sent().ends_with(concat!(
        "A0004 FETCH 2 BODY.PEEK[]\r\n",
        "A0005 FETCH 1 BODY.PEEK[]\r\n",
        "A0006 CLOSE\r\n",
        "A0007 LOGOUT\r\n",
    )));
}

#[tokio::test]
async fn test_message_id_with_line_break_is_not_sent() {
    let transcript = [READY, "A0004 OK closed\r\nA0005 OK bye\r\n"].concat();
    let connector = ScriptedConnector::new(&transcript);

    let err = service(&connector)
        .find_attachment(
            "x\r\nZ9 STORE 1:* +FLAGS (\\Deleted)\r\nZ10 EXPUNGE",
            "cv.pdf",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MailError::SearchFailure(_)));
    assert_eq!(
        connector.sent(),
        concat!(
            "A0000 LOGIN me@gmail.com \"app password\"\r\n",
            "A0001 SELECT INBOX\r\n",
            "A0002 STATUS INBOX (MESSAGES)\r\n",
            "A0004 CLOSE\r\n",
            "A0005 LOGOUT\r\n",
        )
    );
}
