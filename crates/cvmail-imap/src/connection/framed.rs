//! Response framing.
//!
//! Server responses are CRLF-terminated lines, except that a line ending in
//! `{n}` announces `n` raw bytes that belong to the same response. A FETCH
//! of a whole message is therefore a single response spanning many lines.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Longest single line accepted outside of a literal.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted; bounds memory for one fetched message.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered, response-oriented wrapper around a byte stream.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    io_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            io_timeout: None,
        }
    }

    /// Bounds how long [`read_response`](Self::read_response) may wait.
    pub const fn set_io_timeout(&mut self, timeout: Option<Duration>) {
        self.io_timeout = timeout;
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Bytes> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_framed())
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.read_framed().await,
        }
    }

    async fn read_framed(&mut self) -> Result<Bytes> {
        let mut response = BytesMut::new();

        loop {
            let line_start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(len) = literal_length(&response[line_start..]) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"),
                )));
            }

            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response.freeze())
    }

    /// Appends one CRLF-terminated line to `out`.
    async fn read_line_into(&mut self, out: &mut BytesMut) -> Result<()> {
        let start = out.len();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // CR may be the last byte of the previous chunk.
            let scan_from = usize::from(out.len() > start && out.ends_with(b"\r"));
            let joined_end = if scan_from == 1 && buf[0] == b'\n' {
                Some(0)
            } else {
                find_crlf(buf).map(|pos| pos + 1)
            };

            if let Some(end) = joined_end {
                out.extend_from_slice(&buf[..=end]);
                self.reader.consume(end + 1);
                return Ok(());
            }

            let len = buf.len();
            out.extend_from_slice(buf);
            self.reader.consume(len);

            if out.len() - start > MAX_LINE_LENGTH {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line too long",
                )));
            }
        }
    }

    /// Reads responses until the completion line for `tag`.
    ///
    /// The returned list ends with the tagged response.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Bytes>> {
        let mut responses = Vec::new();

        loop {
            let response = self.read_response().await?;
            let done = is_tagged_with(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Writes a serialized command and flushes.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half of the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// True if `response` starts with `tag` followed by a space.
fn is_tagged_with(response: &[u8], tag: &str) -> bool {
    response
        .strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Length announced by a trailing `{n}` or `{n+}` on a CRLF-terminated line.
fn literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"* 1 FETCH (BODY[] {342}\r\n"), Some(342));
        assert_eq!(literal_length(b"{12+}\r\n"), Some(12));
        assert_eq!(literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(literal_length(b"A1 OK done\r\n"), None);
        assert_eq!(literal_length(b"{}\r\n"), None);
        assert_eq!(literal_length(b"{x1}\r\n"), None);
        assert_eq!(literal_length(b"{12}"), None);
    }

    #[test]
    fn test_is_tagged_with() {
        assert!(is_tagged_with(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged_with(b"A00010 OK done\r\n", "A0001"));
        assert!(!is_tagged_with(b"* OK hi\r\n", "A0001"));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(&response[..], b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_line_split_across_chunks() {
        let mock = Builder::new()
            .read(b"* OK rea")
            .read(b"dy\r")
            .read(b"\n* SEARCH\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(&framed.read_response().await.unwrap()[..], b"* OK ready\r\n");
        assert_eq!(&framed.read_response().await.unwrap()[..], b"* SEARCH\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal_containing_crlf() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {12}\r\n")
            .read(b"a: b\r\n\r\nbody)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(&response[..], b"* 1 FETCH (BODY[] {12}\r\na: b\r\n\r\nbody)\r\n");
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0000 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0000 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_tagged() {
        let mock = Builder::new()
            .read(b"* 3 EXISTS\r\n")
            .read(b"* OK [UIDNEXT 4] ok\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0001").await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(&responses[2][..], b"A0001 OK [READ-WRITE] done\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_io_timeout() {
        let mock = Builder::new()
            .wait(Duration::from_secs(5))
            .read(b"* OK late\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        framed.set_io_timeout(Some(Duration::from_millis(10)));

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        framed.set_io_timeout(None);
        let late = framed.read_response().await.unwrap();
        assert_eq!(&late[..], b"* OK late\r\n");
    }

    #[tokio::test]
    async fn test_eof_is_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(err.to_string().contains("line too long"));
    }
}
