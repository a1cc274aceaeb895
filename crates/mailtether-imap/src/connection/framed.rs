//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines with support for literals. The reader
//! returns one complete response at a time: every line plus the exact
//! `{n}` bytes announced at the end of a line.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Buffered reader yielding whole IMAP responses.
pub struct FramedReader<R> {
    reader: BufReader<R>,
}

impl<R> FramedReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a new framed reader.
    pub fn new(stream: R) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
        }
    }

    /// Reads a complete IMAP response, including embedded literals.
    ///
    /// Returns `Ok(None)` on a clean EOF between responses. EOF in the middle
    /// of a response is [`Error::ConnectionClosed`].
    pub async fn read_response(&mut self) -> Result<Option<Vec<u8>>> {
        let mut response = Vec::new();

        loop {
            let Some(line) = self.read_line().await? else {
                if response.is_empty() {
                    return Ok(None);
                }
                return Err(Error::ConnectionClosed);
            };
            response.extend_from_slice(&line);

            let Some(literal_len) = parse_literal_length(&line) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::DataFormat(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + literal_len, 0);
            self.reader
                .read_exact(&mut response[start..])
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
                    _ => Error::Io(e),
                })?;
        }

        Ok(Some(response))
    }

    /// Reads a single CRLF-terminated line; `None` on EOF before any byte.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(Error::ConnectionClosed);
            }

            if let Some(pos) = find_crlf(&line, buf) {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::DataFormat("line too long".to_string()));
            }
        }

        Ok(Some(line))
    }

    /// Returns bytes read from the transport but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        self.reader.buffer()
    }

    /// Consumes the reader and returns the inner stream.
    ///
    /// Buffered data is lost; check [`buffered`](Self::buffered) first.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Buffered writer for command data.
pub struct FramedWriter<W> {
    writer: W,
    write_buffer: BytesMut,
}

impl<W> FramedWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates a new framed writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Writes `data` to the stream and flushes it.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);
        self.writer.write_all(&self.write_buffer).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Consumes the writer and returns the inner stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Returns the end offset (exclusive) of the first CRLF in `buf`, also
/// catching a CR left at the end of the previous chunk in `prev`.
fn find_crlf(prev: &[u8], buf: &[u8]) -> Option<usize> {
    if prev.last() == Some(&b'\r') && buf.first() == Some(&b'\n') {
        return Some(1);
    }
    buf.windows(2).position(|w| w == b"\r\n").map(|pos| pos + 2)
}

/// Parses a literal length from the end of a line.
///
/// Matches patterns like `{123}\r\n` or `{123+}\r\n` (non-synchronizing).
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
