//! JSON-lines framing over any async byte stream.
//!
//! The reference transport is a Unix socket, but the framing is generic
//! so tests can drive the service over an in-memory duplex pipe.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::event::{CallResponse, Request};

/// Reads newline-delimited JSON requests from one half of a stream.
#[derive(Debug)]
pub struct RequestReader<R> {
    lines: tokio::io::Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> RequestReader<R> {
    /// Wraps the read half of a transport stream.
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Receives the next request, or `None` when the transport closed.
    ///
    /// # Errors
    ///
    /// Returns an error on stream failure or a malformed message.
    pub async fn recv(&mut self) -> Result<Option<Request>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(&line)?));
        }
    }
}

/// Writes newline-delimited JSON responses to one half of a stream.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    /// Wraps the write half of a transport stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Sends one response.
    ///
    /// # Errors
    ///
    /// Returns an error on stream failure or an unencodable message.
    pub async fn send(&mut self, response: &CallResponse) -> Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
