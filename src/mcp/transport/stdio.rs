//! stdio transport for the MCP server.
//!
//! Framing as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - One wire unit (a message or a batch) per line
//! - Units must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! The transport is generic over its reader and writer so tests can drive
//! it with in-memory buffers.

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};

use crate::mcp::protocol::Payload;
use crate::mcp::transport::{
    decode_payload, encode_payload, Inbound, Transport, TransportError, DEFAULT_MAX_MESSAGE_SIZE,
};

/// A line-delimited MCP transport.
pub struct StdioTransport<R = Stdin, W = Stdout> {
    /// Buffered reader for inbound lines.
    reader: BufReader<R>,
    /// Sink for outbound lines.
    writer: W,
    /// Largest accepted line, excluding the terminator.
    max_message_size: usize,
    /// Set once EOF has been observed.
    closed: bool,
}

impl StdioTransport<Stdin, Stdout> {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Default for StdioTransport<Stdin, Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a transport over an arbitrary reader and writer.
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            closed: false,
        }
    }

    /// Sets the largest accepted line in bytes.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Returns the writer, e.g. to inspect buffered output in tests.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Reads the next line without its terminator.
    ///
    /// Returns `None` on EOF. Reading stops once the line is known to be
    /// oversized, so a hostile peer cannot exhaust memory.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        // Room for the payload plus "\r\n".
        let limit = u64::try_from(self.max_message_size.saturating_add(2)).unwrap_or(u64::MAX);
        let mut line = Vec::new();

        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|source| TransportError::Read { source })?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        if line.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: line.len(),
                max: self.max_message_size,
            });
        }

        Ok(Some(line))
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Inbound, TransportError> {
        if self.closed {
            return Ok(Inbound::Closed);
        }

        let Some(line) = self.read_line().await? else {
            tracing::debug!("stdin reached EOF");
            self.closed = true;
            return Ok(Inbound::Closed);
        };

        Ok(match decode_payload(&line, self.max_message_size)? {
            Some(unit) => Inbound::Messages(unit),
            None => Inbound::Idle,
        })
    }

    async fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        let json = encode_payload(&payload)?;

        // stdio framing forbids embedded newlines
        if json.contains('\n') {
            return Err(TransportError::EmbeddedNewline);
        }

        let write = async {
            self.writer.write_all(json.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        };
        write
            .await
            .map_err(|source| TransportError::Write { source })
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
