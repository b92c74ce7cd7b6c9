//! Newline-delimited JSON connection.
//!
//! Messages are JSON, one per line, with no embedded newlines. Lines are read
//! as raw bytes so that invalid UTF-8 reaches the dispatcher as a parse error.
//! Used for the stdio transport; logs go to stderr so stdout carries only
//! messages.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::mcp::dispatcher::Dispatcher;
use crate::transport::duplex::{self, Connection, TransportError};

pub struct LineConnection<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LineConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

#[async_trait]
impl<R, W> Connection for LineConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut line = Vec::new();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|err| TransportError::Receive(err.to_string()))?;

        if bytes_read == 0 {
            return Ok(None);
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(Some(line))
    }

    async fn send(&mut self, message: String) -> Result<(), TransportError> {
        debug_assert!(
            !message.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        let write = async {
            self.writer.write_all(message.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        };
        write
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    async fn close(&mut self) {
        if let Err(err) = self.writer.shutdown().await {
            tracing::debug!(error = %err, "line connection shutdown failed");
        }
    }
}

/// Serves the duplex adapter over stdin/stdout until EOF or shutdown.
pub async fn serve_stdio(dispatcher: &Dispatcher, shutdown: CancellationToken) {
    let connection = LineConnection::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    duplex::run(dispatcher, connection, shutdown).await;
}
