//! Bidirectional message loop.
//!
//! One inbound message is decoded, dispatched and answered before the next
//! one is read, so responses leave in arrival order. The session lives and
//! dies with the loop.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::mcp::{dispatcher::Dispatcher, session::Session};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// A framed, message-oriented connection.
#[async_trait]
pub trait Connection: Send {
    /// Next inbound message as raw bytes; `Ok(None)` once the peer has
    /// disconnected. Undecodable bytes are still a message.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    async fn send(&mut self, message: String) -> Result<(), TransportError>;

    /// Releases the underlying resource. Called exactly once when the loop ends.
    async fn close(&mut self) {}
}

pub async fn run<C: Connection>(
    dispatcher: &Dispatcher,
    mut connection: C,
    shutdown: CancellationToken,
) {
    let mut session = Session::new();
    info!("duplex connection opened");

    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => {
                info!("duplex connection stopping for shutdown");
                break;
            }
            received = connection.recv() => received,
        };

        let message = match message {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!("duplex peer disconnected");
                break;
            }
            Err(err) => {
                error!(error = %err, "duplex transport failed");
                break;
            }
        };

        if message.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let Some(response) = dispatcher.handle_raw(&mut session, &message).await else {
            continue;
        };

        let encoded = match serde_json::to_string(&response) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode duplex response");
                continue;
            }
        };

        if let Err(err) = connection.send(encoded).await {
            warn!(error = %err, "duplex peer unreachable");
            break;
        }
    }

    session.close();
    connection.close().await;
    info!("duplex connection closed");
}
