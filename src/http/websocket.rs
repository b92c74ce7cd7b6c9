//! WebSocket framing for the duplex adapter.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

use crate::transport::duplex::{Connection, TransportError};

pub struct WebSocketConnection {
    socket: WebSocket,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let message = match self.socket.recv().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(TransportError::Receive(err.to_string())),
                Some(Ok(message)) => message,
            };

            match message {
                Message::Text(text) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Message::Binary(bytes) => return Ok(Some(bytes.to_vec())),
                Message::Close(_) => return Ok(None),
                // control frames are answered by axum
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    async fn send(&mut self, message: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(message.into()))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    async fn close(&mut self) {
        if let Err(err) = self.socket.send(Message::Close(None)).await {
            tracing::debug!(error = %err, "websocket close frame not delivered");
        }
    }
}
