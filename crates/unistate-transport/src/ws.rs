//! [`MessageChannel`] over an Axum WebSocket.

use axum::extract::ws::{Message, WebSocket};
use unistate_protocol::TransportError;

use crate::channel::MessageChannel;

/// One accepted WebSocket connection.
///
/// Text frames pass through unchanged. Binary frames are decoded as UTF-8
/// lossily, so garbage bytes surface as a malformed message rather than a
/// transport failure. Ping/pong frames are answered by the socket itself.
pub struct WsChannel {
    socket: WebSocket,
}

impl WsChannel {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl MessageChannel for WsChannel {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => return Err(TransportError::WebSocket(e.to_string())),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}
