//! In-process channel pair.
//!
//! [`MemoryChannel::pair`] returns the router side and a [`MemoryPeer`] that
//! plays the remote client. Used to embed a router without a socket and to
//! drive it deterministically in tests.

use tokio::sync::mpsc;
use unistate_protocol::{Message, TransportError};

use crate::channel::MessageChannel;

/// Router side of an in-memory connection.
pub struct MemoryChannel {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Remote side of an in-memory connection.
pub struct MemoryPeer {
    to_router: Option<mpsc::UnboundedSender<String>>,
    from_router: mpsc::UnboundedReceiver<String>,
}

impl MemoryChannel {
    pub fn pair() -> (MemoryChannel, MemoryPeer) {
        let (to_router, inbound) = mpsc::unbounded_channel();
        let (outbound, from_router) = mpsc::unbounded_channel();
        (
            MemoryChannel { inbound, outbound },
            MemoryPeer {
                to_router: Some(to_router),
                from_router,
            },
        )
    }
}

impl MessageChannel for MemoryChannel {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inbound.close();
        Ok(())
    }
}

impl MemoryPeer {
    /// Send a raw text frame to the router.
    pub fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        let tx = self.to_router.as_ref().ok_or(TransportError::Closed)?;
        tx.send(text.into()).map_err(|_| TransportError::Closed)
    }

    pub fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        self.send(message.to_text()?)
    }

    /// Wait for the next frame from the router. `None` once the router side
    /// has been dropped and every frame has been read.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_router.recv().await
    }

    /// Like [`MemoryPeer::recv`], parsed. Frames that fail to parse are
    /// skipped.
    pub async fn recv_message(&mut self) -> Option<Message> {
        while let Some(text) = self.from_router.recv().await {
            if let Ok(message) = Message::parse(&text) {
                return Some(message);
            }
        }
        None
    }

    /// Return a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_router.try_recv().ok()
    }

    /// Signal end-of-stream to the router.
    pub fn close(&mut self) {
        self.to_router = None;
    }

    /// Close, then collect everything the router sends until it lets go of
    /// its side.
    pub async fn drain(&mut self) -> Vec<String> {
        self.close();
        let mut frames = Vec::new();
        while let Some(text) = self.from_router.recv().await {
            frames.push(text);
        }
        frames
    }
}
