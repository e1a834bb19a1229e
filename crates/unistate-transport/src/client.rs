//! Per-connection identity used for logging.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Identity of one accepted connection.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// Unique client ID
    pub id: String,
    /// Peer address, when the transport knows it
    pub remote_addr: Option<SocketAddr>,
    /// When the client connected
    pub connected_at: Instant,
}

impl ClientConnection {
    pub fn new(remote_addr: Option<SocketAddr>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            remote_addr,
            connected_at: Instant::now(),
        }
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
