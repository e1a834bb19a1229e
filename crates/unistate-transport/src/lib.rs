//! unistate Transport Layer
//!
//! Provides the message channels the router reads from and writes to:
//! - [`MessageChannel`], the seam between the router and any transport
//! - [`WsChannel`] and [`TransportServer`], WebSocket over Axum
//! - [`MemoryChannel`], an in-process pair for embedding and tests
//!
//! The transport knows nothing about tags or operations; it hands one
//! channel per accepted connection to a [`ConnectionHandler`].

pub mod channel;
pub mod client;
pub mod memory;
pub mod server;
pub mod ws;

pub use channel::{MessageChannel, Outbound};
pub use client::ClientConnection;
pub use memory::{MemoryChannel, MemoryPeer};
pub use server::{ConnectionHandler, TransportConfig, TransportServer};
pub use unistate_protocol::TransportError;
pub use ws::WsChannel;
