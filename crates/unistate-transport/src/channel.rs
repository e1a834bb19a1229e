//! The bidirectional message channel a router is bound to.

use std::future::Future;
use std::pin::Pin;

use unistate_protocol::{Message, TransportError};

/// One connection's stream of text frames, in both directions.
///
/// Implemented by every transport. A channel is owned by exactly one router
/// and is never shared, so all methods take `&mut self`.
pub trait MessageChannel: Send {
    /// Wait for the next inbound frame.
    ///
    /// `Ok(None)` means the peer closed the stream; the caller should stop
    /// reading without treating it as an error.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Deliver one frame to the peer.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the channel from this side.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }
}

/// Object-safe sending half of a [`MessageChannel`].
///
/// Operations only ever send, and they are stored behind `dyn`, so they see
/// the channel through this trait instead of the generic one.
pub trait Outbound: Send {
    fn send_text<'a>(
        &'a mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}

impl<T: MessageChannel> Outbound for T {
    fn send_text<'a>(
        &'a mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(self.send(text))
    }
}

impl dyn Outbound + '_ {
    /// Serialize and deliver one message.
    pub async fn send_message(&mut self, message: &Message) -> Result<(), TransportError> {
        let text = message.to_text()?;
        self.send_text(text).await
    }
}
