//! RouterService: serves every accepted connection with its own router.

use std::sync::Arc;

use tracing::{debug, error};
use unistate_transport::{ClientConnection, ConnectionHandler, MessageChannel, WsChannel};

use crate::registry::OperationRegistry;
use crate::router::{ConnectionRouter, RouterConfig};

/// Builds one [`ConnectionRouter`] per connection, all sharing the same
/// registry and configuration.
pub struct RouterService {
    registry: Arc<OperationRegistry>,
    config: RouterConfig,
}

impl RouterService {
    pub fn new(registry: OperationRegistry, config: RouterConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    /// A router for `channel`, configured like every other connection.
    pub fn router<C: MessageChannel>(&self, client_id: &str, channel: C) -> ConnectionRouter<C> {
        ConnectionRouter::new(channel, Arc::clone(&self.registry))
            .with_config(self.config.clone())
            .with_client_id(client_id)
    }

    /// Serve `channel` until it ends. The connection's state is dropped on
    /// return.
    pub async fn serve_channel<C: MessageChannel>(&self, client_id: &str, channel: C) {
        let mut router = self.router(client_id, channel);
        if let Err(e) = router.route().await {
            error!("Connection {client_id} ended with transport error: {e}");
        }
        debug!(
            "Dropping state for {client_id} ({} keys)",
            router.state().len()
        );
    }
}

impl ConnectionHandler for RouterService {
    async fn serve(&self, client: ClientConnection, channel: WsChannel) {
        self.serve_channel(&client.id, channel).await;
    }
}
