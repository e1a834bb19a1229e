//! Connection Router: the per-connection dispatch loop.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use unistate_protocol::{ErrorReport, Message, RouteError, TransportError};
use unistate_transport::MessageChannel;

use crate::operation::OperationCx;
use crate::registry::{OperationRegistry, Resolution};
use crate::state::ConnectionState;

/// What to do with a message whose tag matches no operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTagPolicy {
    /// Log locally, send nothing to the peer.
    #[default]
    Silent,
    /// Log locally and send an `error` message like any other failure.
    Notify,
}

/// Router configuration.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub unknown_tags: UnknownTagPolicy,
}

/// Where the dispatch loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterPhase {
    AwaitingMessage,
    Parsing,
    Dispatching,
    SendingError,
    Closed,
}

/// Serves one connection: owns its state and channel, and runs the
/// receive → parse → resolve → invoke loop until the channel ends.
pub struct ConnectionRouter<C: MessageChannel> {
    channel: C,
    state: ConnectionState,
    registry: Arc<OperationRegistry>,
    config: RouterConfig,
    phase: RouterPhase,
    client_id: String,
}

impl<C: MessageChannel> ConnectionRouter<C> {
    /// Bind a fresh, empty state to `channel`.
    pub fn new(channel: C, registry: Arc<OperationRegistry>) -> Self {
        Self {
            channel,
            state: ConnectionState::new(),
            registry,
            config: RouterConfig::default(),
            phase: RouterPhase::AwaitingMessage,
            client_id: String::from("local"),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn phase(&self) -> RouterPhase {
        self.phase
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Serialize and deliver one message to the peer.
    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        self.channel.send(message.to_text()?).await
    }

    /// Run the dispatch loop.
    ///
    /// Returns `Ok(())` when the peer ends the stream. Per-message failures
    /// are reported to the peer and never end the loop; only a
    /// [`TransportError`] does.
    pub async fn route(&mut self) -> Result<(), TransportError> {
        let result = self.run().await;
        self.set_phase(RouterPhase::Closed);
        result
    }

    /// Close the channel from this side.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.set_phase(RouterPhase::Closed);
        self.channel.close().await
    }

    async fn run(&mut self) -> Result<(), TransportError> {
        loop {
            self.set_phase(RouterPhase::AwaitingMessage);
            let Some(text) = self.channel.recv().await? else {
                debug!("Channel closed by peer: {}", self.client_id);
                return Ok(());
            };

            match self.handle_frame(&text).await {
                Ok(()) => {}
                Err(RouteError::Transport(e)) => return Err(e),
                Err(RouteError::OperationNotFound { tag }) => {
                    warn!("Operation not found: {tag} (client {})", self.client_id);
                    if self.config.unknown_tags == UnknownTagPolicy::Notify {
                        self.report(&RouteError::not_found(tag)).await?;
                    }
                }
                Err(err) => self.report(&err).await?,
            }
        }
    }

    /// Parse, resolve and invoke one inbound frame.
    async fn handle_frame(&mut self, text: &str) -> Result<(), RouteError> {
        self.set_phase(RouterPhase::Parsing);
        let (tag, fields) = Message::parse(text)?.into_parts();

        let registry = Arc::clone(&self.registry);
        let operation = match registry.resolve(&tag) {
            Resolution::Found(operation) => operation,
            Resolution::Forbidden => return Err(RouteError::forbidden(tag)),
            Resolution::NotFound => return Err(RouteError::not_found(tag)),
        };

        self.set_phase(RouterPhase::Dispatching);
        debug!("Dispatching {tag} (client {})", self.client_id);
        let mut cx = OperationCx::new(&mut self.state, &mut self.channel, &self.client_id);
        operation.invoke_dyn(&mut cx, fields).await
    }

    /// Send the `error` message for a per-message failure.
    async fn report(&mut self, err: &RouteError) -> Result<(), TransportError> {
        self.set_phase(RouterPhase::SendingError);
        let report = ErrorReport::from_error(err);
        warn!("{} error for client {}: {}", report.kind, self.client_id, report.error);
        debug!("{}", report.details);
        self.send(&report.into_message()).await
    }

    fn set_phase(&mut self, phase: RouterPhase) {
        trace!("{:?} -> {:?} ({})", self.phase, phase, self.client_id);
        self.phase = phase;
    }
}
