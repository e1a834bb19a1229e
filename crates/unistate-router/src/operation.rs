//! Operations: the handlers a tag resolves to.

use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;
use unistate_protocol::{Fields, Message, RouteError, TransportError};
use unistate_transport::Outbound;

use crate::state::ConnectionState;

/// A named handler invoked when an inbound message carries its tag.
///
/// The message's remaining fields are decoded into [`Operation::Params`]
/// before `invoke` runs; a mismatch is reported as a malformed message and
/// the operation never sees it. Add `#[serde(deny_unknown_fields)]` to the
/// params type to reject extra fields as well.
///
/// Operations reply by sending messages through the context, never by
/// returning a value: there is no request/response correlation on the wire.
pub trait Operation: Send + Sync + 'static {
    type Params: DeserializeOwned + Send;

    /// The tag this operation answers to. Must not start with `_`.
    fn tag(&self) -> &'static str;

    fn invoke(
        &self,
        cx: &mut OperationCx<'_>,
        params: Self::Params,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// What an operation can reach while it runs: the connection's state and the
/// sending half of its channel.
pub struct OperationCx<'a> {
    state: &'a mut ConnectionState,
    outbound: &'a mut dyn Outbound,
    client_id: &'a str,
}

impl<'a> OperationCx<'a> {
    pub fn new(
        state: &'a mut ConnectionState,
        outbound: &'a mut dyn Outbound,
        client_id: &'a str,
    ) -> Self {
        Self {
            state,
            outbound,
            client_id,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut ConnectionState {
        &mut *self.state
    }

    pub fn client_id(&self) -> &str {
        self.client_id
    }

    /// Send one message to the peer.
    ///
    /// A failure here means the connection is gone. Propagate it with `?`;
    /// the router recognises it and stops instead of reporting an error.
    pub async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.outbound.send_message(&message).await
    }
}

/// Object-safe form of [`Operation`], implemented for every operation.
///
/// Decodes the raw fields and maps the outcome into a [`RouteError`].
pub trait OperationDyn: Send + Sync {
    fn tag_dyn(&self) -> &'static str;

    fn invoke_dyn<'a>(
        &'a self,
        cx: &'a mut OperationCx<'_>,
        fields: Fields,
    ) -> Pin<Box<dyn Future<Output = Result<(), RouteError>> + Send + 'a>>;
}

impl<T: Operation> OperationDyn for T {
    fn tag_dyn(&self) -> &'static str {
        self.tag()
    }

    fn invoke_dyn<'a>(
        &'a self,
        cx: &'a mut OperationCx<'_>,
        fields: Fields,
    ) -> Pin<Box<dyn Future<Output = Result<(), RouteError>> + Send + 'a>> {
        Box::pin(async move {
            let tag = self.tag();
            let params = decode_params::<T::Params>(tag, fields)?;
            self.invoke(cx, params)
                .await
                .map_err(|err| match err.downcast::<TransportError>() {
                    Ok(transport) => RouteError::Transport(transport),
                    Err(err) => RouteError::operation_failed(tag, err),
                })
        })
    }
}

fn decode_params<P: DeserializeOwned>(tag: &str, fields: Fields) -> Result<P, RouteError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| RouteError::malformed(format!("invalid fields for `{tag}`: {e}")))
}
