//! unistate Router: dispatches tagged messages to operations.
//!
//! One [`ConnectionRouter`] serves one connection: it owns that connection's
//! [`ConnectionState`], reads messages off its channel, resolves each `tag`
//! through the shared [`OperationRegistry`], and turns every per-message
//! failure into an `error` message instead of dropping the connection.

pub mod builtins;
pub mod operation;
pub mod registry;
pub mod router;
pub mod service;
pub mod state;

pub use operation::{Operation, OperationCx, OperationDyn};
pub use registry::{OperationRegistry, Resolution};
pub use router::{ConnectionRouter, RouterConfig, RouterPhase, UnknownTagPolicy};
pub use service::RouterService;
pub use state::ConnectionState;
