//! unistate protocol types
//!
//! A message on the wire is a JSON object with a string `tag` and any number
//! of additional named fields. This crate owns the message type, the names of
//! the built-in tags, and the error kinds the router reports back to peers.

pub mod error;
pub mod message;
pub mod tags;

pub use error::{ErrorKind, ErrorReport, RouteError, TransportError};
pub use message::{Fields, Message};
pub use tags::{PRIVATE_PREFIX, Tags, is_private_tag};
