//! Error kinds raised while routing a message, and their wire form.

use thiserror::Error;

use crate::message::Message;
use crate::tags::Tags;

/// The channel to the peer can no longer be used.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel closed")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything that can go wrong while handling one inbound message.
///
/// All variants except [`RouteError::Transport`] are local to a single
/// message: the dispatch loop reports them to the peer and keeps going.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    #[error("calling private operation `{tag}` is not allowed")]
    ForbiddenOperation { tag: String },

    #[error("operation not found: {tag}")]
    OperationNotFound { tag: String },

    #[error("operation `{tag}` failed: {source:#}")]
    OperationFailed {
        tag: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RouteError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    pub fn forbidden(tag: impl Into<String>) -> Self {
        Self::ForbiddenOperation { tag: tag.into() }
    }

    pub fn not_found(tag: impl Into<String>) -> Self {
        Self::OperationNotFound { tag: tag.into() }
    }

    pub fn operation_failed(tag: impl Into<String>, source: anyhow::Error) -> Self {
        Self::OperationFailed {
            tag: tag.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedMessage { .. } => ErrorKind::Malformed,
            Self::ForbiddenOperation { .. } => ErrorKind::Forbidden,
            Self::OperationNotFound { .. } => ErrorKind::NotFound,
            Self::OperationFailed { .. } => ErrorKind::Operation,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Only transport failures end a connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Machine-readable error classification, sent as the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    Forbidden,
    NotFound,
    Operation,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Operation => "operation",
            Self::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error as reported to the peer.
///
/// Serialized as `{"tag": "error", "kind": ..., "error": ..., "details": ...}`
/// where `error` is a one-line summary and `details` is the full diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub error: String,
    pub details: String,
}

impl ErrorReport {
    pub fn from_error(err: &RouteError) -> Self {
        let (error, details) = match err {
            RouteError::OperationFailed { tag, source } => {
                let summary = format!("{source:#}");
                // Debug output of anyhow carries the cause chain and, when
                // captured, the backtrace.
                let details = format!("operation `{tag}` failed\n\n{source:?}");
                (summary, details)
            }
            other => {
                let summary = other.to_string();
                let mut details = summary.clone();
                let mut source = std::error::Error::source(other);
                while let Some(cause) = source {
                    details.push_str(&format!("\n\nCaused by:\n    {cause}"));
                    source = cause.source();
                }
                (summary, details)
            }
        };

        Self {
            kind: err.kind(),
            error,
            details,
        }
    }

    pub fn into_message(self) -> Message {
        Message::new(Tags::ERROR)
            .with_field("kind", self.kind.as_str())
            .with_field("error", self.error)
            .with_field("details", self.details)
    }
}

impl From<&RouteError> for ErrorReport {
    fn from(err: &RouteError) -> Self {
        Self::from_error(err)
    }
}
