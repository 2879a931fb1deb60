use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Error kinds named in spec §7. `ErrorKind` is the serializable,
/// cross-boundary tag; `RuntimeError` (below) is the `thiserror` type
/// propagated inside the runtime and carries a human-readable message
/// alongside the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    InvalidInput,
    ToolNotFound,
    Timeout,
    Cancelled,
    UnmetDependency,
    ProviderTransient,
    ProviderFatal,
    ParseError,
    QueueClosed,
    QueueRejected,
    CompressionError,
    Bug,
}

#[derive(Debug, Error, Clone)]
#[error("{kind:?}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
