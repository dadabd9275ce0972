use thiserror::Error;

use crate::messages::WireError;

/// Failures surfaced to the caller of a remote method.
///
/// Errors on the call path are always returned to the immediate caller;
/// nothing is thrown across the connection boundary.
#[derive(Debug, Error)]
pub enum CallError {
    /// The peer has no binding registered under the requested path.
    #[error("no remote binding registered for path '{0}'")]
    UnregisteredPath(String),
    /// The remote binding ran but failed (bad arguments, serialization, ...).
    #[error("remote binding failed: {0}")]
    Remote(String),
    /// The request could not be handed to the transport. Calls fail fast
    /// instead of queueing on a connection that is not there.
    #[error("transport unavailable, request was not sent")]
    TransportUnavailable,
    /// The connection went away while the call was in flight.
    #[error("connection closed while awaiting reply")]
    ConnectionClosed,
    /// A local argument or result value could not be (de)serialized.
    #[error("could not serialize call payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<WireError> for CallError {
    fn from(value: WireError) -> Self {
        match value {
            WireError::UnregisteredPath { path } => CallError::UnregisteredPath(path),
            WireError::Handler { message } => CallError::Remote(message),
        }
    }
}

/// Failures of the hosting endpoint's accept side.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is not running")]
    NotRunning,
    #[error("server is already running")]
    AlreadyRunning,
    #[error("server could not be stopped, shutdown receiver dropped")]
    ShutdownFailed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures inside a registered binding while adapting wire values to the
/// bound function. Converted to a [`WireError`] before leaving the endpoint.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("expected {expected} parameters, got {got}")]
    ParameterCount { expected: usize, got: usize },
    #[error("invalid parameter at position {index}: {source}")]
    InvalidParameter {
        index: usize,
        source: serde_json::Error,
    },
    #[error("could not serialize return value: {0}")]
    Serialize(serde_json::Error),
}
