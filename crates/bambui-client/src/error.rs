//! Error types for command dispatch.

use thiserror::Error;

/// Errors from dispatching a wire message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No backend configured, or the request never got an answer.
    #[error("endpoint unreachable: {0}")]
    EndpointUnreachable(String),

    /// Backend understood the message and declined it.
    #[error("backend rejected command ({status}): {reason}")]
    BackendRejected {
        /// HTTP status of the reply.
        status: u16,
        /// Reason given by the backend.
        reason: String,
    },

    /// Reply could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors raised by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connecting or sending failed.
    #[error("request failed: {0}")]
    Request(String),

    /// No reply within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// A status line arrived but the body could not be read.
    #[error("reading reply body failed: {0}")]
    Body(String),
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Body(_) => DispatchError::MalformedResponse(err.to_string()),
            TransportError::Request(_) | TransportError::Timeout => {
                DispatchError::EndpointUnreachable(err.to_string())
            }
        }
    }
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
