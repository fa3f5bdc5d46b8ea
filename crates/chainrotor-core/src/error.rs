//! Error types for transports and the rotator.

use thiserror::Error;

use crate::request::JsonRpcError;
use crate::transport::TransportKind;

/// Errors that can occur while dialing an endpoint or issuing a call on it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, bad body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The endpoint could not be dialed.
    #[error("failed to dial {url}: {reason}")]
    Dial { url: String, reason: String },

    /// The connection has been closed locally.
    #[error("connection closed")]
    Closed,

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// No connection could be taken from a rotator.
    #[error(transparent)]
    Unavailable(#[from] RotatorError),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this is a node-side execution error.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors produced by the [`Rotator`](crate::rotator::Rotator).
#[derive(Debug, Error)]
pub enum RotatorError {
    /// The endpoint list was empty.
    #[error("no RPC endpoints provided")]
    NoEndpoints,

    /// Every dial attempt at construction time failed.
    #[error("failed to connect to any of {attempted} RPC endpoints")]
    AllDialsFailed { attempted: usize },

    /// Every endpoint of the requested kind is excluded or absent.
    #[error("no active {kind} RPC endpoints available")]
    NoActiveEndpoint { kind: TransportKind },

    /// The rotator has been closed.
    #[error("rotator is closed")]
    Closed,
}

impl RotatorError {
    /// Returns `true` for errors that may clear up on their own once an
    /// exclusion lifts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoActiveEndpoint { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_errors_are_rpc_errors_only() {
        let err = TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        });
        assert!(err.is_execution_error());
        assert!(!TransportError::Http("refused".into()).is_execution_error());
        assert!(!TransportError::Timeout { ms: 10 }.is_execution_error());
    }

    #[test]
    fn rotator_errors_pass_through_transport_errors() {
        let err: TransportError = RotatorError::Closed.into();
        assert_eq!(err.to_string(), "rotator is closed");
    }

    #[test]
    fn no_active_endpoint_message_is_kind_specific() {
        let http = RotatorError::NoActiveEndpoint { kind: TransportKind::RequestResponse };
        let ws = RotatorError::NoActiveEndpoint { kind: TransportKind::Streaming };
        assert_eq!(http.to_string(), "no active HTTP RPC endpoints available");
        assert_eq!(ws.to_string(), "no active WebSocket RPC endpoints available");
        assert!(ws.is_transient());
        assert!(!RotatorError::NoEndpoints.is_transient());
    }
}
