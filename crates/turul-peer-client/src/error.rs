//! Error types for peer client operations

use thiserror::Error;
use turul_peer_json_rpc::{FrameError, JsonRpcErrorObject, RequestId, error_codes};
use turul_peer_protocol::{Category, Operation, PayloadError};

/// Result type for peer client operations
pub type PeerClientResult<T> = Result<T, PeerClientError>;

/// Error type for peer client operations
#[derive(Error, Debug)]
pub enum PeerClientError {
    /// Transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol-level errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Operation attempted in the wrong connection state
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Operation not granted by the negotiated capabilities
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// The peer answered with an error response (code, message and data kept verbatim)
    #[error("Remote error: {0}")]
    Remote(JsonRpcErrorObject),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Transport closed unexpectedly")]
    Closed,

    /// The call was still outstanding when the connection was torn down
    #[error("Request cancelled: connection closed")]
    Cancelled,

    #[error("Unsupported transport: {0}")]
    Unsupported(String),

    #[error("WebSocket transport error: {0}")]
    WebSocket(String),

    #[error("TCP transport error: {0}")]
    Tcp(String),

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Protocol version mismatch: requested {requested}, peer answered {received}")]
    VersionMismatch { requested: String, received: String },

    #[error("Invalid result for '{method}': {reason}")]
    InvalidResult { method: String, reason: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Request id {0} is already outstanding")]
    DuplicateRequestId(RequestId),
}

/// Connection state errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Not connected")]
    NotConnected,

    #[error("Session not initialized")]
    NotInitialized,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Session already initialized")]
    AlreadyInitialized,
}

/// Capability gating errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Operation {operation} is not supported by the peer ({category} capability missing or false)")]
    NotSupported {
        category: Category,
        operation: Operation,
    },
}

impl CapabilityError {
    pub fn not_supported(operation: Operation) -> Self {
        Self::NotSupported {
            category: operation.category(),
            operation,
        }
    }
}

impl PeerClientError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the call was cancelled by a connection teardown
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }

    /// Whether the peer answered with an error response
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// The remote error object, if the peer answered with one
    pub fn remote_error(&self) -> Option<&JsonRpcErrorObject> {
        match self {
            Self::Remote(error) => Some(error),
            _ => None,
        }
    }

    /// Wire error code: the remote code, or the cancelled code for teardown cancellation
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Remote(error) => Some(error.code),
            Self::Transport(TransportError::Cancelled) => Some(error_codes::CANCELLED),
            _ => None,
        }
    }
}
