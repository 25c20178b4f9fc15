//! # Turul Peer Protocol
//!
//! Typed payloads exchanged over the JSON-RPC channel: the `initialize` handshake,
//! capability sets, the resource/tool/prompt category operations, the peer-initiated
//! sampling call and the notifications a peer may emit.
//!
//! Loosely-typed `params`/`result` maps are converted at the boundary through
//! [`ClientRequest`], [`ServerRequest`] and [`ServerNotification`]; required fields
//! are never defaulted.

pub mod capabilities;
pub mod content;
pub mod initialize;
pub mod methods;
pub mod notifications;
pub mod prompts;
pub mod requests;
pub mod resources;
pub mod sampling;
pub mod tools;

// Re-export main types
pub use capabilities::{
    CapabilitySet, Category, Operation, PromptsCapabilities, ResourcesCapabilities,
    SamplingCapabilities, ToolsCapabilities,
};
pub use content::{BlobResourceContents, ContentBlock, ResourceContents, Role, TextResourceContents};
pub use initialize::{Implementation, InitializeRequest, InitializeResult};
pub use notifications::{
    CancelledParams, LoggingLevel, LoggingMessageParams, ProgressParams, ResourceUpdatedParams,
    ServerNotification,
};
pub use prompts::{GetPromptRequest, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage};
pub use requests::{ClientRequest, ListParams, ServerRequest};
pub use resources::{ListResourcesResult, ReadResourceRequest, ReadResourceResult, Resource};
pub use sampling::{CreateMessageParams, CreateMessageResult, SamplingMessage};
pub use tools::{CallToolRequest, CallToolResult, ListToolsResult, Tool};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use turul_peer_json_rpc::{JsonRpcErrorObject, Params};

/// The protocol version this crate speaks and sends during `initialize`
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Errors converting between wire maps and typed payloads
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid params for '{method}': {reason}")]
    InvalidParams { method: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PayloadError {
    pub fn invalid_params(method: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidParams {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wire error a responder sends back for this failure
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            PayloadError::UnknownMethod(method) => JsonRpcErrorObject::method_not_found(method),
            PayloadError::InvalidParams { reason, .. } => JsonRpcErrorObject::invalid_params(reason),
            PayloadError::Serialization(e) => JsonRpcErrorObject::internal_error(Some(e.to_string())),
        }
    }
}

/// Serialize a typed payload into a named-params map
pub fn to_params<T: Serialize>(payload: &T) -> Result<Params, PayloadError> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        other => Err(PayloadError::Serialization(serde::ser::Error::custom(
            format!("payload serialized to a non-object: {}", other),
        ))),
    }
}

/// Decode a typed payload from optional named params (absent params decode as `{}`)
pub fn from_params<T: DeserializeOwned>(method: &str, params: Option<&Params>) -> Result<T, PayloadError> {
    let value = Value::Object(params.cloned().unwrap_or_default());
    serde_json::from_value(value).map_err(|e| PayloadError::invalid_params(method, e))
}
