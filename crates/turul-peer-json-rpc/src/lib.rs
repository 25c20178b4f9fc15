//! # JSON-RPC 2.0 Frame Model
//!
//! Transport-agnostic JSON-RPC 2.0 frames for a protocol peer that both issues and
//! answers calls over one ordered text channel.
//!
//! ## Features
//! - Request, Response and Notification frames with exact round-tripping
//! - Purely structural classification of inbound frames ([`JsonRpcMessage::decode`])
//! - A response type that cannot hold both (or neither) of `result` and `error`
//! - Standard and protocol-specific error codes

pub mod error;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use error::{FrameError, FrameKind, JsonRpcErrorCode, JsonRpcErrorObject};
pub use message::JsonRpcMessage;
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, Params};
pub use response::{JsonRpcResponse, ResponseOutcome};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    // Protocol-specific codes, allocated from the top of the server range
    pub const TIMEOUT: i64 = -32001;
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
    pub const TOOL_NOT_FOUND: i64 = -32003;
    pub const PROMPT_NOT_FOUND: i64 = -32004;
    pub const UNAUTHORIZED: i64 = -32005;
    pub const NOT_SUPPORTED: i64 = -32006;
    pub const CANCELLED: i64 = -32007;
}
