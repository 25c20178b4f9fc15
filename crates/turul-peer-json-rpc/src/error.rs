use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::error_codes;

/// Named JSON-RPC error codes, standard and protocol-specific
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Timeout,
    ResourceNotFound,
    ToolNotFound,
    PromptNotFound,
    Unauthorized,
    NotSupported,
    Cancelled,
    ServerError(i64), // -32099 to -32000, not otherwise named
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::Timeout => error_codes::TIMEOUT,
            JsonRpcErrorCode::ResourceNotFound => error_codes::RESOURCE_NOT_FOUND,
            JsonRpcErrorCode::ToolNotFound => error_codes::TOOL_NOT_FOUND,
            JsonRpcErrorCode::PromptNotFound => error_codes::PROMPT_NOT_FOUND,
            JsonRpcErrorCode::Unauthorized => error_codes::UNAUTHORIZED,
            JsonRpcErrorCode::NotSupported => error_codes::NOT_SUPPORTED,
            JsonRpcErrorCode::Cancelled => error_codes::CANCELLED,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::Timeout => "Request timed out",
            JsonRpcErrorCode::ResourceNotFound => "Resource not found",
            JsonRpcErrorCode::ToolNotFound => "Tool not found",
            JsonRpcErrorCode::PromptNotFound => "Prompt not found",
            JsonRpcErrorCode::Unauthorized => "Unauthorized",
            JsonRpcErrorCode::NotSupported => "Not supported",
            JsonRpcErrorCode::Cancelled => "Request cancelled",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }

    /// Map an integer code back to its name. Codes outside every known range yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        let named = match code {
            error_codes::PARSE_ERROR => JsonRpcErrorCode::ParseError,
            error_codes::INVALID_REQUEST => JsonRpcErrorCode::InvalidRequest,
            error_codes::METHOD_NOT_FOUND => JsonRpcErrorCode::MethodNotFound,
            error_codes::INVALID_PARAMS => JsonRpcErrorCode::InvalidParams,
            error_codes::INTERNAL_ERROR => JsonRpcErrorCode::InternalError,
            error_codes::TIMEOUT => JsonRpcErrorCode::Timeout,
            error_codes::RESOURCE_NOT_FOUND => JsonRpcErrorCode::ResourceNotFound,
            error_codes::TOOL_NOT_FOUND => JsonRpcErrorCode::ToolNotFound,
            error_codes::PROMPT_NOT_FOUND => JsonRpcErrorCode::PromptNotFound,
            error_codes::UNAUTHORIZED => JsonRpcErrorCode::Unauthorized,
            error_codes::NOT_SUPPORTED => JsonRpcErrorCode::NotSupported,
            error_codes::CANCELLED => JsonRpcErrorCode::Cancelled,
            c if (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&c) => {
                JsonRpcErrorCode::ServerError(c)
            }
            _ => return None,
        };
        Some(named)
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC error object carried by an error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub data: Option<Value>,
}

/// Keeps an explicit `null` distinct from an absent field.
pub(crate) fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("Method '{}' not found", method)),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams,
            Some(message.to_string()),
            None,
        )
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message, None)
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        debug_assert!(
            (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&code),
            "Server error code must be in range -32099 to -32000"
        );
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }

    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::ResourceNotFound,
            Some(format!("Resource '{}' not found", uri)),
            Some(serde_json::json!({ "uri": uri })),
        )
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::ToolNotFound,
            Some(format!("Tool '{}' not found", name)),
            None,
        )
    }

    pub fn prompt_not_found(name: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::PromptNotFound,
            Some(format!("Prompt '{}' not found", name)),
            None,
        )
    }

    pub fn not_supported(what: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::NotSupported,
            Some(format!("'{}' is not supported", what)),
            None,
        )
    }

    pub fn cancelled(reason: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::Cancelled, reason, None)
    }

    pub fn timeout() -> Self {
        Self::new(JsonRpcErrorCode::Timeout, None, None)
    }

    pub fn unauthorized(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::Unauthorized, message, None)
    }

    /// Named code, if this error carries one
    pub fn kind(&self) -> Option<JsonRpcErrorCode> {
        JsonRpcErrorCode::from_code(self.code)
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorObject {}

/// Which frame shape a decode failure was attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Response,
    Notification,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Request => write!(f, "request"),
            FrameKind::Response => write!(f, "response"),
            FrameKind::Notification => write!(f, "notification"),
        }
    }
}

/// Failure to encode or decode a frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame has neither 'method' nor 'id'")]
    Unclassifiable,

    #[error("Invalid {kind} frame: {reason}")]
    Invalid { kind: FrameKind, reason: String },
}

impl FrameError {
    pub(crate) fn invalid(kind: FrameKind, reason: impl fmt::Display) -> Self {
        Self::Invalid {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Wire error object a responder would send back for this failure
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            FrameError::Json(e) => JsonRpcErrorObject::parse_error(Some(e.to_string().into())),
            other => JsonRpcErrorObject::invalid_request(Some(other.to_string().into())),
        }
    }
}
