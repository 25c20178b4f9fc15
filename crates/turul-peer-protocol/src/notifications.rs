//! Notifications a peer may emit, decoded into typed variants

use serde::{Deserialize, Serialize};
use serde_json::Value;
use turul_peer_json_rpc::{JsonRpcNotification, RequestId};

use crate::{PayloadError, from_params, methods};

/// Params of `notifications/resources/updated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUpdatedParams {
    pub uri: String,
}

/// Syslog-style severity used by `notifications/message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// Params of `notifications/message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

/// Params of `notifications/progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    /// String or integer token chosen by the requester
    pub progress_token: Value,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Params of `notifications/cancelled`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Typed view of a peer notification
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    ResourceListChanged,
    ResourceUpdated(ResourceUpdatedParams),
    ToolListChanged,
    PromptListChanged,
    LoggingMessage(LoggingMessageParams),
    Progress(ProgressParams),
    Cancelled(CancelledParams),
}

impl ServerNotification {
    /// Decode a wire notification. Unrecognized methods yield [`PayloadError::UnknownMethod`].
    pub fn from_notification(notification: &JsonRpcNotification) -> Result<Self, PayloadError> {
        let method = notification.method.as_str();
        let params = notification.params.as_ref();
        let typed = match method {
            methods::NOTIFICATION_RESOURCES_LIST_CHANGED => ServerNotification::ResourceListChanged,
            methods::NOTIFICATION_TOOLS_LIST_CHANGED => ServerNotification::ToolListChanged,
            methods::NOTIFICATION_PROMPTS_LIST_CHANGED => ServerNotification::PromptListChanged,
            methods::NOTIFICATION_RESOURCES_UPDATED => {
                ServerNotification::ResourceUpdated(from_params(method, params)?)
            }
            methods::NOTIFICATION_MESSAGE => ServerNotification::LoggingMessage(from_params(method, params)?),
            methods::NOTIFICATION_PROGRESS => ServerNotification::Progress(from_params(method, params)?),
            methods::NOTIFICATION_CANCELLED => ServerNotification::Cancelled(from_params(method, params)?),
            other => return Err(PayloadError::UnknownMethod(other.to_string())),
        };
        Ok(typed)
    }

    pub fn method(&self) -> &'static str {
        match self {
            ServerNotification::ResourceListChanged => methods::NOTIFICATION_RESOURCES_LIST_CHANGED,
            ServerNotification::ResourceUpdated(_) => methods::NOTIFICATION_RESOURCES_UPDATED,
            ServerNotification::ToolListChanged => methods::NOTIFICATION_TOOLS_LIST_CHANGED,
            ServerNotification::PromptListChanged => methods::NOTIFICATION_PROMPTS_LIST_CHANGED,
            ServerNotification::LoggingMessage(_) => methods::NOTIFICATION_MESSAGE,
            ServerNotification::Progress(_) => methods::NOTIFICATION_PROGRESS,
            ServerNotification::Cancelled(_) => methods::NOTIFICATION_CANCELLED,
        }
    }

    /// Encode back into a wire notification
    pub fn to_notification(&self) -> Result<JsonRpcNotification, PayloadError> {
        let params = match self {
            ServerNotification::ResourceListChanged
            | ServerNotification::ToolListChanged
            | ServerNotification::PromptListChanged => None,
            ServerNotification::ResourceUpdated(p) => Some(crate::to_params(p)?),
            ServerNotification::LoggingMessage(p) => Some(crate::to_params(p)?),
            ServerNotification::Progress(p) => Some(crate::to_params(p)?),
            ServerNotification::Cancelled(p) => Some(crate::to_params(p)?),
        };
        Ok(JsonRpcNotification::new(self.method(), params))
    }
}
