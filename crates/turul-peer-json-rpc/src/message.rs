//! Structural classification of inbound frames.
//!
//! A frame is classified only by which keys it carries:
//!
//! | `method` | `id` | kind |
//! |---|---|---|
//! | yes | yes | request |
//! | yes | no | notification |
//! | no | yes | response |
//! | no | no | invalid |
//!
//! After classification the frame is decoded strictly into its typed shape.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{FrameError, FrameKind};
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcResponse;
use crate::types::RequestId;

/// Any frame that can travel over the channel
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Decode and classify one text frame
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Classify an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let object = match value {
            Value::Object(object) => object,
            _ => return Err(FrameError::NotAnObject),
        };
        let kind = classify(&object)?;
        let value = Value::Object(object);
        match kind {
            FrameKind::Request => serde_json::from_value(value)
                .map(JsonRpcMessage::Request)
                .map_err(|e| FrameError::invalid(kind, e)),
            FrameKind::Response => serde_json::from_value(value)
                .map(JsonRpcMessage::Response)
                .map_err(|e| FrameError::invalid(kind, e)),
            FrameKind::Notification => serde_json::from_value(value)
                .map(JsonRpcMessage::Notification)
                .map_err(|e| FrameError::invalid(kind, e)),
        }
    }

    /// Encode to the wire text form
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            JsonRpcMessage::Request(_) => FrameKind::Request,
            JsonRpcMessage::Response(_) => FrameKind::Response,
            JsonRpcMessage::Notification(_) => FrameKind::Notification,
        }
    }

    /// Correlation id, absent for notifications
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(request) => Some(&request.id),
            JsonRpcMessage::Response(response) => Some(&response.id),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    /// Method name, absent for responses
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(request) => Some(&request.method),
            JsonRpcMessage::Response(_) => None,
            JsonRpcMessage::Notification(notification) => Some(&notification.method),
        }
    }
}

fn classify(object: &Map<String, Value>) -> Result<FrameKind, FrameError> {
    match (object.contains_key("method"), object.contains_key("id")) {
        (true, true) => Ok(FrameKind::Request),
        (true, false) => Ok(FrameKind::Notification),
        (false, true) => Ok(FrameKind::Response),
        (false, false) => Err(FrameError::Unclassifiable),
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JsonRpcMessage::Request(request) => request.serialize(serializer),
            JsonRpcMessage::Response(response) => response.serialize(serializer),
            JsonRpcMessage::Notification(notification) => notification.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        JsonRpcMessage::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}
