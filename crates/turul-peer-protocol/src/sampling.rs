//! Sampling payloads (peer-initiated `sampling/createMessage`)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{ContentBlock, Role};

/// One message of sampling context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingMessage {
    pub role: Role,
    pub content: ContentBlock,
}

/// Params of `sampling/createMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMessageParams {
    pub messages: Vec<SamplingMessage>,
    /// Maximum tokens (required field)
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl CreateMessageParams {
    pub fn new(messages: Vec<SamplingMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            system_prompt: None,
            include_context: None,
            temperature: None,
            stop_sequences: None,
            model_preferences: None,
            metadata: None,
            meta: None,
        }
    }
}

/// Result the client returns for `sampling/createMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    pub role: Role,
    pub content: ContentBlock,
    /// Name of the model that produced the message
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CreateMessageResult {
    pub fn new(content: ContentBlock, model: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            model: model.into(),
            stop_reason: None,
        }
    }

    pub fn with_stop_reason(mut self, reason: impl Into<String>) -> Self {
        self.stop_reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_require_max_tokens() {
        let missing = json!({"messages": []});
        assert!(serde_json::from_value::<CreateMessageParams>(missing).is_err());
    }

    #[test]
    fn test_result_wire_shape() {
        let result = CreateMessageResult::new(ContentBlock::text("hi"), "fixture-model")
            .with_stop_reason("endTurn");
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({
                "role": "assistant",
                "content": {"type": "text", "text": "hi"},
                "model": "fixture-model",
                "stopReason": "endTurn"
            })
        );
    }
}
