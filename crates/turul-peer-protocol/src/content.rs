//! Content blocks shared by tool results, prompt messages and sampling

use serde::{Deserialize, Serialize};

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Text contents of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

/// Binary contents of a resource, base64 encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub blob: String,
}

/// Resource contents, either text or blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text(TextResourceContents),
    Blob(BlobResourceContents),
}

impl ResourceContents {
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text(TextResourceContents {
            uri: uri.into(),
            mime_type: Some("text/plain".to_string()),
            text: text.into(),
        })
    }

    pub fn uri(&self) -> &str {
        match self {
            ResourceContents::Text(t) => &t.uri,
            ResourceContents::Blob(b) => &b.uri,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResourceContents::Text(t) => Some(&t.text),
            ResourceContents::Blob(_) => None,
        }
    }
}

/// A piece of content, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: ResourceContents,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_block_wire_shape() {
        assert_eq!(
            serde_json::to_value(ContentBlock::text("12")).unwrap(),
            json!({"type": "text", "text": "12"})
        );
    }

    #[test]
    fn test_image_block_uses_camel_case_mime_type() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "image", "data": "AAA=", "mimeType": "image/png"}))
                .unwrap();
        assert!(matches!(block, ContentBlock::Image { ref mime_type, .. } if mime_type == "image/png"));
    }

    #[test]
    fn test_resource_contents_variants() {
        let text: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///a", "text": "hi"})).unwrap();
        assert_eq!(text.as_text(), Some("hi"));

        let blob: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///b", "blob": "AAA="})).unwrap();
        assert!(matches!(blob, ResourceContents::Blob(_)));
        assert_eq!(blob.uri(), "file:///b");
    }

    #[test]
    fn test_unknown_content_type_is_rejected() {
        assert!(serde_json::from_value::<ContentBlock>(json!({"type": "video", "url": "x"})).is_err());
    }
}
