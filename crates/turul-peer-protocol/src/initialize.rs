//! Initialize handshake types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capabilities::CapabilitySet;

/// Name and version of a protocol implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    /// Machine-readable name
    pub name: String,
    /// Version string (e.g., "1.0.0")
    pub version: String,
    /// Optional human-friendly display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Params of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitializeRequest {
    /// The protocol version the client speaks
    pub protocol_version: String,
    /// Information about the client implementation
    pub client_info: Implementation,
    /// Capabilities the client declares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilitySet>,
}

impl InitializeRequest {
    pub fn new(
        protocol_version: impl Into<String>,
        client_info: Implementation,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            client_info,
            capabilities: Some(capabilities),
        }
    }
}

/// Result of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitializeResult {
    /// The protocol version the server echoes back
    pub protocol_version: String,
    /// Information about the server implementation
    pub server_info: Implementation,
    /// Capabilities the server grants
    pub capabilities: CapabilitySet,
    /// Optional usage instructions for the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl InitializeResult {
    pub fn new(
        protocol_version: impl Into<String>,
        server_info: Implementation,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            server_info,
            capabilities,
            instructions: None,
            meta: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}
