//! Capability sets negotiated during `initialize`.
//!
//! Each category is optional and each flag inside a category is optional. An absent
//! category and an absent flag both mean "not permitted".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::methods;

/// Capabilities for resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    /// Whether the peer supports resource update subscriptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Whether the peer emits resource list change notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ResourcesCapabilities {
    pub fn list_and_read() -> Self {
        Self {
            list: Some(true),
            read: Some(true),
            ..Default::default()
        }
    }
}

/// Capabilities for tools
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ToolsCapabilities {
    pub fn list_and_call() -> Self {
        Self {
            list: Some(true),
            call: Some(true),
            ..Default::default()
        }
    }
}

/// Capabilities for prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl PromptsCapabilities {
    pub fn list_and_get() -> Self {
        Self {
            list: Some(true),
            get: Some(true),
            ..Default::default()
        }
    }
}

/// Capabilities for the peer-initiated sampling call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<bool>,
}

/// Capabilities declared by one side of the connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapabilities>,
    /// Experimental, non-standard capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(mut self, resources: ResourcesCapabilities) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_tools(mut self, tools: ToolsCapabilities) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptsCapabilities) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn with_sampling(mut self, enabled: bool) -> Self {
        self.sampling = Some(SamplingCapabilities {
            sample: Some(enabled),
        });
        self
    }

    /// Whether `operation` is permitted. Deny-by-default: a missing category or a
    /// missing flag is treated exactly like an explicit `false`.
    pub fn allows(&self, operation: Operation) -> bool {
        let flag = match operation {
            Operation::ListResources => self.resources.as_ref().and_then(|c| c.list),
            Operation::ReadResource => self.resources.as_ref().and_then(|c| c.read),
            Operation::ListTools => self.tools.as_ref().and_then(|c| c.list),
            Operation::CallTool => self.tools.as_ref().and_then(|c| c.call),
            Operation::ListPrompts => self.prompts.as_ref().and_then(|c| c.list),
            Operation::GetPrompt => self.prompts.as_ref().and_then(|c| c.get),
            Operation::Sample => self.sampling.as_ref().and_then(|c| c.sample),
        };
        flag.unwrap_or(false)
    }
}

/// Operation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Resources,
    Tools,
    Prompts,
    Sampling,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Resources => "resources",
            Category::Tools => "tools",
            Category::Prompts => "prompts",
            Category::Sampling => "sampling",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability-gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListResources,
    ReadResource,
    ListTools,
    CallTool,
    ListPrompts,
    GetPrompt,
    Sample,
}

impl Operation {
    pub fn category(&self) -> Category {
        match self {
            Operation::ListResources | Operation::ReadResource => Category::Resources,
            Operation::ListTools | Operation::CallTool => Category::Tools,
            Operation::ListPrompts | Operation::GetPrompt => Category::Prompts,
            Operation::Sample => Category::Sampling,
        }
    }

    /// Name of the flag inside the category
    pub fn flag(&self) -> &'static str {
        match self {
            Operation::ListResources | Operation::ListTools | Operation::ListPrompts => "list",
            Operation::ReadResource => "read",
            Operation::CallTool => "call",
            Operation::GetPrompt => "get",
            Operation::Sample => "sample",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Operation::ListResources => methods::RESOURCES_LIST,
            Operation::ReadResource => methods::RESOURCES_READ,
            Operation::ListTools => methods::TOOLS_LIST,
            Operation::CallTool => methods::TOOLS_CALL,
            Operation::ListPrompts => methods::PROMPTS_LIST,
            Operation::GetPrompt => methods::PROMPTS_GET,
            Operation::Sample => methods::SAMPLING_CREATE_MESSAGE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category(), self.flag())
    }
}
