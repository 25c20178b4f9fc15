//! Canned catalogue served by the fixture peer

use serde_json::{Value, json};

use turul_peer_json_rpc::{JsonRpcErrorObject, JsonRpcRequest};
use turul_peer_protocol::{
    CallToolRequest, CallToolResult, CapabilitySet, ContentBlock, GetPromptRequest,
    GetPromptResult, Implementation, InitializeResult, ListPromptsResult, ListResourcesResult,
    ListToolsResult, Prompt, PromptArgument, PromptMessage, PromptsCapabilities,
    ReadResourceRequest, ReadResourceResult, Resource, ResourceContents, ResourcesCapabilities,
    Role, Tool, ToolsCapabilities, from_params, methods,
};

pub const README_URI: &str = "file:///fixture/readme.md";
pub const CONFIG_URI: &str = "file:///fixture/config.json";

/// Standard data sets and capability sets for peer tests
pub struct TestFixtures;

impl TestFixtures {
    /// Every category granted with every operation flag set
    pub fn full_capabilities() -> CapabilitySet {
        CapabilitySet::new()
            .with_resources(ResourcesCapabilities::list_and_read())
            .with_tools(ToolsCapabilities::list_and_call())
            .with_prompts(PromptsCapabilities::list_and_get())
    }

    pub fn tools_only_capabilities() -> CapabilitySet {
        CapabilitySet::new().with_tools(ToolsCapabilities::list_and_call())
    }

    /// The two resources, in listing order
    pub fn resources() -> Vec<Resource> {
        vec![
            Resource::new(README_URI, "readme")
                .with_description("Fixture readme")
                .with_mime_type("text/markdown"),
            Resource::new(CONFIG_URI, "config").with_mime_type("application/json"),
        ]
    }

    pub fn tools() -> Vec<Tool> {
        vec![
            Tool::new(
                "add",
                json!({
                    "type": "object",
                    "properties": {
                        "a": {"type": "string"},
                        "b": {"type": "string"}
                    },
                    "required": ["a", "b"]
                }),
            )
            .with_description("Add two numbers given as strings"),
        ]
    }

    pub fn prompts() -> Vec<Prompt> {
        let mut greeting = Prompt::new("greeting");
        greeting.description = Some("Greets someone by name".to_string());
        greeting.arguments = Some(vec![PromptArgument {
            name: "name".to_string(),
            description: None,
            required: Some(true),
        }]);
        vec![greeting]
    }
}

/// Serves one request against the canned catalogue. The fixture does not gate on
/// its own capabilities so client-side gating can be observed.
pub fn serve(
    request: &JsonRpcRequest,
    protocol_version: &str,
    capabilities: &CapabilitySet,
) -> Result<Value, JsonRpcErrorObject> {
    let params = request.params.as_ref();
    let method = request.method.as_str();
    let invalid = |e: turul_peer_protocol::PayloadError| e.to_error_object();

    let result = match method {
        methods::INITIALIZE => to_value(
            InitializeResult::new(
                protocol_version,
                Implementation::new("turul-peer-fixture", "1.0.0"),
                capabilities.clone(),
            )
            .with_instructions("Fixture peer for tests"),
        ),
        methods::PING => json!({}),
        methods::RESOURCES_LIST => to_value(ListResourcesResult {
            resources: TestFixtures::resources(),
            next_cursor: None,
            meta: None,
        }),
        methods::RESOURCES_READ => {
            let read: ReadResourceRequest = from_params(method, params).map_err(invalid)?;
            let text = match read.uri.as_str() {
                README_URI => "# Fixture\n",
                CONFIG_URI => "{\"debug\":true}",
                other => return Err(JsonRpcErrorObject::resource_not_found(other)),
            };
            to_value(ReadResourceResult {
                contents: vec![ResourceContents::text(read.uri.clone(), text)],
                meta: None,
            })
        }
        methods::TOOLS_LIST => to_value(ListToolsResult {
            tools: TestFixtures::tools(),
            next_cursor: None,
            meta: None,
        }),
        methods::TOOLS_CALL => {
            let call: CallToolRequest = from_params(method, params).map_err(invalid)?;
            if call.name != "add" {
                return Err(JsonRpcErrorObject::tool_not_found(&call.name));
            }
            let arguments = call.arguments.unwrap_or_default();
            let operand = |name: &str| -> Option<i64> {
                match arguments.get(name)? {
                    Value::String(s) => s.trim().parse().ok(),
                    Value::Number(n) => n.as_i64(),
                    _ => None,
                }
            };
            match (operand("a"), operand("b")) {
                (Some(a), Some(b)) => to_value(CallToolResult::text((a + b).to_string())),
                _ => {
                    let mut failed = CallToolResult::text("a and b must be integers");
                    failed.is_error = Some(true);
                    to_value(failed)
                }
            }
        }
        methods::PROMPTS_LIST => to_value(ListPromptsResult {
            prompts: TestFixtures::prompts(),
            next_cursor: None,
            meta: None,
        }),
        methods::PROMPTS_GET => {
            let get: GetPromptRequest = from_params(method, params).map_err(invalid)?;
            if get.name != "greeting" {
                return Err(JsonRpcErrorObject::prompt_not_found(&get.name));
            }
            let name = get
                .arguments
                .as_ref()
                .and_then(|args| args.get("name").cloned())
                .unwrap_or_else(|| "there".to_string());
            to_value(GetPromptResult {
                description: Some("Greets someone by name".to_string()),
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: ContentBlock::text(format!("Hello, {}!", name)),
                }],
                meta: None,
            })
        }
        other => return Err(JsonRpcErrorObject::method_not_found(other)),
    };
    Ok(result)
}

fn to_value<T: serde::Serialize>(payload: T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}
