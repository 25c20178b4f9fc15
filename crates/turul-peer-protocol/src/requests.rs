//! Boundary enums for requests in both directions

use serde::{Deserialize, Serialize};
use turul_peer_json_rpc::{JsonRpcRequest, Params, RequestId};

use crate::capabilities::Operation;
use crate::initialize::InitializeRequest;
use crate::prompts::GetPromptRequest;
use crate::resources::ReadResourceRequest;
use crate::sampling::CreateMessageParams;
use crate::tools::CallToolRequest;
use crate::{PayloadError, from_params, methods, to_params};

/// Params of the paginated list operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ListParams {
    pub fn with_cursor(cursor: Option<String>) -> Self {
        Self { cursor }
    }
}

/// Requests this client sends to the peer
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Initialize(InitializeRequest),
    Ping,
    ListResources(ListParams),
    ReadResource(ReadResourceRequest),
    ListTools(ListParams),
    CallTool(CallToolRequest),
    ListPrompts(ListParams),
    GetPrompt(GetPromptRequest),
}

impl ClientRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ClientRequest::Initialize(_) => methods::INITIALIZE,
            ClientRequest::Ping => methods::PING,
            ClientRequest::ListResources(_) => methods::RESOURCES_LIST,
            ClientRequest::ReadResource(_) => methods::RESOURCES_READ,
            ClientRequest::ListTools(_) => methods::TOOLS_LIST,
            ClientRequest::CallTool(_) => methods::TOOLS_CALL,
            ClientRequest::ListPrompts(_) => methods::PROMPTS_LIST,
            ClientRequest::GetPrompt(_) => methods::PROMPTS_GET,
        }
    }

    /// Capability flag gating this request, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ClientRequest::Initialize(_) | ClientRequest::Ping => None,
            ClientRequest::ListResources(_) => Some(Operation::ListResources),
            ClientRequest::ReadResource(_) => Some(Operation::ReadResource),
            ClientRequest::ListTools(_) => Some(Operation::ListTools),
            ClientRequest::CallTool(_) => Some(Operation::CallTool),
            ClientRequest::ListPrompts(_) => Some(Operation::ListPrompts),
            ClientRequest::GetPrompt(_) => Some(Operation::GetPrompt),
        }
    }

    pub fn to_params(&self) -> Result<Option<Params>, PayloadError> {
        let params = match self {
            ClientRequest::Initialize(p) => to_params(p)?,
            ClientRequest::Ping => return Ok(None),
            ClientRequest::ListResources(p) | ClientRequest::ListTools(p) | ClientRequest::ListPrompts(p) => {
                to_params(p)?
            }
            ClientRequest::ReadResource(p) => to_params(p)?,
            ClientRequest::CallTool(p) => to_params(p)?,
            ClientRequest::GetPrompt(p) => to_params(p)?,
        };
        Ok(Some(params))
    }

    /// Build the wire request under the given correlation id
    pub fn into_request(self, id: RequestId) -> Result<JsonRpcRequest, PayloadError> {
        let params = self.to_params()?;
        Ok(JsonRpcRequest::new(id, self.method(), params))
    }
}

/// Requests the peer sends to this client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    CreateMessage(CreateMessageParams),
    Ping,
}

impl ServerRequest {
    /// Decode a wire request. Unknown methods map to method-not-found, bad params to
    /// invalid-params (see [`PayloadError::to_error_object`]).
    pub fn from_request(request: &JsonRpcRequest) -> Result<Self, PayloadError> {
        let method = request.method.as_str();
        match method {
            methods::SAMPLING_CREATE_MESSAGE => Ok(ServerRequest::CreateMessage(from_params(
                method,
                request.params.as_ref(),
            )?)),
            methods::PING => Ok(ServerRequest::Ping),
            other => Err(PayloadError::UnknownMethod(other.to_string())),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            ServerRequest::CreateMessage(_) => methods::SAMPLING_CREATE_MESSAGE,
            ServerRequest::Ping => methods::PING,
        }
    }

    /// Local capability flag gating this request, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ServerRequest::CreateMessage(_) => Some(Operation::Sample),
            ServerRequest::Ping => None,
        }
    }
}
