//! # Peer Client Prelude
//!
//! ```rust
//! use turul_peer_client::prelude::*;
//! ```

// Core client types
pub use crate::client::{ConnectionStatus, PeerClient, PeerClientBuilder};
pub use crate::config::{ClientConfig, VersionPolicy};
pub use crate::error::{PeerClientError, PeerClientResult};
pub use crate::events::{EventDispatcher, SamplingHandler};
pub use crate::session::{ConnectionState, SessionInfo};

// Transport types
pub use crate::transport::{MemoryConnector, MemoryListener, TransportFactory, TransportType};

// Payload types most callers touch
pub use turul_peer_json_rpc::{JsonRpcErrorObject, RequestId};
pub use turul_peer_protocol::{
    CallToolResult, CapabilitySet, ContentBlock, CreateMessageParams, CreateMessageResult,
    GetPromptResult, InitializeResult, Prompt, PromptsCapabilities, Resource, ResourceContents,
    ResourcesCapabilities, Tool, ToolsCapabilities,
};

pub use std::time::Duration;
