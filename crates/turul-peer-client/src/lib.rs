//! # Turul Peer Client
//!
//! Client side of a JSON-RPC based protocol: a versioned `initialize` handshake,
//! capability negotiation, and typed resource, tool and prompt operations, with the
//! peer able to call back into the client (`sampling/createMessage`, `ping`) and push
//! notifications.
//!
//! ## Features
//!
//! - **Multiplexing**: any number of concurrent calls over one ordered connection,
//!   each resolved exactly once (including on disconnect)
//! - **Capability gating**: operations the peer did not grant fail before any I/O
//! - **Transports**: WebSocket, newline-delimited TCP, HTTP POST, and in-process memory
//! - **Logging**: every operation and background task logs to an injected
//!   [`tracing::Dispatch`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turul_peer_client::PeerClient;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PeerClient::builder()
//!         .with_url("ws://localhost:8080/rpc")
//!         .build()?;
//!
//!     client.connect().await?;
//!
//!     let tools = client.list_tools().await?;
//!     println!("Available tools: {:?}", tools);
//!
//!     let result = client.call_tool("add", json!({"a": "5", "b": "7"})).await?;
//!     println!("Result: {:?}", result.content);
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transport Types
//!
//! | Scheme | Connector | Framing |
//! |---|---|---|
//! | `ws://`, `wss://` | [`transport::WebSocketConnector`] | one text message per frame |
//! | `tcp://` | [`transport::TcpConnector`] | one line per frame |
//! | `http://`, `https://` | [`transport::HttpConnector`] | one POST per outbound frame |
//! | in-process | [`transport::MemoryConnector`] | channel message per frame |

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod prelude;
pub mod session;
pub mod transport;

// Re-export main types
pub use client::{ConnectionStatus, PeerClient, PeerClientBuilder};
pub use config::{ClientConfig, ClientInfo, ConnectionConfig, LoggingConfig, TimeoutConfig, VersionPolicy};
pub use error::{
    CapabilityError, PeerClientError, PeerClientResult, ProtocolError, StateError, TransportError,
};
pub use events::{EventDispatcher, SamplingHandler};
pub use session::{ConnectionState, SessionInfo, SessionManager};

// Re-export transport types
pub use transport::{
    BoxedConnector, Connector, Transport, TransportFactory, TransportStatistics, TransportType,
};

// Re-export the wire and payload crates
pub use turul_peer_json_rpc as json_rpc;
pub use turul_peer_protocol as protocol;
