//! Configuration types for the peer client

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use turul_peer_protocol::{CapabilitySet, Implementation, PROTOCOL_VERSION};

use crate::error::{PeerClientError, PeerClientResult};

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client identification sent during `initialize`
    pub client_info: ClientInfo,

    /// Protocol version requested during `initialize`
    pub protocol_version: String,

    /// How to treat a peer that answers with a different protocol version
    pub version_policy: VersionPolicy,

    /// Capabilities this client declares (gates peer-initiated calls)
    pub capabilities: CapabilitySet,

    /// Timeout configurations
    pub timeouts: TimeoutConfig,

    /// Connection configurations
    pub connection: ConnectionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Client identification information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,

    /// Client version
    pub version: String,

    /// Human-friendly display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Version negotiation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Reject a mismatched version; the session stays `Connected`
    #[default]
    Strict,
    /// Log a warning and continue with the peer's version
    Lenient,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Physical connection establishment. Calls themselves have no timeout.
    #[serde(with = "duration_serde")]
    pub connect: Duration,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// User agent string (HTTP and WebSocket handshakes)
    pub user_agent: Option<String>,

    /// Custom headers to include in HTTP requests
    pub headers: Option<HashMap<String, String>>,

    /// Buffer size of the inbound request and notification channels
    pub channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log every inbound and outbound frame at debug level
    pub log_frames: bool,

    /// Omit params and results from frame logs
    pub redact_params: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_info: ClientInfo::default(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            version_policy: VersionPolicy::default(),
            capabilities: CapabilitySet::default(),
            timeouts: TimeoutConfig::default(),
            connection: ConnectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "turul-peer-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(format!("turul-peer-client/{}", env!("CARGO_PKG_VERSION"))),
            headers: None,
            channel_capacity: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_frames: false,
            redact_params: true,
        }
    }
}

impl ClientInfo {
    pub fn to_implementation(&self) -> Implementation {
        let implementation = Implementation::new(&self.name, &self.version);
        match &self.title {
            Some(title) => implementation.with_title(title),
            None => implementation,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(source: &str) -> PeerClientResult<Self> {
        let config: ClientConfig = toml::from_str(source)
            .map_err(|e| PeerClientError::config(format!("Invalid TOML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PeerClientResult<()> {
        if self.client_info.name.trim().is_empty() {
            return Err(PeerClientError::config("client_info.name must not be empty"));
        }
        if self.client_info.version.trim().is_empty() {
            return Err(PeerClientError::config("client_info.version must not be empty"));
        }
        if self.protocol_version.trim().is_empty() {
            return Err(PeerClientError::config("protocol_version must not be empty"));
        }
        if self.connection.channel_capacity == 0 {
            return Err(PeerClientError::config("connection.channel_capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }
}

// Durations travel as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
