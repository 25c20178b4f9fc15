//! Connection state machine and negotiated session data

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use turul_peer_protocol::{CapabilitySet, Implementation, InitializeResult};

use crate::error::StateError;

/// Client connection state
///
/// `Disconnected -> Connecting -> Connected -> Initialized`; any transport-level
/// disconnect returns to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Initialized,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Initialized => write!(f, "initialized"),
        }
    }
}

/// Session information and metadata
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Local identifier of the current connection attempt, used in logs
    pub session_id: Option<String>,

    pub state: ConnectionState,

    /// Capabilities this client declared
    pub client_capabilities: CapabilitySet,

    /// Capabilities the peer granted during `initialize`
    pub server_capabilities: Option<CapabilitySet>,

    /// Protocol version the peer answered with
    pub protocol_version: Option<String>,

    pub server_info: Option<Implementation>,

    pub instructions: Option<String>,

    pub connected_at: Option<Instant>,

    pub initialized_at: Option<Instant>,
}

impl SessionInfo {
    fn new(client_capabilities: CapabilitySet) -> Self {
        Self {
            session_id: None,
            state: ConnectionState::Disconnected,
            client_capabilities,
            server_capabilities: None,
            protocol_version: None,
            server_info: None,
            instructions: None,
            connected_at: None,
            initialized_at: None,
        }
    }

    /// Check if session can be used for category operations
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Initialized
    }

    /// Time since the physical connection was established
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.map(|at| at.elapsed())
    }

    fn clear(&mut self) {
        self.session_id = None;
        self.state = ConnectionState::Disconnected;
        self.server_capabilities = None;
        self.protocol_version = None;
        self.server_info = None;
        self.instructions = None;
        self.connected_at = None;
        self.initialized_at = None;
    }
}

struct SessionSlot {
    info: SessionInfo,
    /// Bumped on every connect attempt and every reset; stale connection work compares against it
    epoch: u64,
}

/// Owns the state machine. Every transition is a single critical section, so a
/// connection that was reset underneath an in-flight step is detected by its epoch.
pub struct SessionManager {
    slot: RwLock<SessionSlot>,
}

impl SessionManager {
    pub fn new(client_capabilities: CapabilitySet) -> Self {
        Self {
            slot: RwLock::new(SessionSlot {
                info: SessionInfo::new(client_capabilities),
                epoch: 0,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.slot.read().info.state
    }

    pub fn session_info(&self) -> SessionInfo {
        self.slot.read().info.clone()
    }

    pub fn server_capabilities(&self) -> Option<CapabilitySet> {
        self.slot.read().info.server_capabilities.clone()
    }

    pub fn client_capabilities(&self) -> CapabilitySet {
        self.slot.read().info.client_capabilities.clone()
    }

    /// `Disconnected -> Connecting`. Returns the epoch of the new attempt.
    pub fn begin_connect(&self) -> Result<u64, StateError> {
        let mut slot = self.slot.write();
        if slot.info.state != ConnectionState::Disconnected {
            return Err(StateError::AlreadyConnected);
        }
        slot.epoch += 1;
        slot.info.state = ConnectionState::Connecting;
        slot.info.session_id = Some(Uuid::now_v7().to_string());
        debug!(epoch = slot.epoch, "Session connecting");
        Ok(slot.epoch)
    }

    /// `Connecting -> Connected` for the given attempt
    pub fn mark_connected(&self, epoch: u64) -> bool {
        let mut slot = self.slot.write();
        if slot.epoch != epoch || slot.info.state != ConnectionState::Connecting {
            return false;
        }
        slot.info.state = ConnectionState::Connected;
        slot.info.connected_at = Some(Instant::now());
        true
    }

    /// Precondition for a handshake: state must be `Connected`. Returns the current epoch.
    pub fn begin_initialize(&self) -> Result<u64, StateError> {
        let slot = self.slot.read();
        match slot.info.state {
            ConnectionState::Connected => Ok(slot.epoch),
            ConnectionState::Initialized => Err(StateError::AlreadyInitialized),
            ConnectionState::Disconnected | ConnectionState::Connecting => Err(StateError::NotConnected),
        }
    }

    /// `Connected -> Initialized`, storing what the peer negotiated
    pub fn mark_initialized(&self, epoch: u64, result: &InitializeResult) -> bool {
        let mut slot = self.slot.write();
        if slot.epoch != epoch || slot.info.state != ConnectionState::Connected {
            return false;
        }
        slot.info.state = ConnectionState::Initialized;
        slot.info.server_capabilities = Some(result.capabilities.clone());
        slot.info.protocol_version = Some(result.protocol_version.clone());
        slot.info.server_info = Some(result.server_info.clone());
        slot.info.instructions = result.instructions.clone();
        slot.info.initialized_at = Some(Instant::now());
        true
    }

    /// Unconditional reset to `Disconnected`. Returns the state that was left.
    pub fn reset(&self) -> ConnectionState {
        let mut slot = self.slot.write();
        let previous = slot.info.state;
        slot.epoch += 1;
        slot.info.clear();
        previous
    }

    /// Reset only if `epoch` is still the live connection. Used when a connection drops
    /// on its own; returns whether a reset happened.
    pub fn reset_if_current(&self, epoch: u64) -> bool {
        let mut slot = self.slot.write();
        if slot.epoch != epoch || slot.info.state == ConnectionState::Disconnected {
            return false;
        }
        slot.epoch += 1;
        slot.info.clear();
        true
    }
}
