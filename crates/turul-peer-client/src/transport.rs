//! Transport layer for the peer client
//!
//! A [`Transport`] owns one physical connection obtained from a [`Connector`], runs the
//! single inbound read loop, and multiplexes any number of concurrent calls over it.
//! Inbound frames are classified structurally: responses resolve pending calls, peer
//! requests and notifications are published on the channels returned by
//! [`Transport::subscribe`].

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn};
use url::Url;

use turul_peer_json_rpc::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use turul_peer_protocol::CapabilitySet;

use crate::config::ClientConfig;
use crate::config::ConnectionConfig;
use crate::error::{PeerClientResult, ProtocolError, StateError, TransportError};

#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod pending;
#[cfg(feature = "tcp")]
pub mod tcp;
#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "http")]
pub use http::HttpConnector;
pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use pending::{PendingCalls, RequestIdGenerator};
#[cfg(feature = "tcp")]
pub use tcp::TcpConnector;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;

use pending::PendingGuard;

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// One text message per frame
    WebSocket,
    /// Newline-delimited frames over a TCP stream
    Tcp,
    /// Each outbound frame POSTed; response bodies become inbound frames
    Http,
    /// In-process duplex channel
    Memory,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::WebSocket => write!(f, "WebSocket"),
            TransportType::Tcp => write!(f, "TCP"),
            TransportType::Http => write!(f, "HTTP"),
            TransportType::Memory => write!(f, "Memory"),
        }
    }
}

/// Transport capabilities
#[derive(Debug, Clone)]
pub struct TransportCapabilities {
    /// Whether the peer can send frames without a prior outbound frame
    pub server_events: bool,
    /// Whether the transport maintains a persistent connection
    pub persistent: bool,
    /// Maximum frame size, if the substrate imposes one
    pub max_message_size: Option<usize>,
}

/// Transport connection information
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub transport_type: TransportType,
    pub endpoint: String,
    pub connected: bool,
    pub capabilities: TransportCapabilities,
    /// Parsed endpoint parts (scheme, host, port, path) when the endpoint is a URL
    pub metadata: Value,
}

/// Transport statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct TransportStatistics {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub notifications_sent: u64,
    pub notifications_received: u64,
    /// Requests initiated by the peer
    pub requests_received: u64,
    pub responses_sent: u64,
    /// Malformed frames that were dropped
    pub frames_dropped: u64,
    /// Responses whose id matched no outstanding call
    pub unexpected_responses: u64,
    pub errors: u64,
    pub avg_response_time_ms: f64,
    pub last_error: Option<String>,
}

/// Write half of a physical connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a physical connection. `None` means the peer closed it.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;
}

pub type BoxedFrameSink = Box<dyn FrameSink>;
pub type BoxedFrameStream = Box<dyn FrameStream>;

/// Network substrate: opens physical connections to one endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    fn transport_type(&self) -> TransportType;

    fn endpoint(&self) -> String;

    fn capabilities(&self) -> TransportCapabilities;

    async fn connect(&self) -> Result<(BoxedFrameSink, BoxedFrameStream), TransportError>;
}

/// Type alias for a boxed connector
pub type BoxedConnector = Box<dyn Connector>;

/// Inbound channels of one connection
#[derive(Debug)]
pub struct InboundChannels {
    /// Requests initiated by the peer; answer them with [`Transport::send_response`]
    pub requests: mpsc::Receiver<JsonRpcRequest>,
    pub notifications: mpsc::Receiver<JsonRpcNotification>,
}

struct InboundSenders {
    requests: mpsc::Sender<JsonRpcRequest>,
    notifications: mpsc::Sender<JsonRpcNotification>,
}

/// Tunables a transport takes from the client configuration
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub channel_capacity: usize,
    pub log_frames: bool,
    pub redact_params: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for TransportSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.timeouts.connect,
            channel_capacity: config.connection.channel_capacity.max(1),
            log_frames: config.logging.log_frames,
            redact_params: config.logging.redact_params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeardownOrigin {
    Disconnect,
    PeerClosed,
    ReadFailed,
    WriteFailed,
}

impl std::fmt::Display for TeardownOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownOrigin::Disconnect => write!(f, "disconnect requested"),
            TeardownOrigin::PeerClosed => write!(f, "peer closed the connection"),
            TeardownOrigin::ReadFailed => write!(f, "read failed"),
            TeardownOrigin::WriteFailed => write!(f, "write failed"),
        }
    }
}

struct SinkSlot {
    generation: u64,
    sink: BoxedFrameSink,
}

struct ActiveConnection {
    generation: u64,
    reader: Option<JoinHandle<()>>,
    inbound: Option<InboundChannels>,
}

/// State shared between the transport handle and its read loop
struct Shared {
    pending: PendingCalls,
    ids: RequestIdGenerator,
    /// Serializes connect and teardown
    lifecycle: tokio::sync::Mutex<()>,
    /// Serializes writes
    sink: tokio::sync::Mutex<Option<SinkSlot>>,
    connection: Mutex<Option<ActiveConnection>>,
    connected: AtomicBool,
    generation: AtomicU64,
    server_capabilities: RwLock<Option<CapabilitySet>>,
    stats: Mutex<TransportStatistics>,
    settings: TransportSettings,
}

/// One logical connection to a peer over an injected [`Connector`]
pub struct Transport {
    connector: BoxedConnector,
    shared: Arc<Shared>,
}

impl Transport {
    pub fn new(connector: BoxedConnector) -> Self {
        Self::with_settings(connector, TransportSettings::default())
    }

    pub fn with_settings(connector: BoxedConnector, settings: TransportSettings) -> Self {
        Self {
            connector,
            shared: Arc::new(Shared {
                pending: PendingCalls::new(),
                ids: RequestIdGenerator::new(),
                lifecycle: tokio::sync::Mutex::new(()),
                sink: tokio::sync::Mutex::new(None),
                connection: Mutex::new(None),
                connected: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                server_capabilities: RwLock::new(None),
                stats: Mutex::new(TransportStatistics::default()),
                settings,
            }),
        }
    }

    pub fn transport_type(&self) -> TransportType {
        self.connector.transport_type()
    }

    /// Establish the physical connection and start the read loop. No-op if connected.
    pub async fn connect(&self) -> PeerClientResult<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        if self.is_connected() {
            debug!("Transport already connected");
            return Ok(());
        }

        let endpoint = self.connector.endpoint();
        info!(transport = %self.transport_type(), endpoint = %endpoint, "Connecting transport");

        let timeout = self.shared.settings.connect_timeout;
        let (sink, stream) = match tokio::time::timeout(timeout, self.connector.connect()).await {
            Ok(Ok(halves)) => halves,
            Ok(Err(e)) => {
                error!(endpoint = %endpoint, error = %e, "Transport connection failed");
                self.shared.record_error(&e);
                return Err(e.into());
            }
            Err(_) => {
                let e = TransportError::ConnectionFailed(format!(
                    "timed out after {} ms",
                    timeout.as_millis()
                ));
                error!(endpoint = %endpoint, error = %e, "Transport connection failed");
                self.shared.record_error(&e);
                return Err(e.into());
            }
        };

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let capacity = self.shared.settings.channel_capacity;
        let (requests_tx, requests_rx) = mpsc::channel(capacity);
        let (notifications_tx, notifications_rx) = mpsc::channel(capacity);

        *self.shared.sink.lock().await = Some(SinkSlot { generation, sink });

        let senders = InboundSenders {
            requests: requests_tx,
            notifications: notifications_tx,
        };
        let reader = tokio::spawn(
            read_loop(Arc::clone(&self.shared), generation, stream, senders).with_current_subscriber(),
        );

        *self.shared.connection.lock() = Some(ActiveConnection {
            generation,
            reader: Some(reader),
            inbound: Some(InboundChannels {
                requests: requests_rx,
                notifications: notifications_rx,
            }),
        });
        self.shared.connected.store(true, Ordering::SeqCst);

        info!(transport = %self.transport_type(), endpoint = %endpoint, generation, "Transport connected");
        Ok(())
    }

    /// Tear the connection down. Every pending call is resolved with
    /// [`TransportError::Cancelled`] before this returns.
    pub async fn disconnect(&self) -> PeerClientResult<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        if !self.shared.teardown_locked(None, TeardownOrigin::Disconnect).await {
            debug!("Transport already disconnected");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Take the inbound channels of the current connection. Each connection creates
    /// fresh channels; `None` if disconnected or already taken.
    pub fn subscribe(&self) -> Option<InboundChannels> {
        self.shared
            .connection
            .lock()
            .as_mut()
            .and_then(|connection| connection.inbound.take())
    }

    /// Fresh correlation id, unique among this transport's outstanding calls
    pub fn next_request_id(&self) -> RequestId {
        self.shared.ids.next_id()
    }

    /// Send a request and suspend until its response arrives or the connection is torn down.
    ///
    /// Dropping the returned future releases the pending entry; a later response for
    /// that id is dropped as unexpected.
    pub async fn send_request(&self, request: JsonRpcRequest) -> PeerClientResult<JsonRpcResponse> {
        if !self.is_connected() {
            return Err(StateError::NotConnected.into());
        }

        let id = request.id.clone();
        let receiver = self.shared.pending.register(id.clone())?;
        let guard = PendingGuard::new(&self.shared.pending, id.clone());
        let started = Instant::now();

        debug!(method = %request.method, id = %id, "Sending request");
        self.shared.write(&JsonRpcMessage::Request(request)).await?;
        self.shared.update_stats(|stats| stats.requests_sent += 1);

        let outcome = receiver.await;
        guard.disarm();

        match outcome {
            Ok(Ok(response)) => {
                let elapsed = started.elapsed();
                self.shared.update_stats(|stats| {
                    let completed = stats.responses_received.max(1) as f64;
                    stats.avg_response_time_ms = (stats.avg_response_time_ms * (completed - 1.0)
                        + elapsed.as_millis() as f64)
                        / completed;
                });
                debug!(id = %id, elapsed_ms = elapsed.as_millis(), is_error = response.is_error(), "Request completed");
                Ok(response)
            }
            Ok(Err(e)) => {
                debug!(id = %id, error = %e, "Request resolved with transport error");
                Err(e.into())
            }
            // Sender dropped unresolved; only possible if the table itself went away
            Err(_) => Err(TransportError::Cancelled.into()),
        }
    }

    /// Write a notification; does not wait for anything
    pub async fn send_notification(&self, notification: JsonRpcNotification) -> PeerClientResult<()> {
        if !self.is_connected() {
            return Err(StateError::NotConnected.into());
        }
        debug!(method = %notification.method, "Sending notification");
        self.shared
            .write(&JsonRpcMessage::Notification(notification))
            .await?;
        self.shared.update_stats(|stats| stats.notifications_sent += 1);
        Ok(())
    }

    /// Answer a peer-initiated request
    pub async fn send_response(&self, response: JsonRpcResponse) -> PeerClientResult<()> {
        if !self.is_connected() {
            return Err(StateError::NotConnected.into());
        }
        debug!(id = %response.id, is_error = response.is_error(), "Sending response");
        self.shared.write(&JsonRpcMessage::Response(response)).await?;
        self.shared.update_stats(|stats| stats.responses_sent += 1);
        Ok(())
    }

    /// Capabilities granted by the peer, once a handshake succeeded on this connection
    pub fn server_capabilities(&self) -> Option<CapabilitySet> {
        self.shared.server_capabilities.read().clone()
    }

    pub fn set_server_capabilities(&self, capabilities: CapabilitySet) {
        *self.shared.server_capabilities.write() = Some(capabilities);
    }

    /// Number of calls currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn statistics(&self) -> TransportStatistics {
        self.shared.stats.lock().clone()
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        let endpoint = self.connector.endpoint();
        let metadata = match Url::parse(&endpoint) {
            Ok(url) => serde_json::json!({
                "scheme": url.scheme(),
                "host": url.host_str(),
                "port": url.port(),
                "path": url.path()
            }),
            Err(_) => Value::Null,
        };
        ConnectionInfo {
            transport_type: self.transport_type(),
            endpoint,
            connected: self.is_connected(),
            capabilities: self.connector.capabilities(),
            metadata,
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // Stop the read loop; waiting callers hold their own receivers and see Cancelled
        if let Some(mut connection) = self.shared.connection.lock().take()
            && let Some(reader) = connection.reader.take()
        {
            reader.abort();
        }
        self.shared.pending.cancel_all();
    }
}

impl Shared {
    fn update_stats<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut TransportStatistics),
    {
        let mut stats = self.stats.lock();
        update_fn(&mut stats);
    }

    fn record_error(&self, error: &TransportError) {
        self.update_stats(|stats| {
            stats.errors += 1;
            stats.last_error = Some(error.to_string());
        });
    }

    fn log_frame(&self, direction: &'static str, message: &JsonRpcMessage, frame: &str) {
        if !self.settings.log_frames {
            return;
        }
        if self.settings.redact_params {
            debug!(
                direction,
                kind = %message.kind(),
                method = message.method(),
                id = ?message.id(),
                "Frame"
            );
        } else {
            debug!(direction, frame = %frame, "Frame");
        }
    }

    /// Encode and write one frame. A failed write tears the connection down.
    async fn write(&self, message: &JsonRpcMessage) -> PeerClientResult<()> {
        let frame = message.encode().map_err(ProtocolError::from)?;
        self.log_frame("outbound", message, &frame);

        let (generation, result) = {
            let mut sink = self.sink.lock().await;
            let Some(slot) = sink.as_mut() else {
                return Err(StateError::NotConnected.into());
            };
            (slot.generation, slot.sink.send(frame).await)
        };

        if let Err(e) = result {
            error!(error = %e, "Write failed, tearing down connection");
            self.record_error(&e);
            let _lifecycle = self.lifecycle.lock().await;
            self.teardown_locked(Some(generation), TeardownOrigin::WriteFailed)
                .await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Tear down the connection matching `generation` (any connection if `None`).
    /// Caller holds the lifecycle lock. Returns whether anything was torn down.
    async fn teardown_locked(&self, generation: Option<u64>, origin: TeardownOrigin) -> bool {
        let connection = {
            let mut slot = self.connection.lock();
            let matches = slot
                .as_ref()
                .is_some_and(|c| generation.is_none_or(|g| g == c.generation));
            if matches { slot.take() } else { None }
        };
        let Some(mut connection) = connection else {
            return false;
        };

        self.connected.store(false, Ordering::SeqCst);

        // The read loop tears down from inside its own task; never abort it mid-teardown
        if origin != TeardownOrigin::PeerClosed
            && origin != TeardownOrigin::ReadFailed
            && let Some(reader) = connection.reader.take()
        {
            reader.abort();
        }

        if let Some(mut slot) = self.sink.lock().await.take()
            && let Err(e) = slot.sink.close().await
        {
            debug!(error = %e, "Error closing sink");
        }

        let cancelled = self.pending.cancel_all();
        *self.server_capabilities.write() = None;

        info!(
            generation = connection.generation,
            cancelled,
            reason = %origin,
            "Transport disconnected"
        );
        true
    }

    /// Route one inbound frame. Never waits on a consumer, so a slow or absent
    /// subscriber cannot stall responses to in-flight calls.
    fn handle_frame(&self, text: &str, senders: &InboundSenders) {
        let message = match JsonRpcMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed inbound frame");
                self.update_stats(|stats| stats.frames_dropped += 1);
                return;
            }
        };
        self.log_frame("inbound", &message, text);

        match message {
            JsonRpcMessage::Response(response) => {
                let id = response.id.clone();
                match self.pending.resolve(response) {
                    Ok(()) => self.update_stats(|stats| stats.responses_received += 1),
                    Err(_) => {
                        warn!(id = %id, "Dropping response for unknown request id");
                        self.update_stats(|stats| stats.unexpected_responses += 1);
                    }
                }
            }
            JsonRpcMessage::Request(request) => {
                self.update_stats(|stats| stats.requests_received += 1);
                debug!(method = %request.method, id = %request.id, "Peer request received");
                if let Err(e) = senders.requests.try_send(request) {
                    let (reason, request) = match e {
                        TrySendError::Full(request) => ("full", request),
                        TrySendError::Closed(request) => ("closed", request),
                    };
                    warn!(method = %request.method, id = %request.id, reason, "Request channel unavailable, peer request dropped");
                    self.update_stats(|stats| stats.frames_dropped += 1);
                }
            }
            JsonRpcMessage::Notification(notification) => {
                self.update_stats(|stats| stats.notifications_received += 1);
                debug!(method = %notification.method, "Peer notification received");
                if let Err(e) = senders.notifications.try_send(notification) {
                    let (reason, notification) = match e {
                        TrySendError::Full(notification) => ("full", notification),
                        TrySendError::Closed(notification) => ("closed", notification),
                    };
                    warn!(method = %notification.method, reason, "Notification channel unavailable, notification dropped");
                    self.update_stats(|stats| stats.frames_dropped += 1);
                }
            }
        }
    }
}

/// The single inbound loop of one connection
async fn read_loop(
    shared: Arc<Shared>,
    generation: u64,
    mut stream: BoxedFrameStream,
    senders: InboundSenders,
) {
    debug!(generation, "Read loop started");
    let origin = loop {
        match stream.next_frame().await {
            Some(Ok(frame)) => shared.handle_frame(&frame, &senders),
            Some(Err(e)) => {
                error!(error = %e, "Read failed");
                shared.record_error(&e);
                break TeardownOrigin::ReadFailed;
            }
            None => break TeardownOrigin::PeerClosed,
        }
    };

    let _lifecycle = shared.lifecycle.lock().await;
    shared.teardown_locked(Some(generation), origin).await;
    // Senders drop here, closing the inbound channels after pending calls are resolved
}

/// Helper function to detect transport type from URL
pub fn detect_transport_type(url_str: &str) -> PeerClientResult<TransportType> {
    let url = Url::parse(url_str)
        .map_err(|e| TransportError::ConnectionFailed(format!("Invalid URL: {}", e)))?;

    match url.scheme() {
        "ws" | "wss" => Ok(TransportType::WebSocket),
        "tcp" => Ok(TransportType::Tcp),
        "http" | "https" => Ok(TransportType::Http),
        "memory" => Ok(TransportType::Memory),
        scheme => Err(TransportError::Unsupported(format!("Unknown scheme: {}", scheme)).into()),
    }
}

/// Transport factory for creating connectors from URLs
pub struct TransportFactory;

impl TransportFactory {
    /// Create a connector from URL string with default connection settings
    pub fn from_url(url: &str) -> PeerClientResult<BoxedConnector> {
        Self::from_url_with_config(url, &ConnectionConfig::default())
    }

    pub fn from_url_with_config(url: &str, config: &ConnectionConfig) -> PeerClientResult<BoxedConnector> {
        let transport_type = detect_transport_type(url)?;
        Self::create(transport_type, url, config)
    }

    /// Create a specific connector type
    #[allow(unused_variables)]
    pub fn create(
        transport_type: TransportType,
        endpoint: &str,
        config: &ConnectionConfig,
    ) -> PeerClientResult<BoxedConnector> {
        match transport_type {
            #[cfg(feature = "websocket")]
            TransportType::WebSocket => Ok(Box::new(WebSocketConnector::new(endpoint, config)?)),
            #[cfg(feature = "tcp")]
            TransportType::Tcp => Ok(Box::new(TcpConnector::new(endpoint)?)),
            #[cfg(feature = "http")]
            TransportType::Http => Ok(Box::new(HttpConnector::new(endpoint, config)?)),
            TransportType::Memory => Err(TransportError::Unsupported(
                "memory endpoints are created in-process with MemoryConnector::pair".to_string(),
            )
            .into()),
            #[allow(unreachable_patterns)]
            other => Err(TransportError::Unsupported(format!(
                "{} transport not enabled in this build",
                other
            ))
            .into()),
        }
    }

    /// List transport types that can be created from a URL in this build
    pub fn available_transports() -> Vec<TransportType> {
        let mut transports = Vec::new();
        #[cfg(feature = "websocket")]
        transports.push(TransportType::WebSocket);
        #[cfg(feature = "tcp")]
        transports.push(TransportType::Tcp);
        #[cfg(feature = "http")]
        transports.push(TransportType::Http);
        transports
    }
}
