//! Peer client orchestrator

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::{Dispatch, debug, info, warn};

use turul_peer_json_rpc::{
    JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ResponseOutcome,
};
use turul_peer_protocol::methods;
use turul_peer_protocol::{
    CallToolRequest, CallToolResult, CapabilitySet, ClientRequest, GetPromptRequest, GetPromptResult,
    InitializeRequest, InitializeResult, ListParams, ListPromptsResult, ListResourcesResult,
    ListToolsResult, Operation, PayloadError, Prompt, ReadResourceRequest, ReadResourceResult,
    Resource, ResourceContents, ServerNotification, ServerRequest, Tool,
};

use crate::config::{ClientConfig, VersionPolicy};
use crate::error::{
    CapabilityError, PeerClientError, PeerClientResult, ProtocolError, StateError, TransportError,
};
use crate::events::{EventDispatcher, SamplingHandler};
use crate::session::{ConnectionState, SessionInfo, SessionManager};
use crate::transport::{
    BoxedConnector, InboundChannels, Transport, TransportFactory, TransportSettings,
    TransportStatistics, TransportType,
};

/// Client for one remote peer
///
/// Owns the transport and the connection state machine. `connect()` opens the
/// transport and performs the `initialize` handshake; category operations are only
/// available once the session is initialized and the peer granted the matching
/// capability.
pub struct PeerClient {
    transport: Arc<Transport>,
    session: Arc<SessionManager>,
    config: ClientConfig,
    events: EventDispatcher,
    sampling: Option<Arc<dyn SamplingHandler>>,
    dispatch: Dispatch,
}

impl std::fmt::Debug for PeerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerClient")
            .field("transport_type", &self.transport.transport_type())
            .field("state", &self.session.state())
            .field("sampling_handler", &self.sampling.is_some())
            .finish()
    }
}

impl PeerClient {
    pub fn builder() -> PeerClientBuilder {
        PeerClientBuilder::new()
    }

    /// Run `fut` under the client's log dispatcher
    fn instrumented<F: Future>(&self, fut: F) -> WithDispatch<F> {
        fut.with_subscriber(self.dispatch.clone())
    }

    /// Open the transport and perform the handshake.
    ///
    /// A transport failure returns the client to `Disconnected`. A handshake failure
    /// (error response, version mismatch) leaves it `Connected`, from where
    /// [`initialize`](Self::initialize) may be retried. `Ok` means the peer accepted the
    /// handshake; if the connection drops while `notifications/initialized` is written,
    /// the state falls back to `Disconnected` and the connection-lost hook fires.
    pub async fn connect(&self) -> PeerClientResult<InitializeResult> {
        self.instrumented(async {
            self.open_transport().await?;
            self.handshake().await
        })
        .await
    }

    /// Retry the handshake on an already open connection
    pub async fn initialize(&self) -> PeerClientResult<InitializeResult> {
        self.instrumented(self.handshake()).await
    }

    /// Tear the connection down. Every outstanding call fails with a cancellation
    /// before this returns. The connection-lost hook is not fired.
    pub async fn disconnect(&self) -> PeerClientResult<()> {
        self.instrumented(async {
            let previous = self.session.reset();
            info!(previous_state = %previous, "Disconnecting from peer");
            self.transport.disconnect().await
        })
        .await
    }

    async fn open_transport(&self) -> PeerClientResult<()> {
        let epoch = self.session.begin_connect()?;
        let endpoint = self.transport.connection_info().endpoint;
        info!(endpoint = %endpoint, transport = %self.transport.transport_type(), "Connecting to peer");

        if let Err(e) = self.transport.connect().await {
            self.session.reset_if_current(epoch);
            return Err(e);
        }

        let Some(inbound) = self.transport.subscribe() else {
            // The peer closed the connection before we could listen on it
            self.session.reset_if_current(epoch);
            return Err(TransportError::Closed.into());
        };

        let context = DispatchContext {
            transport: Arc::downgrade(&self.transport),
            session: Arc::clone(&self.session),
            events: self.events.clone(),
            sampling: self.sampling.clone(),
            local_capabilities: self.config.capabilities.clone(),
        };
        tokio::spawn(dispatch_loop(context, epoch, inbound).with_current_subscriber());

        if !self.session.mark_connected(epoch) {
            // disconnect() ran while the transport was connecting
            self.transport.disconnect().await?;
            return Err(TransportError::Cancelled.into());
        }
        Ok(())
    }

    async fn handshake(&self) -> PeerClientResult<InitializeResult> {
        let epoch = self.session.begin_initialize()?;
        if !self.transport.is_connected() {
            return Err(StateError::NotConnected.into());
        }

        let requested = self.config.protocol_version.clone();
        info!(protocol_version = %requested, "Initializing session");

        let request = ClientRequest::Initialize(InitializeRequest::new(
            requested.clone(),
            self.config.client_info.to_implementation(),
            self.config.capabilities.clone(),
        ));
        let result: InitializeResult = self.call(request).await?;

        if result.protocol_version != requested {
            match self.config.version_policy {
                VersionPolicy::Strict => {
                    warn!(requested = %requested, received = %result.protocol_version, "Peer answered with a different protocol version");
                    return Err(ProtocolError::VersionMismatch {
                        requested,
                        received: result.protocol_version,
                    }
                    .into());
                }
                VersionPolicy::Lenient => {
                    warn!(requested = %requested, received = %result.protocol_version, "Continuing with a different protocol version");
                }
            }
        }

        self.transport.set_server_capabilities(result.capabilities.clone());
        if !self.session.mark_initialized(epoch, &result) {
            return Err(match self.session.state() {
                ConnectionState::Initialized => StateError::AlreadyInitialized,
                _ => StateError::NotConnected,
            }
            .into());
        }

        // The session is committed; a failed write tears the connection down through
        // the usual lost-connection path instead of failing the handshake after the fact
        if let Err(e) = self
            .transport
            .send_notification(JsonRpcNotification::new_no_params(methods::NOTIFICATION_INITIALIZED))
            .await
        {
            warn!(error = %e, "Failed to send initialized notification");
        }

        info!(
            server = %result.server_info.name,
            server_version = %result.server_info.version,
            protocol_version = %result.protocol_version,
            "Session initialized"
        );
        Ok(result)
    }

    fn ensure_ready(&self) -> Result<(), StateError> {
        match self.session.state() {
            ConnectionState::Disconnected => Err(StateError::NotConnected),
            ConnectionState::Connecting | ConnectionState::Connected => Err(StateError::NotInitialized),
            ConnectionState::Initialized if !self.transport.is_connected() => Err(StateError::NotConnected),
            ConnectionState::Initialized => Ok(()),
        }
    }

    /// State and capability checks, then the call. Nothing is written if a check fails.
    async fn request<T: DeserializeOwned>(&self, request: ClientRequest) -> PeerClientResult<T> {
        self.ensure_ready()?;
        if let Some(operation) = request.operation() {
            let granted = self
                .session
                .server_capabilities()
                .is_some_and(|capabilities| capabilities.allows(operation));
            if !granted {
                debug!(operation = %operation, "Operation not granted by peer");
                return Err(CapabilityError::not_supported(operation).into());
            }
        }
        self.call(request).await
    }

    async fn call<T: DeserializeOwned>(&self, request: ClientRequest) -> PeerClientResult<T> {
        let method = request.method();
        let request = request
            .into_request(self.transport.next_request_id())
            .map_err(ProtocolError::from)?;

        let response = self.transport.send_request(request).await?;
        match response.outcome {
            ResponseOutcome::Result(value) => serde_json::from_value(value).map_err(|e| {
                ProtocolError::InvalidResult {
                    method: method.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            ResponseOutcome::Error(error) => {
                debug!(method, code = error.code, message = %error.message, "Peer returned an error");
                Err(PeerClientError::Remote(error))
            }
        }
    }

    /// Round trip to the peer; requires an initialized session but no capability
    pub async fn ping(&self) -> PeerClientResult<()> {
        self.instrumented(async {
            let _: Value = self.request(ClientRequest::Ping).await?;
            debug!("Ping successful");
            Ok(())
        })
        .await
    }

    /// First page of resources
    pub async fn list_resources(&self) -> PeerClientResult<Vec<Resource>> {
        Ok(self.list_resources_paginated(None).await?.resources)
    }

    pub async fn list_resources_paginated(&self, cursor: Option<String>) -> PeerClientResult<ListResourcesResult> {
        self.instrumented(async {
            let result: ListResourcesResult = self
                .request(ClientRequest::ListResources(ListParams::with_cursor(cursor)))
                .await?;
            debug!(
                count = result.resources.len(),
                has_cursor = result.next_cursor.is_some(),
                "Retrieved resources"
            );
            Ok(result)
        })
        .await
    }

    pub async fn read_resource(&self, uri: &str) -> PeerClientResult<Vec<ResourceContents>> {
        self.instrumented(async {
            debug!(uri, "Reading resource");
            let result: ReadResourceResult = self
                .request(ClientRequest::ReadResource(ReadResourceRequest::new(uri)))
                .await?;
            Ok(result.contents)
        })
        .await
    }

    /// First page of tools
    pub async fn list_tools(&self) -> PeerClientResult<Vec<Tool>> {
        Ok(self.list_tools_paginated(None).await?.tools)
    }

    pub async fn list_tools_paginated(&self, cursor: Option<String>) -> PeerClientResult<ListToolsResult> {
        self.instrumented(async {
            let result: ListToolsResult = self
                .request(ClientRequest::ListTools(ListParams::with_cursor(cursor)))
                .await?;
            debug!(
                count = result.tools.len(),
                has_cursor = result.next_cursor.is_some(),
                "Retrieved tools"
            );
            Ok(result)
        })
        .await
    }

    /// Invoke a tool. `arguments` must be a JSON object or `null`.
    ///
    /// A tool that ran but failed is reported in the result (`is_error`), not as an error.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> PeerClientResult<CallToolResult> {
        self.instrumented(async {
            let arguments = match arguments {
                Value::Object(map) => Some(map),
                Value::Null => None,
                other => {
                    return Err(ProtocolError::from(PayloadError::invalid_params(
                        methods::TOOLS_CALL,
                        format!("tool arguments must be an object, got {}", other),
                    ))
                    .into());
                }
            };

            debug!(tool = name, "Calling tool");
            let result: CallToolResult = self
                .request(ClientRequest::CallTool(CallToolRequest::new(name, arguments)))
                .await?;
            debug!(tool = name, is_error = result.is_error(), "Tool call completed");
            Ok(result)
        })
        .await
    }

    /// First page of prompts
    pub async fn list_prompts(&self) -> PeerClientResult<Vec<Prompt>> {
        Ok(self.list_prompts_paginated(None).await?.prompts)
    }

    pub async fn list_prompts_paginated(&self, cursor: Option<String>) -> PeerClientResult<ListPromptsResult> {
        self.instrumented(async {
            let result: ListPromptsResult = self
                .request(ClientRequest::ListPrompts(ListParams::with_cursor(cursor)))
                .await?;
            debug!(
                count = result.prompts.len(),
                has_cursor = result.next_cursor.is_some(),
                "Retrieved prompts"
            );
            Ok(result)
        })
        .await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> PeerClientResult<GetPromptResult> {
        self.instrumented(async {
            debug!(prompt = name, "Getting prompt");
            let result: GetPromptResult = self
                .request(ClientRequest::GetPrompt(GetPromptRequest::new(name, arguments)))
                .await?;
            debug!(prompt = name, message_count = result.messages.len(), "Prompt retrieved");
            Ok(result)
        })
        .await
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Initialized and the transport is up
    pub fn is_ready(&self) -> bool {
        self.ensure_ready().is_ok()
    }

    pub fn session_info(&self) -> SessionInfo {
        self.session.session_info()
    }

    /// Capabilities the peer granted, once initialized
    pub fn server_capabilities(&self) -> Option<CapabilitySet> {
        self.session.server_capabilities()
    }

    pub fn transport_stats(&self) -> TransportStatistics {
        self.transport.statistics()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let transport_info = self.transport.connection_info();
        let session = self.session.session_info();
        ConnectionStatus {
            transport_connected: transport_info.connected,
            state: session.state,
            transport_type: transport_info.transport_type,
            endpoint: transport_info.endpoint,
            session_id: session.session_id,
            protocol_version: session.protocol_version,
            pending_calls: self.transport.pending_count(),
        }
    }

    /// Hooks for peer notifications
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// What the per-connection dispatch task needs from the client
#[derive(Clone)]
struct DispatchContext {
    transport: Weak<Transport>,
    session: Arc<SessionManager>,
    events: EventDispatcher,
    sampling: Option<Arc<dyn SamplingHandler>>,
    local_capabilities: CapabilitySet,
}

/// Serve peer requests and notifications until the connection's channels close, then
/// reset the session if this connection was still the live one.
async fn dispatch_loop(context: DispatchContext, epoch: u64, mut inbound: InboundChannels) {
    debug!(epoch, "Dispatch task started");
    let mut requests_open = true;
    let mut notifications_open = true;

    while requests_open || notifications_open {
        tokio::select! {
            request = inbound.requests.recv(), if requests_open => match request {
                Some(request) => {
                    // Answered on its own task so a slow handler does not hold up notifications
                    let context = context.clone();
                    tokio::spawn(async move { context.answer_peer_request(request).await }.with_current_subscriber());
                }
                None => requests_open = false,
            },
            notification = inbound.notifications.recv(), if notifications_open => match notification {
                Some(notification) => context.handle_notification(notification),
                None => notifications_open = false,
            },
        }
    }

    if context.session.reset_if_current(epoch) {
        warn!(epoch, "Connection to peer lost");
        context.events.connection_lost();
    } else {
        debug!(epoch, "Dispatch task finished");
    }
}

impl DispatchContext {
    async fn answer_peer_request(&self, request: JsonRpcRequest) {
        let id = request.id.clone();
        let response = match self.handle_peer_request(&request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        };

        let Some(transport) = self.transport.upgrade() else {
            debug!(method = %request.method, "Client dropped, peer request left unanswered");
            return;
        };
        if let Err(e) = transport.send_response(response).await {
            warn!(method = %request.method, id = %request.id, error = %e, "Failed to answer peer request");
        }
    }

    async fn handle_peer_request(&self, request: &JsonRpcRequest) -> Result<Value, JsonRpcErrorObject> {
        if request.method == methods::SAMPLING_CREATE_MESSAGE && !self.local_capabilities.allows(Operation::Sample) {
            debug!(id = %request.id, "Sampling not enabled, rejecting peer request");
            return Err(JsonRpcErrorObject::not_supported(methods::SAMPLING_CREATE_MESSAGE));
        }

        let server_request = ServerRequest::from_request(request).map_err(|e| {
            warn!(method = %request.method, id = %request.id, error = %e, "Rejecting peer request");
            e.to_error_object()
        })?;

        match server_request {
            ServerRequest::Ping => Ok(json!({})),
            ServerRequest::CreateMessage(params) => {
                let Some(handler) = &self.sampling else {
                    warn!(id = %request.id, "Sampling enabled but no handler installed");
                    return Err(JsonRpcErrorObject::internal_error(Some(
                        "no sampling handler installed".to_string(),
                    )));
                };
                let result = handler.create_message(params).await?;
                serde_json::to_value(result).map_err(|e| JsonRpcErrorObject::internal_error(Some(e.to_string())))
            }
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        match ServerNotification::from_notification(&notification) {
            Ok(typed) => {
                debug!(method = typed.method(), "Dispatching notification");
                self.events.dispatch(typed);
            }
            Err(PayloadError::UnknownMethod(method)) => {
                warn!(method = %method, "Dropping unrecognized notification");
            }
            Err(e) => {
                warn!(method = %notification.method, error = %e, "Dropping notification with invalid params");
            }
        }
    }
}

/// Connection status information
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub transport_connected: bool,
    pub state: ConnectionState,
    pub transport_type: TransportType,
    pub endpoint: String,
    pub session_id: Option<String>,
    pub protocol_version: Option<String>,
    pub pending_calls: usize,
}

impl ConnectionStatus {
    /// Check if fully connected and ready
    pub fn is_ready(&self) -> bool {
        self.transport_connected && self.state == ConnectionState::Initialized
    }

    /// Get status summary
    pub fn summary(&self) -> String {
        let session_display = match &self.session_id {
            Some(id) => &id[..id.len().min(8)],
            None => "None",
        };
        format!(
            "{} transport to {} - Session {} ({}, {} pending)",
            self.transport_type, self.endpoint, session_display, self.state, self.pending_calls
        )
    }
}

/// Builder for creating peer clients
#[derive(Default)]
pub struct PeerClientBuilder {
    connector: Option<BoxedConnector>,
    url: Option<String>,
    config: Option<ClientConfig>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    dispatch: Option<Dispatch>,
}

impl PeerClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit network substrate. Takes precedence over [`with_url`](Self::with_url).
    pub fn with_connector(mut self, connector: BoxedConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Pick the transport from the URL scheme when the client is built
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Answer peer `sampling/createMessage` calls. Only consulted when the configured
    /// capabilities enable sampling.
    pub fn with_sampling_handler(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling = Some(handler);
        self
    }

    /// Dispatcher every client operation and task logs to. Defaults to the dispatcher
    /// current when [`build`](Self::build) runs.
    pub fn with_log_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn build(self) -> PeerClientResult<PeerClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let connector = match (self.connector, self.url) {
            (Some(connector), _) => connector,
            (None, Some(url)) => TransportFactory::from_url_with_config(&url, &config.connection)?,
            (None, None) => {
                return Err(PeerClientError::config(
                    "a connector or URL must be set before building the client",
                ));
            }
        };

        if self.sampling.is_some() && !config.capabilities.allows(Operation::Sample) {
            debug!("Sampling handler installed but sampling capability is disabled");
        }

        let dispatch = self
            .dispatch
            .unwrap_or_else(|| tracing::dispatcher::get_default(|current| current.clone()));
        let transport = Transport::with_settings(connector, TransportSettings::from(&config));

        Ok(PeerClient {
            transport: Arc::new(transport),
            session: Arc::new(SessionManager::new(config.capabilities.clone())),
            events: EventDispatcher::new(),
            sampling: self.sampling,
            dispatch,
            config,
        })
    }
}
