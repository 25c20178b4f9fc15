//! In-process fixture peer
//!
//! Accepts connections from a [`MemoryConnector`], answers category requests from the
//! canned catalogue, and lets a test hold and reorder responses, push notifications,
//! call back into the client, or drop the connection.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use turul_peer_client::transport::memory::{MemoryPeerReader, MemoryPeerWriter};
use turul_peer_client::transport::{MemoryConnector, MemoryListener};
use turul_peer_json_rpc::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
use turul_peer_protocol::{CapabilitySet, PROTOCOL_VERSION, methods};

use crate::fixtures::{TestFixtures, serve};

/// How the fixture peer behaves
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Capabilities granted in the `initialize` result
    pub capabilities: CapabilitySet,
    /// Protocol version echoed in the `initialize` result
    pub protocol_version: String,
    /// Hold every request except `initialize` until the test releases it
    pub hold_requests: bool,
    /// Answer `initialize` with this error instead of a result
    pub initialize_error: Option<JsonRpcErrorObject>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            capabilities: TestFixtures::full_capabilities(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            hold_requests: false,
            initialize_error: None,
        }
    }
}

impl FixtureConfig {
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn holding_requests(mut self) -> Self {
        self.hold_requests = true;
        self
    }

    pub fn failing_initialize(mut self, error: JsonRpcErrorObject) -> Self {
        self.initialize_error = Some(error);
        self
    }
}

#[derive(Default)]
struct PeerState {
    writer: Option<MemoryPeerWriter>,
    reader_task: Option<JoinHandle<()>>,
    connections: usize,
    /// Methods of every request and notification received, in arrival order
    received: Vec<String>,
    held: Vec<JsonRpcRequest>,
    /// Peer-initiated calls awaiting the client's answer
    awaiting: HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>,
}

struct Shared {
    config: FixtureConfig,
    state: Mutex<PeerState>,
    changed: Notify,
    next_id: AtomicI64,
}

impl Shared {
    fn update(&self, f: impl FnOnce(&mut PeerState)) {
        f(&mut self.state.lock());
        self.changed.notify_waiters();
    }

    fn send_frame(&self, frame: String) -> bool {
        let writer = self.state.lock().writer.clone();
        match writer {
            Some(writer) => writer.send(frame).is_ok(),
            None => false,
        }
    }

    fn send_message(&self, message: JsonRpcMessage) -> bool {
        match message.encode() {
            Ok(frame) => self.send_frame(frame),
            Err(e) => {
                warn!(error = %e, "Fixture could not encode frame");
                false
            }
        }
    }

    fn respond(&self, request: &JsonRpcRequest) {
        let outcome = match (&self.config.initialize_error, request.method.as_str()) {
            (Some(error), methods::INITIALIZE) => Err(error.clone()),
            _ => serve(request, &self.config.protocol_version, &self.config.capabilities),
        };
        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(request.id.clone(), result),
            Err(error) => JsonRpcResponse::error(request.id.clone(), error),
        };
        self.send_message(JsonRpcMessage::Response(response));
    }
}

/// Scriptable remote peer living in the test process
pub struct FixturePeer {
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl FixturePeer {
    /// Start a peer; connect a client to it with the returned connector
    pub fn spawn(config: FixtureConfig) -> (FixturePeer, MemoryConnector) {
        let (connector, listener) = MemoryConnector::pair("memory://fixture/rpc");
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(PeerState::default()),
            changed: Notify::new(),
            next_id: AtomicI64::new(1),
        });
        let accept_task = tokio::spawn(accept_loop(Arc::clone(&shared), listener));
        (
            FixturePeer {
                shared,
                accept_task,
            },
            connector,
        )
    }

    /// Start a peer with the default configuration
    pub fn spawn_default() -> (FixturePeer, MemoryConnector) {
        Self::spawn(FixtureConfig::default())
    }

    async fn wait_until(&self, mut condition: impl FnMut(&PeerState) -> bool) {
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if condition(&self.shared.state.lock()) {
                return;
            }
            notified.await;
        }
    }

    /// Number of connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.shared.state.lock().connections
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().writer.is_some()
    }

    /// Methods received so far, in arrival order
    pub fn received_methods(&self) -> Vec<String> {
        self.shared.state.lock().received.clone()
    }

    /// How many times `method` was received
    pub fn received_count(&self, method: &str) -> usize {
        self.shared
            .state
            .lock()
            .received
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    pub async fn wait_for_method(&self, method: &str) {
        self.wait_until(|state| state.received.iter().any(|m| m == method))
            .await;
    }

    pub fn held_count(&self) -> usize {
        self.shared.state.lock().held.len()
    }

    /// Wait until at least `count` requests are held
    pub async fn wait_for_held(&self, count: usize) {
        self.wait_until(|state| state.held.len() >= count).await;
    }

    /// Answer every held request, newest first
    pub fn release_held_reversed(&self) -> usize {
        let held = std::mem::take(&mut self.shared.state.lock().held);
        let released = held.len();
        for request in held.iter().rev() {
            self.shared.respond(request);
        }
        released
    }

    /// Answer the held request with `id` using `response` verbatim
    pub fn answer_held(&self, id: &RequestId, response: JsonRpcResponse) -> bool {
        let found = {
            let mut state = self.shared.state.lock();
            match state.held.iter().position(|r| &r.id == id) {
                Some(index) => {
                    state.held.remove(index);
                    true
                }
                None => false,
            }
        };
        found && self.shared.send_message(JsonRpcMessage::Response(response))
    }

    /// Ids of the held requests, in arrival order
    pub fn held_ids(&self) -> Vec<RequestId> {
        self.shared
            .state
            .lock()
            .held
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    /// Write `frame` to the client unchanged
    pub fn send_raw(&self, frame: impl Into<String>) -> bool {
        self.shared.send_frame(frame.into())
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> bool {
        let params = params.and_then(|p| p.as_object().cloned());
        self.shared
            .send_message(JsonRpcMessage::Notification(JsonRpcNotification::new(method, params)))
    }

    /// Call into the client and wait for its answer. `None` if the connection closed first.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Option<JsonRpcResponse> {
        let id = RequestId::Number(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.shared.state.lock().awaiting.insert(id.clone(), tx);

        let params = params.and_then(|p| p.as_object().cloned());
        let request = JsonRpcRequest::new(id.clone(), method, params);
        if !self.shared.send_message(JsonRpcMessage::Request(request)) {
            self.shared.state.lock().awaiting.remove(&id);
            return None;
        }
        rx.await.ok()
    }

    /// Drop the current connection from the peer side
    pub fn close(&self) {
        self.shared.update(|state| {
            state.writer = None;
            if let Some(task) = state.reader_task.take() {
                task.abort();
            }
            state.held.clear();
            state.awaiting.clear();
        });
        info!("Fixture peer closed the connection");
    }
}

impl Drop for FixturePeer {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Some(task) = self.shared.state.lock().reader_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(shared: Arc<Shared>, mut listener: MemoryListener) {
    while let Some(peer) = listener.accept().await {
        let (reader, writer) = peer.into_split();
        shared.update(|state| {
            state.connections += 1;
            let reader_task = tokio::spawn(read_loop(Arc::clone(&shared), reader, state.connections));
            if let Some(previous) = state.reader_task.replace(reader_task) {
                previous.abort();
            }
            state.writer = Some(writer);
        });
        debug!("Fixture peer accepted a connection");
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: MemoryPeerReader, connection: usize) {
    while let Some(frame) = reader.recv().await {
        let message = match JsonRpcMessage::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Fixture dropping malformed frame");
                continue;
            }
        };

        match message {
            JsonRpcMessage::Request(request) => {
                let hold = shared.config.hold_requests && request.method != methods::INITIALIZE;
                let method = request.method.clone();
                if hold {
                    shared.update(|state| {
                        state.received.push(method);
                        state.held.push(request);
                    });
                } else {
                    shared.update(|state| state.received.push(method));
                    shared.respond(&request);
                }
            }
            JsonRpcMessage::Notification(notification) => {
                shared.update(|state| state.received.push(notification.method));
            }
            JsonRpcMessage::Response(response) => {
                let waiter = shared.state.lock().awaiting.remove(&response.id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => warn!(id = %response.id, "Fixture got a response nobody asked for"),
                }
            }
        }
    }
    debug!("Client closed its side of the connection");
    shared.update(|state| {
        if state.connections == connection {
            state.writer = None;
        }
    });
}
